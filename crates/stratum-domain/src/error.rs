use thiserror::Error;

use crate::ids::ClassId;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("unknown resource class: {0}")]
    UnknownClass(ClassId),

    #[error("invalid id tuple for class {class_id}: {message}")]
    InvalidIdTuple { class_id: ClassId, message: String },

    #[error("attribute '{key}' on class {class_id} expected {expected:?}, got {actual:?}")]
    AttributeTypeMismatch {
        class_id: ClassId,
        key: String,
        expected: crate::types::AttributeType,
        actual: crate::types::AttributeType,
    },
}
