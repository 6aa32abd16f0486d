mod class;
mod error;
mod ids;
mod types;

pub use class::{ClassRegistry, ResourceClassDescriptor, ResourceMarkers, Subscription};
pub use error::DomainError;
pub use ids::{ClassId, LocalHandle, RecordId, ScannableId};
pub use types::{AttributeType, AttributeValue, IdKind, PluginResource, StatSample};
