use serde::{Deserialize, Serialize};

/// Identity of a plugin-scanned host agent or controller ("scannable").
///
/// Aliases [`RecordId`]: a scannable is itself a [`StorageResourceRecord`](crate::ids)
/// like any other resource, but call sites that specifically mean "the thing
/// a session is open against" use this newtype for clarity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ScannableId(pub u64);

impl std::fmt::Display for ScannableId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Persisted identity of a `StorageResourceRecord`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordId(pub u64);

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<RecordId> for ScannableId {
    fn from(id: RecordId) -> Self {
        ScannableId(id.0)
    }
}

impl From<ScannableId> for RecordId {
    fn from(id: ScannableId) -> Self {
        RecordId(id.0)
    }
}

/// Stable identifier for a resource class (module + name), assigned by the
/// plugin registry at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClassId(pub u32);

impl std::fmt::Display for ClassId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Plugin-local handle for a resource, valid only within one [`PluginSession`](crate::ClassId).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LocalHandle(pub String);

impl LocalHandle {
    pub fn new(s: impl Into<String>) -> Self {
        LocalHandle(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for LocalHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
