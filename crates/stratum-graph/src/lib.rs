mod class_index;
mod edge_index;
mod error;
mod subscriber_index;

pub use class_index::{ClassIndex, ClassLookup};
pub use edge_index::EdgeIndex;
pub use error::GraphError;
pub use subscriber_index::SubscriberIndex;
