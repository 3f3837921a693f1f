pub mod error;
pub mod types;
pub mod value;

pub use error::{MapperError, Result};
pub use types::{CollectorId, NodeId, ParentLink, WILDCARD, join_path, split_path};
pub use value::Value;
