// ============================================================================
// memograph Library
// ============================================================================

pub mod core;
pub mod config;
pub mod schema;
pub mod registry;
pub mod provider;
pub mod collector;
pub mod graph;
pub mod relationship;
pub mod prelude;

// Re-export main types for convenience
pub use core::{CollectorId, MapperError, NodeId, ParentLink, Result, Value};
pub use config::MapperConfig;
pub use registry::Registry;
pub use schema::{
    EmbedNode, EmbedTree, FieldDef, FormatMode, Relation, RelationDescriptor, RelationKeys,
    RelationKind, Schema,
};
pub use graph::{
    CreateOptions, Embed, ExportOptions, FetchHandler, GetOptions, Graph, ModifiedEvent,
    ModifiedOptions,
};
pub use provider::{
    DeleteRequest, FetchOptions, MemoryProvider, Provider, Query, SaveOutcome, SaveRequest,
};
pub use relationship::{EmbedOptions, SaveOptions, Through};
pub use collector::Collector;
