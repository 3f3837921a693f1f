//! Everything an application needs to declare kinds, load and save entities.
//!
//! ```ignore
//! use memograph::prelude::*;
//! ```

pub use crate::{
    CreateOptions, Embed, EmbedOptions, ExportOptions, FieldDef, GetOptions, Graph, MapperConfig,
    MapperError, MemoryProvider, ModifiedOptions, NodeId, Provider, Registry, Relation, Result,
    SaveOptions, Schema, Through, Value,
};
