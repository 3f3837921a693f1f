use thiserror::Error;

#[derive(Error, Debug)]
pub enum MapperError {
    #[error("Missing schema definition for field '{1}' in '{0}'")]
    MissingFieldDefinition(String, String),

    #[error("Invalid path: '{0}'")]
    InvalidPath(String),

    #[error("The field '{0}' is not a document or a collection")]
    NotAnEntity(String),

    #[error("The relation '{1}' on '{0}' is an external relation, use `embed()` to load it first")]
    RelationNotEmbedded(String, String),

    #[error("Ambiguous counterpart for relation '{1}' on '{0}': {2}")]
    AmbiguousCounterpart(String, String, String),

    #[error("Missing primary key for '{0}'")]
    MissingPrimaryKey(String),

    #[error("Invalid index: {0}")]
    InvalidIndex(String),

    #[error("Relation '{1}' not found in '{0}'")]
    MissingRelation(String, String),

    #[error("Schema '{0}' not found")]
    SchemaNotFound(String),

    #[error("No provider registered for '{0}'")]
    ProviderNotFound(String),

    #[error("Node {0} not found in graph")]
    NodeNotFound(String),

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

pub type Result<T> = std::result::Result<T, MapperError>;

impl From<serde_json::Error> for MapperError {
    fn from(err: serde_json::Error) -> Self {
        Self::TypeMismatch(err.to_string())
    }
}

impl From<uuid::Error> for MapperError {
    fn from(err: uuid::Error) -> Self {
        Self::TypeMismatch(format!("Invalid UUID: {}", err))
    }
}

impl From<chrono::ParseError> for MapperError {
    fn from(err: chrono::ParseError) -> Self {
        Self::TypeMismatch(format!("Invalid date: {}", err))
    }
}
