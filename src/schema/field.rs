use std::fmt;
use std::sync::Arc;

use serde_json::Value as JsonValue;

use crate::core::{NodeId, Result, Value};
use crate::graph::Graph;

/// Custom read hook: `(graph, entity, raw_value, field_name) -> value`.
pub type Getter = Arc<dyn Fn(&Graph, NodeId, Value, &str) -> Result<Value> + Send + Sync>;

/// Custom write hook. The returned value is what gets cast and stored; the
/// hook may also write sibling fields through the graph.
pub type Setter = Arc<dyn Fn(&mut Graph, NodeId, Value, &str) -> Result<Value> + Send + Sync>;

/// Declaration of a single field path inside a schema.
#[derive(Clone)]
pub struct FieldDef {
    pub type_name: String,
    pub is_array: bool,
    pub nullable: bool,
    pub default: Option<JsonValue>,
    pub is_virtual: bool,
    pub getter: Option<Getter>,
    pub setter: Option<Setter>,
}

impl FieldDef {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            is_array: false,
            nullable: true,
            default: None,
            is_virtual: false,
            getter: None,
            setter: None,
        }
    }

    pub fn array(mut self) -> Self {
        self.is_array = true;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn default(mut self, value: JsonValue) -> Self {
        self.default = Some(value);
        self
    }

    /// Virtual fields are computed or side-effecting; nothing is stored for them.
    pub fn virtual_field(mut self) -> Self {
        self.is_virtual = true;
        self
    }

    pub fn getter<F>(mut self, getter: F) -> Self
    where
        F: Fn(&Graph, NodeId, Value, &str) -> Result<Value> + Send + Sync + 'static,
    {
        self.getter = Some(Arc::new(getter));
        self
    }

    pub fn setter<F>(mut self, setter: F) -> Self
    where
        F: Fn(&mut Graph, NodeId, Value, &str) -> Result<Value> + Send + Sync + 'static,
    {
        self.setter = Some(Arc::new(setter));
        self
    }

    pub fn is_object(&self) -> bool {
        self.type_name == "object"
    }
}

impl fmt::Debug for FieldDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDef")
            .field("type_name", &self.type_name)
            .field("is_array", &self.is_array)
            .field("nullable", &self.nullable)
            .field("default", &self.default)
            .field("is_virtual", &self.is_virtual)
            .field("getter", &self.getter.is_some())
            .field("setter", &self.setter.is_some())
            .finish()
    }
}
