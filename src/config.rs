use crate::core::{MapperError, Result};

/// Mapper configuration
///
/// Holds the naming conventions used to derive relation keys and the defaults
/// applied to schemas built through a [`Registry`](crate::Registry).
#[derive(Debug, Clone)]
pub struct MapperConfig {
    /// Default primary key field for new schemas
    pub key_field: String,

    /// Suffix appended to singular names to build foreign keys (`gallery_id`)
    pub reference_suffix: String,

    /// Whether new schemas reject undeclared fields
    pub locked: bool,

    /// Whether new schemas share instances through a collector
    pub unicity: bool,

    /// Capacity of the modified-event broadcast channel
    pub event_capacity: usize,
}

impl MapperConfig {
    pub fn new() -> Self {
        Self {
            key_field: "id".to_string(),
            reference_suffix: "_id".to_string(),
            locked: true,
            unicity: false,
            event_capacity: 256,
        }
    }

    /// Set the default primary key field
    pub fn key_field(mut self, key: &str) -> Self {
        self.key_field = key.to_string();
        self
    }

    /// Set the foreign key suffix
    pub fn reference_suffix(mut self, suffix: &str) -> Self {
        self.reference_suffix = suffix.to_string();
        self
    }

    /// Set whether new schemas are locked
    pub fn locked(mut self, locked: bool) -> Self {
        self.locked = locked;
        self
    }

    /// Set whether new schemas enable unicity
    pub fn unicity(mut self, unicity: bool) -> Self {
        self.unicity = unicity;
        self
    }

    /// Set event channel capacity
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.key_field.is_empty() || self.key_field.contains('.') {
            return Err(MapperError::ConfigError(format!(
                "Invalid key field '{}'",
                self.key_field
            )));
        }
        if self.event_capacity == 0 {
            return Err(MapperError::ConfigError(
                "Event capacity must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Naive singular form of a source or relation name.
    pub fn singular(&self, name: &str) -> String {
        if let Some(stem) = name.strip_suffix("ies") {
            format!("{}y", stem)
        } else if let Some(stem) = name.strip_suffix("ses") {
            format!("{}s", stem)
        } else if let Some(stem) = name.strip_suffix('s') {
            stem.to_string()
        } else {
            name.to_string()
        }
    }

    /// Foreign key referencing `name` (`galleries` -> `gallery_id`).
    pub fn reference_key(&self, name: &str) -> String {
        format!("{}{}", self.singular(name), self.reference_suffix)
    }
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self::new()
    }
}
