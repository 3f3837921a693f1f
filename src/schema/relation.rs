use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelationKind {
    BelongsTo,
    HasOne,
    HasMany,
    HasManyThrough,
}

impl RelationKind {
    pub fn is_many(&self) -> bool {
        matches!(self, Self::HasMany | Self::HasManyThrough)
    }

    /// Kinds that can sit on the far side of this one.
    pub fn inverse_of(&self, other: &RelationKind) -> bool {
        match self {
            Self::BelongsTo => matches!(other, Self::HasOne | Self::HasMany),
            Self::HasOne | Self::HasMany => matches!(other, Self::BelongsTo),
            Self::HasManyThrough => matches!(other, Self::HasManyThrough),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::BelongsTo => "belongsTo",
            Self::HasOne => "hasOne",
            Self::HasMany => "hasMany",
            Self::HasManyThrough => "hasManyThrough",
        }
    }
}

/// Matching fields of a relation: `from` lives on the owning side, `to` on
/// the related side.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RelationKeys {
    pub from: String,
    pub to: String,
}

impl RelationKeys {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }

    pub fn swapped(&self) -> Self {
        Self {
            from: self.to.clone(),
            to: self.from.clone(),
        }
    }
}

/// Relation declaration handed to [`Schema::bind`](crate::Schema::bind).
#[derive(Debug, Clone)]
pub struct Relation {
    kind: RelationKind,
    to: Option<String>,
    keys: Option<RelationKeys>,
    through: Option<String>,
    using: Option<String>,
    conditions: Option<JsonValue>,
}

impl Relation {
    fn new(kind: RelationKind, to: Option<String>) -> Self {
        Self {
            kind,
            to,
            keys: None,
            through: None,
            using: None,
            conditions: None,
        }
    }

    pub fn belongs_to(to: impl Into<String>) -> Self {
        Self::new(RelationKind::BelongsTo, Some(to.into()))
    }

    pub fn has_one(to: impl Into<String>) -> Self {
        Self::new(RelationKind::HasOne, Some(to.into()))
    }

    pub fn has_many(to: impl Into<String>) -> Self {
        Self::new(RelationKind::HasMany, Some(to.into()))
    }

    pub fn has_many_through(through: impl Into<String>, using: impl Into<String>) -> Self {
        let mut relation = Self::new(RelationKind::HasManyThrough, None);
        relation.through = Some(through.into());
        relation.using = Some(using.into());
        relation
    }

    /// Explicit matching keys, `from` on the owner and `to` on the related kind.
    pub fn keys(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.keys = Some(RelationKeys::new(from, to));
        self
    }

    /// Static conditions merged into every fetch of this relation.
    pub fn conditions(mut self, conditions: JsonValue) -> Self {
        self.conditions = Some(conditions);
        self
    }

    pub(crate) fn into_descriptor(
        self,
        name: &str,
        from: &str,
        from_key: &str,
        config: &crate::MapperConfig,
    ) -> RelationDescriptor {
        let keys = match self.kind {
            RelationKind::HasManyThrough => None,
            RelationKind::BelongsTo => Some(
                self.keys
                    .unwrap_or_else(|| RelationKeys::new(config.reference_key(name), &config.key_field)),
            ),
            RelationKind::HasOne | RelationKind::HasMany => Some(
                self.keys
                    .unwrap_or_else(|| RelationKeys::new(from_key, config.reference_key(from))),
            ),
        };

        RelationDescriptor {
            name: name.to_string(),
            kind: self.kind,
            from: from.to_string(),
            to: self.to,
            keys,
            through: self.through,
            using: self.using,
            conditions: self.conditions,
        }
    }
}

/// A relation bound on a schema.
///
/// `to` and `keys` are absent for `HasManyThrough`, whose target is the
/// target of `through.using` and is resolved through the registry.
#[derive(Debug, Clone, PartialEq)]
pub struct RelationDescriptor {
    pub name: String,
    pub kind: RelationKind,
    pub from: String,
    pub to: Option<String>,
    pub keys: Option<RelationKeys>,
    pub through: Option<String>,
    pub using: Option<String>,
    pub conditions: Option<JsonValue>,
}

impl RelationDescriptor {
    pub fn is_through(&self) -> bool {
        self.kind == RelationKind::HasManyThrough
    }

    pub(crate) fn keys_or_err(&self) -> crate::Result<&RelationKeys> {
        self.keys.as_ref().ok_or_else(|| {
            crate::MapperError::MissingRelation(self.from.clone(), format!("{} (no keys)", self.name))
        })
    }

    pub(crate) fn through_parts(&self) -> crate::Result<(&str, &str)> {
        match (self.through.as_deref(), self.using.as_deref()) {
            (Some(through), Some(using)) => Ok((through, using)),
            _ => Err(crate::MapperError::MissingRelation(
                self.from.clone(),
                format!("{} (not a through relation)", self.name),
            )),
        }
    }
}
