use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value as JsonValue;

use super::Schema;
use crate::Registry;
use crate::core::{Result, split_path};

/// One relation entry of an [`EmbedTree`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmbedNode {
    /// Extra fetch conditions for this relation.
    pub conditions: Option<JsonValue>,
    pub embed: EmbedTree,
}

/// Nested relation paths keyed by relation name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmbedTree {
    nodes: IndexMap<String, EmbedNode>,
}

impl EmbedTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Nests dotted paths as given, without resolving aliases.
    pub fn from_paths<I, S>(paths: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut tree = Self::new();
        for path in paths {
            tree.insert(path.as_ref(), None)?;
        }
        Ok(tree)
    }

    /// Adds `path`, attaching `conditions` to its last segment.
    pub fn insert(&mut self, path: &str, conditions: Option<JsonValue>) -> Result<()> {
        let segments = split_path(path)?;
        let mut current = self;
        let last = segments.len() - 1;
        for (i, segment) in segments.into_iter().enumerate() {
            let node = current.nodes.entry(segment.to_string()).or_default();
            if i == last {
                if conditions.is_some() {
                    node.conditions = conditions;
                }
                break;
            }
            current = &mut node.embed;
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&EmbedNode> {
        self.nodes.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    /// Sub-tree below `name`, empty when `name` is absent.
    pub fn subtree(&self, name: &str) -> EmbedTree {
        self.nodes
            .get(name)
            .map(|node| node.embed.clone())
            .unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &EmbedNode)> {
        self.nodes.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Leaf paths of the tree in insertion order.
    pub fn paths(&self) -> Vec<String> {
        let mut paths = Vec::new();
        for (name, node) in &self.nodes {
            if node.embed.is_empty() {
                paths.push(name.clone());
            } else {
                paths.extend(
                    node.embed
                        .paths()
                        .into_iter()
                        .map(|sub| format!("{}.{}", name, sub)),
                );
            }
        }
        paths
    }

    pub(crate) fn merge(&mut self, name: String, node: EmbedNode) {
        match self.nodes.get_mut(&name) {
            Some(existing) => {
                if node.conditions.is_some() {
                    existing.conditions = node.conditions;
                }
                for (sub_name, sub_node) in node.embed.nodes {
                    existing.embed.merge(sub_name, sub_node);
                }
            }
            None => {
                self.nodes.insert(name, node);
            }
        }
    }
}

impl Schema {
    /// Rewrites `HasManyThrough` aliases into their `pivot.target` form,
    /// keeping the options attached to each path.
    pub fn expand(
        &self,
        registry: &Registry,
        paths: &IndexMap<String, Option<JsonValue>>,
    ) -> Result<IndexMap<String, Option<JsonValue>>> {
        let mut expanded = IndexMap::new();
        for (path, options) in paths {
            expanded.insert(self.expand_path(registry, path)?, options.clone());
        }
        Ok(expanded)
    }

    fn expand_path(&self, registry: &Registry, path: &str) -> Result<String> {
        let segments = split_path(path)?;
        let mut resolved: Vec<String> = Vec::with_capacity(segments.len());
        let mut target: Option<Arc<Schema>> = None;

        for (i, segment) in segments.iter().enumerate() {
            let next = {
                let schema = target.as_deref().unwrap_or(self);
                if !schema.has_relation(segment) {
                    resolved.extend(segments[i..].iter().map(|s| s.to_string()));
                    break;
                }
                let relation = schema.relation(segment)?;
                if relation.is_through() {
                    let (through, using) = relation.through_parts()?;
                    resolved.push(through.to_string());
                    resolved.push(using.to_string());
                } else {
                    resolved.push(segment.to_string());
                }
                registry.target_of(relation)?
            };
            target = Some(next);
        }

        Ok(resolved.join("."))
    }

    /// Turns relation paths into a nested tree, collapsing every
    /// `HasManyThrough` alias into `{pivot: {embed: {target: ..}}}`.
    ///
    /// Names that are not relations are kept as is. Already collapsed trees
    /// come back unchanged.
    pub fn treeify(&self, registry: &Registry, tree: &EmbedTree) -> Result<EmbedTree> {
        let mut result = EmbedTree::new();
        for (name, node) in tree.iter() {
            if !self.has_relation(name) {
                result.merge(name.clone(), node.clone());
                continue;
            }
            let relation = self.relation(name)?;
            let target = registry.target_of(relation)?;
            let embed = target.treeify(registry, &node.embed)?;

            if relation.is_through() {
                let (through, using) = relation.through_parts()?;
                let mut inner = EmbedTree::new();
                inner.merge(
                    using.to_string(),
                    EmbedNode {
                        conditions: node.conditions.clone(),
                        embed,
                    },
                );
                result.merge(
                    through.to_string(),
                    EmbedNode {
                        conditions: None,
                        embed: inner,
                    },
                );
            } else {
                result.merge(
                    name.clone(),
                    EmbedNode {
                        conditions: node.conditions.clone(),
                        embed,
                    },
                );
            }
        }
        Ok(result)
    }

    pub fn treeify_paths<I, S>(&self, registry: &Registry, paths: I) -> Result<EmbedTree>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.treeify(registry, &EmbedTree::from_paths(paths)?)
    }
}
