use std::collections::{HashMap, HashSet};

use super::{Load, distinct_keys, fetch_rows};
use crate::core::{NodeId, Result, Value};
use crate::graph::{CastContext, Embed, Graph};
use crate::schema::RelationDescriptor;

/// Loads the parent of every owner with one fetch keyed on the owners'
/// foreign keys. Owners without a match get null.
pub(super) async fn embed(graph: &mut Graph, owners: &[NodeId], load: Load<'_>) -> Result<Vec<NodeId>> {
    let relation = load.relation;
    let keys = relation.keys_or_err()?.clone();
    let wanted = distinct_keys(graph, owners, &keys.from)?;
    let registry = graph.registry().clone();
    let rows = fetch_rows(&registry, &load, &keys.to, wanted.into_values().collect()).await?;

    let ctx = CastContext {
        exists: true,
        collector: load.collector,
    };
    let mut parents: HashMap<String, NodeId> = HashMap::new();
    let mut attached = Vec::new();
    for row in rows {
        let Some(key) = row.get(&keys.to).and_then(|key| Value::from(key.clone()).index_key())
        else {
            continue;
        };
        if parents.contains_key(&key) {
            continue;
        }
        let parent = graph.build_document(load.target.clone(), None, row, ctx)?;
        parents.insert(key, parent);
        if !attached.contains(&parent) {
            attached.push(parent);
        }
    }

    for owner in owners {
        let value = graph
            .peek(*owner, &keys.from)?
            .index_key()
            .and_then(|key| parents.get(&key).copied())
            .map(Value::Node)
            .unwrap_or(Value::Null);
        graph.attach(*owner, &relation.name, value)?;
    }

    // Rows no owner claimed.
    for node in &attached {
        graph.drop_orphan(&Value::Node(*node))?;
    }
    attached.retain(|node| graph.contains(*node));
    Ok(attached)
}

/// Saves the loaded parent of `owner`, then copies its key into the
/// owner's foreign key.
pub(super) async fn save_parent(
    graph: &mut Graph,
    owner: NodeId,
    relation: &RelationDescriptor,
    embed: &Embed,
    visited: &mut HashSet<NodeId>,
) -> Result<()> {
    let Value::Node(parent) = graph.peek(owner, &relation.name)? else {
        return Ok(());
    };
    graph.save_node(parent, embed, visited).await?;

    let keys = relation.keys_or_err()?;
    let key = graph.peek(parent, &keys.to)?;
    if !key.is_null() {
        graph.write(owner, &keys.from, key, true)?;
    }
    Ok(())
}
