use std::collections::HashSet;

use indexmap::IndexMap;

use super::{Load, distinct_keys, fetch_rows};
use crate::core::{NodeId, Result, Value};
use crate::graph::{CastContext, Embed, Graph};
use crate::schema::{RelationDescriptor, RelationKind};

/// Loads the children of every owner with one fetch keyed on the owners'
/// keys and groups them back per owner.
///
/// `HasOne` attaches the first match or null, `HasMany` a collection that
/// may be empty. Returns every attached child once.
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
    let mut groups: IndexMap<String, Vec<NodeId>> = IndexMap::new();
    let mut attached: Vec<NodeId> = Vec::new();
    for row in rows {
        let Some(key) = row.get(&keys.to).and_then(|key| Value::from(key.clone()).index_key())
        else {
            continue;
        };
        let child = graph.build_document(load.target.clone(), None, row, ctx)?;
        let group = groups.entry(key).or_default();
        if !group.contains(&child) {
            group.push(child);
        }
        if !attached.contains(&child) {
            attached.push(child);
        }
    }

    for owner in owners {
        let children = graph
            .peek(*owner, &keys.from)?
            .index_key()
            .and_then(|key| groups.get(&key).cloned())
            .unwrap_or_default();
        let value = match relation.kind {
            RelationKind::HasOne => children.first().copied().map(Value::Node).unwrap_or(Value::Null),
            _ => {
                let items = children.into_iter().map(Value::Node).collect();
                Value::Node(graph.build_collection(Some(load.target.clone()), None, items, ctx)?)
            }
        };
        graph.attach(*owner, &relation.name, value)?;
    }

    // Rows no owner claimed.
    for node in &attached {
        graph.drop_orphan(&Value::Node(*node))?;
    }
    attached.retain(|node| graph.contains(*node));
    Ok(attached)
}

/// Propagates the owner's key into every loaded child and saves them.
pub(super) async fn save_children(
    graph: &mut Graph,
    owner: NodeId,
    relation: &RelationDescriptor,
    embed: &Embed,
    visited: &mut HashSet<NodeId>,
) -> Result<()> {
    let Value::Node(related) = graph.peek(owner, &relation.name)? else {
        return Ok(());
    };
    let keys = relation.keys_or_err()?;
    let key = graph.peek(owner, &keys.from)?;

    let children: Vec<NodeId> = if graph.is_collection(related) {
        graph.values(related)?.iter().filter_map(Value::as_node).collect()
    } else {
        vec![related]
    };
    for child in children {
        if !key.is_null() {
            graph.write(child, &keys.to, key.clone(), true)?;
        }
        graph.save_node(child, embed, visited).await?;
    }

    if graph.is_collection(related) {
        graph.amend_record(related)?;
    }
    Ok(())
}
