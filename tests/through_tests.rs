mod common;

use memograph::{NodeId, Result, Through, Value};
use serde_json::json;

fn tagged_image(graph: &mut memograph::Graph) -> Result<(NodeId, Through)> {
    let image = graph.load(
        "images",
        json!({
            "id": 1,
            "name": "beach",
            "images_tags": [
                {"id": 1, "image_id": 1, "tag_id": 2, "tag": {"id": 2, "name": "sky"}},
                {"id": 2, "image_id": 1, "tag_id": 1, "tag": {"id": 1, "name": "sea"}}
            ]
        }),
    )?;
    let through = graph.get(image, "tags")?.as_through().cloned().unwrap();
    Ok((image, through))
}

#[test]
fn test_push_grows_pivot_by_one() -> Result<()> {
    let mut fixture = common::gallery();
    let graph = &mut fixture.graph;
    let (image, tags) = tagged_image(graph)?;

    let pivot = graph.get(image, "images_tags")?.as_node().unwrap();
    let before = graph.count(pivot)?;
    let row = tags.push(graph, json!({"id": 3, "name": "sand"}))?;
    assert_eq!(graph.count(pivot)?, before + 1);

    // The owner is stored, so the new row points back at it
    assert_eq!(graph.peek(row, "image_id")?, Value::Integer(1));
    assert_eq!(graph.peek(row, "tag_id")?, Value::Integer(3));
    assert!(graph.modified(image)?);
    Ok(())
}

#[test]
fn test_projection_reads_far_side() -> Result<()> {
    let mut fixture = common::gallery();
    let graph = &mut fixture.graph;
    let (_, tags) = tagged_image(graph)?;

    assert_eq!(tags.count(graph)?, 2);
    let first = tags.get(graph, 0)?.as_node().unwrap();
    assert_eq!(graph.peek(first, "name")?, Value::from("sky"));
    assert_eq!(tags.get(graph, 5)?, Value::Null);
    assert_eq!(
        tags.to_array(graph)?,
        json!([{"id": 2, "name": "sky"}, {"id": 1, "name": "sea"}])
    );
    Ok(())
}

#[test]
fn test_sort_and_unset_reorder_pivot_rows() -> Result<()> {
    let mut fixture = common::gallery();
    let graph = &mut fixture.graph;
    let (image, tags) = tagged_image(graph)?;

    tags.sort_by(graph, |graph, a, b| {
        let a = graph.peek(a.as_node().unwrap(), "name").unwrap();
        let b = graph.peek(b.as_node().unwrap(), "name").unwrap();
        a.compare(&b).unwrap()
    })?;
    assert_eq!(graph.get(image, "tags.0.name")?, Value::from("sea"));
    assert_eq!(graph.get(image, "images_tags.0.id")?, Value::Integer(2));

    tags.unset(graph, 0)?;
    assert_eq!(tags.count(graph)?, 1);
    assert_eq!(graph.get(image, "tags.0.name")?, Value::from("sky"));
    Ok(())
}

#[test]
fn test_assigning_alias_replaces_rows() -> Result<()> {
    let mut fixture = common::gallery();
    let graph = &mut fixture.graph;
    let (image, tags) = tagged_image(graph)?;

    graph.set(image, "tags", json!([{"id": 9, "name": "dune"}]))?;
    assert_eq!(tags.count(graph)?, 1);
    assert_eq!(graph.get(image, "images_tags.0.tag_id")?, Value::Integer(9));

    tags.set(graph, 1, json!({"id": 10, "name": "wave"}))?;
    assert_eq!(tags.count(graph)?, 2);
    assert!(matches!(
        tags.set(graph, 4, json!({"id": 11})),
        Err(memograph::MapperError::InvalidIndex(_))
    ));
    Ok(())
}

#[test]
fn test_replacing_alias_drops_previous_rows() -> Result<()> {
    let mut fixture = common::gallery();
    let graph = &mut fixture.graph;
    let (image, tags) = tagged_image(graph)?;
    assert_eq!(graph.len(), 6);
    let old_pivot = graph.get(image, "images_tags")?.as_node().unwrap();
    let sky = tags.get(graph, 0)?.as_node().unwrap();

    // 1. Image, new pivot collection, one row, one tag
    graph.set(image, "tags", json!([{"id": 9, "name": "dune"}]))?;
    assert_eq!(graph.len(), 4);
    assert!(!graph.contains(old_pivot));
    assert!(!graph.contains(sky));

    graph.set(image, "tags", json!([{"id": 9, "name": "dune"}]))?;
    assert_eq!(graph.len(), 4);

    // 2. Reassigning its own far entities keeps them alive
    let dune = tags.get(graph, 0)?.as_node().unwrap();
    graph.set(image, "tags", Value::Through(tags.clone()))?;
    assert_eq!(graph.len(), 4);
    assert_eq!(tags.get(graph, 0)?, Value::Node(dune));
    assert_eq!(graph.get(image, "tags.0.name")?, Value::from("dune"));
    Ok(())
}
