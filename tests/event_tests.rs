mod common;

use memograph::{Result, Value};
use serde_json::json;

#[test]
fn test_nested_write_notifies_every_ancestor() -> Result<()> {
    let mut fixture = common::gallery();
    let graph = &mut fixture.graph;

    let gallery = graph.load(
        "galleries",
        json!({"id": 1, "name": "Summer", "images": [{"id": 1, "name": "beach"}, {"id": 2, "name": "sunset"}]}),
    )?;
    assert_eq!(graph.pending_events(), 0);

    let mut receiver = graph.subscribe();
    graph.set(gallery, "images.1.name", "dusk")?;

    let image = graph.get(gallery, "images.1")?.as_node().unwrap();
    let images = graph.get(gallery, "images")?.as_node().unwrap();
    let events = graph.flush_events();
    assert_eq!(events.len(), 3);
    assert_eq!(events[0].node, image);
    assert_eq!(events[0].paths, vec!["name".to_string()]);
    assert_eq!(events[1].node, images);
    assert_eq!(events[1].paths, vec!["1.name".to_string()]);
    assert_eq!(events[2].node, gallery);
    assert_eq!(events[2].paths, vec!["images.1.name".to_string()]);

    for expected in &events {
        assert_eq!(&receiver.try_recv().unwrap(), expected);
    }
    Ok(())
}

#[test]
fn test_noop_write_raises_nothing() -> Result<()> {
    let mut fixture = common::gallery();
    let graph = &mut fixture.graph;

    let gallery = graph.load("galleries", json!({"id": 1, "name": "Summer"}))?;
    graph.set(gallery, "name", "Summer")?;
    assert_eq!(graph.pending_events(), 0);

    graph.set(gallery, "name", "Spring")?;
    graph.set(gallery, "name", "Autumn")?;
    let events = graph.flush_events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].paths, vec!["name".to_string()]);
    Ok(())
}

#[test]
fn test_shared_child_notifies_both_owners() -> Result<()> {
    let mut fixture = common::gallery();
    let graph = &mut fixture.graph;

    let tag = graph.load("tags", json!({"id": 1, "name": "sea"}))?;
    let first = graph.create("images_tags", json!({"id": 1}))?;
    let second = graph.create("images_tags", json!({"id": 2}))?;
    graph.set(first, "tag", Value::Node(tag))?;
    graph.set(second, "tag", Value::Node(tag))?;
    assert_eq!(graph.parents(tag)?.len(), 2);
    graph.flush_events();

    graph.set(tag, "name", "ocean")?;
    let events = graph.flush_events();
    let notified: Vec<_> = events.iter().map(|event| event.node).collect();
    assert!(notified.contains(&first));
    assert!(notified.contains(&second));
    assert_eq!(events.iter().find(|e| e.node == first).unwrap().paths, vec!["tag.name".to_string()]);
    Ok(())
}
