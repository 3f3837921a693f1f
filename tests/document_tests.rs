mod common;

use memograph::{Embed, ExportOptions, MapperError, ModifiedOptions, Result, Value};
use serde_json::json;

#[test]
fn test_belongs_to_write_derives_foreign_key() -> Result<()> {
    let mut fixture = common::gallery();
    let graph = &mut fixture.graph;

    let image = graph.create("images", json!({"name": "beach"}))?;
    graph.set(image, "gallery", json!({"id": 1, "name": "G"}))?;
    assert_eq!(graph.get(image, "gallery_id")?, Value::Integer(1));
    assert_eq!(graph.get(image, "gallery.name")?, Value::from("G"));

    graph.set(image, "gallery", Value::Null)?;
    assert_eq!(graph.get(image, "gallery_id")?, Value::Null);
    Ok(())
}

#[test]
fn test_set_through_alias_creates_pivot_row() -> Result<()> {
    let mut fixture = common::gallery();
    let graph = &mut fixture.graph;

    let image = graph.create("images", json!({"name": "beach"}))?;
    graph.set(image, "tags.0", json!({"id": 1, "name": "x"}))?;

    let pivot = graph.get(image, "images_tags")?.as_node().unwrap();
    assert_eq!(graph.count(pivot)?, 1);
    let tag = graph.get(image, "images_tags.0.tag")?.as_node().unwrap();
    assert_eq!(graph.data(tag)?, json!({"id": 1, "name": "x"}));
    assert_eq!(graph.get(image, "images_tags.0.tag_id")?, Value::Integer(1));
    assert_eq!(graph.get(image, "tags.0.name")?, Value::from("x"));
    Ok(())
}

#[test]
fn test_get_after_set_is_cast() -> Result<()> {
    let mut fixture = common::gallery();
    let graph = &mut fixture.graph;

    let image = graph.create("images", json!({}))?;
    graph.set(image, "id", "7")?;
    graph.set(image, "created", "2024-01-02T03:04:05Z")?;
    assert_eq!(graph.get(image, "id")?, Value::Integer(7));
    assert!(matches!(graph.get(image, "created")?, Value::Timestamp(_)));
    assert_eq!(graph.data(image)?["created"], json!("2024-01-02 03:04:05"));
    Ok(())
}

#[test]
fn test_unloaded_relation_on_stored_entity() -> Result<()> {
    let mut fixture = common::gallery();
    let graph = &mut fixture.graph;

    let image = graph.load("images", json!({"id": 1, "gallery_id": 1, "name": "beach"}))?;
    match graph.get(image, "gallery") {
        Err(MapperError::RelationNotEmbedded(source, name)) => {
            assert_eq!(source, "images");
            assert_eq!(name, "gallery");
        }
        other => panic!("Expected RelationNotEmbedded, got {:?}", other),
    }

    // A fresh entity cannot have stored relations
    let fresh = graph.create("images", json!({"name": "new"}))?;
    let images_tags = graph.get(fresh, "images_tags")?.as_node().unwrap();
    assert_eq!(graph.count(images_tags)?, 0);
    assert_eq!(graph.get(fresh, "gallery")?, Value::Null);
    Ok(())
}

#[test]
fn test_fetch_handler_resolves_lazily() -> Result<()> {
    let mut fixture = common::gallery();
    let graph = &mut fixture.graph;

    let image = graph.load("images", json!({"id": 1, "gallery_id": 2, "name": "snow"}))?;
    let options = memograph::GetOptions::fetch(|graph, owner, relation| {
        assert_eq!(relation, "gallery");
        let key = graph.peek(owner, "gallery_id")?;
        Ok(json!({"id": key.to_json(), "name": "Winter"}))
    });
    assert_eq!(graph.get_with(image, "gallery.name", &options)?, Value::from("Winter"));
    assert!(!graph.modified(image)?);
    Ok(())
}

#[test]
fn test_nested_modification_dirties_owner() -> Result<()> {
    let mut fixture = common::gallery();
    let graph = &mut fixture.graph;

    let gallery = graph.load(
        "galleries",
        json!({"id": 1, "name": "Summer", "images": [{"id": 1, "name": "beach"}]}),
    )?;
    assert!(!graph.modified(gallery)?);

    graph.set(gallery, "images.0.name", "shore")?;
    assert!(graph.modified(gallery)?);

    let shallow = ModifiedOptions {
        embed: Embed::None,
        ignore: Vec::new(),
    };
    assert!(!graph.modified_with(gallery, &shallow)?);

    graph.amend(gallery)?;
    assert!(!graph.modified(gallery)?);
    Ok(())
}

#[test]
fn test_hierarchy_collapses_through_paths() -> Result<()> {
    let mut fixture = common::gallery();
    let graph = &mut fixture.graph;

    let gallery = graph.load(
        "galleries",
        json!({
            "id": 1,
            "images": [
                {"id": 1, "images_tags": [{"id": 1, "tag_id": 1, "tag": {"id": 1, "name": "sea"}}]},
                {"id": 2}
            ]
        }),
    )?;
    assert_eq!(graph.hierarchy(gallery)?, vec!["images.tags".to_string()]);

    let export = graph.to_array(gallery)?;
    assert_eq!(export["images"][0]["tags"], json!([{"id": 1, "name": "sea"}]));

    let only = graph.to_array_with(gallery, &ExportOptions::new().embed(Embed::None))?;
    assert!(only.get("images").is_none());
    Ok(())
}

#[test]
fn test_unset_removes_field() -> Result<()> {
    let mut fixture = common::gallery();
    let graph = &mut fixture.graph;

    let image = graph.load("images", json!({"id": 1, "name": "beach"}))?;
    assert!(graph.has(image, "name")?);
    graph.unset(image, "name")?;
    assert!(!graph.has(image, "name")?);
    assert!(graph.modified(image)?);
    Ok(())
}

#[test]
fn test_circular_relations_are_walked_once() -> Result<()> {
    let mut fixture = common::gallery();
    let graph = &mut fixture.graph;

    let image = graph.load("images", json!({"id": 1, "gallery_id": 1, "name": "beach"}))?;
    let gallery = graph.load("galleries", json!({"id": 1, "name": "Summer", "images": []}))?;
    let images = graph.get(gallery, "images")?.as_node().unwrap();
    graph.push(images, Value::Node(image))?;
    graph.set(image, "gallery", Value::Node(gallery))?;

    assert_eq!(graph.hierarchy(image)?, vec!["gallery.images".to_string()]);
    assert_eq!(graph.hierarchy(gallery)?, vec!["images.gallery".to_string()]);

    assert!(graph.modified(image)?);
    graph.amend(image)?;
    assert!(!graph.modified(image)?);
    assert!(!graph.modified(gallery)?);
    Ok(())
}
