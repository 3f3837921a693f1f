mod common;

use indexmap::IndexMap;
use memograph::{EmbedTree, MapperError, RelationKind, Relation, Result, Schema};
use serde_json::json;

#[test]
fn test_expand_rewrites_through_aliases() -> Result<()> {
    let registry = common::registry();
    let images = registry.schema("images")?;

    let mut paths = IndexMap::new();
    paths.insert("tags".to_string(), Some(json!({"name": "sea"})));
    paths.insert("gallery.images".to_string(), None);
    paths.insert("gallery.images.tags.images".to_string(), None);

    let expanded = images.expand(&registry, &paths)?;
    let keys: Vec<&str> = expanded.keys().map(String::as_str).collect();
    assert_eq!(
        keys,
        vec![
            "images_tags.tag",
            "gallery.images",
            "gallery.images.images_tags.tag.images_tags.image",
        ]
    );
    // Options stay attached to the rewritten path
    assert_eq!(expanded["images_tags.tag"], Some(json!({"name": "sea"})));
    Ok(())
}

#[test]
fn test_treeify_collapses_aliases_and_is_idempotent() -> Result<()> {
    let registry = common::registry();
    let images = registry.schema("images")?;

    let tree = images.treeify_paths(&registry, ["tags", "gallery"])?;
    assert!(tree.contains("images_tags"));
    assert!(tree.contains("gallery"));
    assert!(!tree.contains("tags"));
    assert_eq!(tree.subtree("images_tags").paths(), vec!["tag".to_string()]);

    let again = images.treeify(&registry, &tree)?;
    assert_eq!(again, tree);
    Ok(())
}

#[test]
fn test_treeify_keeps_conditions_on_the_target() -> Result<()> {
    let registry = common::registry();
    let images = registry.schema("images")?;

    let mut raw = EmbedTree::new();
    raw.insert("tags", Some(json!({"name": "sky"})))?;
    let tree = images.treeify(&registry, &raw)?;

    let pivot = tree.get("images_tags").unwrap();
    assert_eq!(pivot.conditions, None);
    assert_eq!(
        pivot.embed.get("tag").unwrap().conditions,
        Some(json!({"name": "sky"}))
    );
    Ok(())
}

#[test]
fn test_counterpart_is_symmetric() -> Result<()> {
    let registry = common::registry();

    let gallery = registry.relation("images", "gallery")?;
    let images = registry.counterpart(&gallery)?;
    assert_eq!(images.name, "images");
    assert_eq!(images.kind, RelationKind::HasMany);
    assert_eq!(registry.counterpart(&images)?, gallery);

    let tags = registry.relation("images", "tags")?;
    let inverse = registry.counterpart(&tags)?;
    assert_eq!(inverse.from, "tags");
    assert_eq!(inverse.name, "images");
    assert_eq!(registry.counterpart(&inverse)?, tags);
    Ok(())
}

#[test]
fn test_counterpart_rejects_two_inverses() -> Result<()> {
    let mut registry = common::registry();
    registry.unregister("galleries")?;
    registry.register(
        Schema::new("galleries")
            .bind("images", Relation::has_many("images"))
            .bind("covers", Relation::has_many("images")),
    )?;

    let gallery = registry.relation("images", "gallery")?;
    match registry.counterpart(&gallery) {
        Err(MapperError::AmbiguousCounterpart(..)) => {}
        other => panic!("Expected AmbiguousCounterpart, got {:?}", other),
    }
    Ok(())
}

#[test]
fn test_through_target_resolves_via_pivot() -> Result<()> {
    let registry = common::registry();
    let tags = registry.relation("images", "tags")?;
    assert_eq!(registry.target_of(&tags)?.source(), "tags");
    Ok(())
}
