#![allow(dead_code)]

use std::sync::Arc;

use memograph::{FieldDef, Graph, MemoryProvider, Registry, Relation, Schema};
use serde_json::json;

/// Galleries own images; images and tags meet through `images_tags`.
pub struct Gallery {
    pub graph: Graph,
    pub galleries: Arc<MemoryProvider>,
    pub images: Arc<MemoryProvider>,
    pub images_tags: Arc<MemoryProvider>,
    pub tags: Arc<MemoryProvider>,
}

pub fn registry() -> Registry {
    let mut registry = Registry::new();
    registry
        .register(
            Schema::new("galleries")
                .column("id", FieldDef::new("id"))
                .column("name", FieldDef::new("string"))
                .bind("images", Relation::has_many("images")),
        )
        .unwrap();
    registry
        .register(
            Schema::new("images")
                .column("id", FieldDef::new("id"))
                .column("gallery_id", FieldDef::new("id"))
                .column("name", FieldDef::new("string"))
                .column("created", FieldDef::new("datetime"))
                .bind("gallery", Relation::belongs_to("galleries"))
                .bind("images_tags", Relation::has_many("images_tags"))
                .bind("tags", Relation::has_many_through("images_tags", "tag")),
        )
        .unwrap();
    registry
        .register(
            Schema::new("images_tags")
                .column("id", FieldDef::new("id"))
                .column("image_id", FieldDef::new("id"))
                .column("tag_id", FieldDef::new("id"))
                .bind("image", Relation::belongs_to("images"))
                .bind("tag", Relation::belongs_to("tags")),
        )
        .unwrap();
    registry
        .register(
            Schema::new("tags")
                .column("id", FieldDef::new("id"))
                .column("name", FieldDef::new("string"))
                .bind("images_tags", Relation::has_many("images_tags"))
                .bind("images", Relation::has_many_through("images_tags", "image")),
        )
        .unwrap();
    registry
}

pub fn gallery() -> Gallery {
    let galleries = Arc::new(MemoryProvider::new(vec![
        json!({"id": 1, "name": "Summer"}),
        json!({"id": 2, "name": "Winter"}),
    ]));
    let images = Arc::new(MemoryProvider::new(vec![
        json!({"id": 1, "gallery_id": 1, "name": "beach"}),
        json!({"id": 2, "gallery_id": 1, "name": "sunset"}),
        json!({"id": 3, "gallery_id": 2, "name": "snow"}),
    ]));
    let images_tags = Arc::new(MemoryProvider::new(vec![
        json!({"id": 1, "image_id": 1, "tag_id": 1}),
        json!({"id": 2, "image_id": 1, "tag_id": 2}),
        json!({"id": 3, "image_id": 2, "tag_id": 1}),
    ]));
    let tags = Arc::new(MemoryProvider::new(vec![
        json!({"id": 1, "name": "sea"}),
        json!({"id": 2, "name": "sky"}),
    ]));

    let mut registry = registry();
    registry.provide("galleries", galleries.clone());
    registry.provide("images", images.clone());
    registry.provide("images_tags", images_tags.clone());
    registry.provide("tags", tags.clone());

    Gallery {
        graph: Graph::new(Arc::new(registry)),
        galleries,
        images,
        images_tags,
        tags,
    }
}

/// The three stored images as one loaded collection.
pub async fn loaded_images(fixture: &mut Gallery) -> memograph::NodeId {
    let rows = fixture.images.rows().await;
    fixture
        .graph
        .create_with("images", json!(rows), memograph::CreateOptions::new().exists(true))
        .unwrap()
}
