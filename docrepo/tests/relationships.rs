mod common;

use async_trait::async_trait;
use docrepo::{memory::InMemoryStore, prelude::*};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

use common::init_tracing;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Entity)]
#[entity(collection = "articles")]
struct Article {
    id: String,
    title: String,
    tag_ids: Vec<String>,
    author_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Entity)]
#[entity(collection = "tags")]
struct Tag {
    id: String,
    label: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Entity)]
#[entity(collection = "authors")]
struct Author {
    id: String,
    name: String,
}

fn article(id: &str) -> Article {
    Article { id: id.to_string(), title: format!("article {id}"), ..Article::default() }
}

fn ids(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

async fn seeded_store() -> DocumentStore {
    let store = DocumentStore::new(InMemoryStore::new());
    let mut session = store.open_session();

    session.store(&article("a-1")).unwrap();
    for id in ["t-1", "t-2", "t-3"] {
        session.store(&Tag { id: id.into(), label: id.to_uppercase() }).unwrap();
    }
    session.store(&Author { id: "u-1".into(), name: "Ursula".into() }).unwrap();
    session.save_changes().await.unwrap();

    store
}

fn registry() -> Arc<RelationshipRegistry> {
    Arc::new(RelationshipRegistry::new().with_entity::<Tag>().with_entity::<Author>())
}

#[tokio::test]
async fn has_many_links_existing_ids_in_request_order() {
    init_tracing();
    let store = seeded_store().await;
    let mut repository = DocumentRepository::<Article>::new(store.open_session()).with_relationships(registry());
    let parent = repository.get_by_id(&"a-1".to_string()).await.unwrap().unwrap();
    let tags = RelationshipAttribute::has_many::<Tag>("tags", "tag_ids");

    repository
        .update_relationships(&parent, &tags, &ids(&["t-3", "missing", "t-1", "t-3"]))
        .await
        .unwrap();

    let stored = repository.get_by_id(&"a-1".to_string()).await.unwrap().unwrap();
    assert_eq!(stored.tag_ids, ids(&["t-3", "t-1"]));
    assert_eq!(stored.title, "article a-1");
}

#[tokio::test]
async fn has_many_with_no_ids_clears_the_relationship() {
    let store = seeded_store().await;
    let mut repository = DocumentRepository::<Article>::new(store.open_session()).with_relationships(registry());
    let tags = RelationshipAttribute::has_many::<Tag>("tags", "tag_ids");
    let parent = repository.get_by_id(&"a-1".to_string()).await.unwrap().unwrap();

    repository.update_relationships(&parent, &tags, &ids(&["t-1", "t-2"])).await.unwrap();
    let parent = repository.get_by_id(&"a-1".to_string()).await.unwrap().unwrap();
    repository.update_relationships(&parent, &tags, &[]).await.unwrap();

    let stored = repository.get_by_id(&"a-1".to_string()).await.unwrap().unwrap();
    assert!(stored.tag_ids.is_empty());
}

#[tokio::test]
async fn has_one_sets_and_clears_the_related_identity() {
    let store = seeded_store().await;
    let mut repository = DocumentRepository::<Article>::new(store.open_session()).with_relationships(registry());
    let author = RelationshipAttribute::has_one::<Author>("author", "author_id");
    let parent = repository.get_by_id(&"a-1".to_string()).await.unwrap().unwrap();

    repository.update_relationships(&parent, &author, &ids(&["u-1"])).await.unwrap();
    let linked = repository.get_by_id(&"a-1".to_string()).await.unwrap().unwrap();
    assert_eq!(linked.author_id.as_deref(), Some("u-1"));

    repository.update_relationships(&linked, &author, &[]).await.unwrap();
    let cleared = repository.get_by_id(&"a-1".to_string()).await.unwrap().unwrap();
    assert_eq!(cleared.author_id, None);
}

#[tokio::test]
async fn unregistered_related_type_is_reported() {
    let store = seeded_store().await;
    let registry = Arc::new(RelationshipRegistry::new().with_entity::<Tag>());
    let mut repository = DocumentRepository::<Article>::new(store.open_session()).with_relationships(registry);
    let author = RelationshipAttribute::has_one::<Author>("author", "author_id");

    let result = repository
        .update_relationships(&article("a-1"), &author, &ids(&["u-1"]))
        .await;

    assert!(matches!(result, Err(DocumentStoreError::HandlerNotFound(_))));
}

#[tokio::test]
async fn unknown_internal_name_is_reported() {
    let store = seeded_store().await;
    let mut repository = DocumentRepository::<Article>::new(store.open_session()).with_relationships(registry());
    let tags = RelationshipAttribute::has_many::<Tag>("tags", "labels");

    let result = repository
        .update_relationships(&article("a-1"), &tags, &ids(&["t-1"]))
        .await;

    assert!(matches!(result, Err(DocumentStoreError::FieldNotFound(..))));
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Entity)]
#[entity(collection = "levels")]
struct Level {
    id: i64,
    label: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Entity)]
#[entity(collection = "boards")]
struct Board {
    id: String,
    level_ids: Vec<i64>,
    top_level_id: Option<i64>,
}

async fn seeded_boards() -> DocumentStore {
    let store = DocumentStore::new(InMemoryStore::new());
    let mut session = store.open_session();

    session.store(&Board { id: "b-1".into(), ..Board::default() }).unwrap();
    for id in [1, 2, 3] {
        session.store(&Level { id, label: format!("level {id}") }).unwrap();
    }
    session.store(&Tag { id: "t-1".into(), label: "T-1".into() }).unwrap();
    session.save_changes().await.unwrap();

    store
}

fn board_repository(store: &DocumentStore) -> DocumentRepository<Board> {
    let registry = RelationshipRegistry::new().with_entity::<Level>().with_entity::<Tag>();
    DocumentRepository::<Board>::new(store.open_session()).with_relationships(Arc::new(registry))
}

#[tokio::test]
async fn numeric_identities_are_embedded_as_numbers() {
    let store = seeded_boards().await;
    let mut repository = board_repository(&store);
    let levels = RelationshipAttribute::has_many::<Level>("levels", "level_ids");
    let top = RelationshipAttribute::has_one::<Level>("top-level", "top_level_id");
    let board = repository.get_by_id(&"b-1".to_string()).await.unwrap().unwrap();

    repository
        .update_relationships(&board, &levels, &ids(&["3", "9", "1"]))
        .await
        .unwrap();
    let board = repository.get_by_id(&"b-1".to_string()).await.unwrap().unwrap();
    repository.update_relationships(&board, &top, &ids(&["2"])).await.unwrap();

    let stored = repository.get_by_id(&"b-1".to_string()).await.unwrap().unwrap();
    assert_eq!(stored.level_ids, vec![3, 1]);
    assert_eq!(stored.top_level_id, Some(2));
    assert_eq!(repository.to_list(repository.get_all().unwrap()).await.unwrap(), vec![stored]);
}

#[tokio::test]
async fn mistyped_relationship_is_rejected_without_writing() {
    let store = seeded_boards().await;
    let mut repository = board_repository(&store);
    let tags = RelationshipAttribute::has_many::<Tag>("tags", "level_ids");
    let board = repository.get_by_id(&"b-1".to_string()).await.unwrap().unwrap();

    let result = repository
        .update_relationships(&board, &tags, &ids(&["t-1"]))
        .await;

    assert!(matches!(result, Err(DocumentStoreError::InvalidDocument(_))));
    assert_eq!(repository.get_by_id(&"b-1".to_string()).await.unwrap(), Some(board));
    assert_eq!(repository.session().pending_changes(), 0);
}

type Calls = Arc<Mutex<Vec<(String, String, Vec<String>)>>>;

struct AuditingHandler {
    calls: Calls,
}

#[async_trait]
impl RelationshipHandler for AuditingHandler {
    async fn update_relationships(
        &self,
        _session: &mut DocumentSession,
        parent: ParentDocument,
        relationship: &RelationshipAttribute,
        related_ids: &[String],
    ) -> DocumentStoreResult<()> {
        self.calls.lock().unwrap().push((
            parent.key,
            relationship.public_name().to_string(),
            related_ids.to_vec(),
        ));
        Ok(())
    }
}

#[tokio::test]
async fn custom_handler_receives_the_parent_and_ids() {
    let store = seeded_store().await;
    let calls = Calls::default();
    let handler = AuditingHandler { calls: calls.clone() };
    let registry = Arc::new(RelationshipRegistry::new().with_handler::<Tag>(handler));
    let mut repository = DocumentRepository::<Article>::new(store.open_session()).with_relationships(registry);
    let tags = RelationshipAttribute::has_many::<Tag>("tags", "tag_ids");

    repository
        .update_relationships(&article("a-1"), &tags, &ids(&["t-2"]))
        .await
        .unwrap();

    assert_eq!(
        calls.lock().unwrap().as_slice(),
        &[("a-1".to_string(), "tags".to_string(), ids(&["t-2"]))]
    );
    let stored = repository.get_by_id(&"a-1".to_string()).await.unwrap().unwrap();
    assert!(stored.tag_ids.is_empty());
}
