use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

pub mod memory;
pub mod postgres;

/// Schema-flexible record as stored in a collection.
pub type Document = Map<String, Value>;

/// Reserved key carrying the store-assigned id.
pub const ID_FIELD: &str = "_id";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Products,
    Bids,
    Users,
}

impl Collection {
    pub fn name(self) -> &'static str {
        match self {
            Collection::Products => "products",
            Collection::Bids => "bids",
            Collection::Users => "users",
        }
    }

    /// Field that must be unique across the collection, if any.
    pub fn unique_key(self) -> Option<&'static str> {
        match self {
            Collection::Users => Some("email"),
            _ => None,
        }
    }
}

/// Equality filter: every entry must match the document's top-level field.
/// `_id` is matched against the store-assigned id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    id: Option<Uuid>,
    fields: Map<String, Value>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn by_id(id: Uuid) -> Self {
        Self { id: Some(id), fields: Map::new() }
    }

    pub fn eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(field.to_string(), value.into());
        self
    }

    pub fn id(&self) -> Option<Uuid> {
        self.id
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn is_empty(&self) -> bool {
        self.id.is_none() && self.fields.is_empty()
    }

    pub fn matches(&self, id: Uuid, doc: &Document) -> bool {
        if self.id.is_some_and(|want| want != id) {
            return false;
        }
        self.fields.iter().all(|(k, v)| doc.get(k) == Some(v))
    }
}

/// Descending order on a top-level field; documents without it come last.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    pub field: String,
}

impl Sort {
    pub fn desc(field: &str) -> Self {
        Self { field: field.to_string() }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindQuery {
    pub filter: Filter,
    pub sort: Option<Sort>,
    pub limit: Option<i64>,
}

impl FindQuery {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn filtered(filter: Filter) -> Self {
        Self { filter, ..Self::default() }
    }

    pub fn sort(mut self, sort: Sort) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InsertOneResult {
    pub acknowledged: bool,
    pub inserted_id: Uuid,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UpdateResult {
    pub acknowledged: bool,
    pub matched_count: u64,
    pub modified_count: u64,
    pub upserted_id: Option<Uuid>,
    pub upserted_count: u64,
}

impl UpdateResult {
    pub fn new(matched_count: u64, modified_count: u64) -> Self {
        Self {
            acknowledged: true,
            matched_count,
            modified_count,
            upserted_id: None,
            upserted_count: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeleteResult {
    pub acknowledged: bool,
    pub deleted_count: u64,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("store error: {0}")]
    Backend(#[source] sqlx::Error),
    #[error("corrupt document: {0}")]
    Corrupt(String),
}

/// Collections of JSON documents queried by equality filters.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn find(&self, coll: Collection, query: FindQuery) -> Result<Vec<Document>, StoreError>;

    async fn find_one(&self, coll: Collection, filter: Filter)
        -> Result<Option<Document>, StoreError>;

    async fn insert_one(&self, coll: Collection, doc: Document)
        -> Result<InsertOneResult, StoreError>;

    /// Inserts unless a document with the same value for the collection's
    /// unique key exists. Returns `None` when nothing was inserted.
    async fn insert_unique(
        &self,
        coll: Collection,
        doc: Document,
    ) -> Result<Option<InsertOneResult>, StoreError>;

    /// Applies `set` to the first matching document, `$set` style.
    async fn update_one(
        &self,
        coll: Collection,
        filter: Filter,
        set: Document,
    ) -> Result<UpdateResult, StoreError>;

    async fn delete_one(&self, coll: Collection, filter: Filter)
        -> Result<DeleteResult, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}

/// Drops any caller-supplied id; the store owns `_id`.
pub(crate) fn strip_id(mut doc: Document) -> Document {
    doc.remove(ID_FIELD);
    doc
}

pub(crate) fn with_id(id: Uuid, doc: Document) -> Document {
    let mut out = Map::with_capacity(doc.len() + 1);
    out.insert(ID_FIELD.to_string(), Value::String(id.to_string()));
    out.extend(doc);
    out
}
