use uuid::Uuid;

use super::dto::UpdateProductRequest;
use crate::store::{
    Collection, DeleteResult, DocumentStore, Document, Filter, FindQuery, InsertOneResult, Sort,
    StoreError, UpdateResult,
};

pub const LATEST_LIMIT: i64 = 6;

pub fn latest_query() -> FindQuery {
    FindQuery::all()
        .sort(Sort::desc("created_at"))
        .limit(LATEST_LIMIT)
}

pub fn owner_query(email: Option<&str>) -> FindQuery {
    match email {
        Some(email) => FindQuery::filtered(Filter::new().eq("email", email)),
        None => FindQuery::all(),
    }
}

/// `$set` document for an update: exactly `name` and `price`.
pub fn update_set(req: UpdateProductRequest) -> Document {
    let mut set = Document::new();
    set.insert("name".into(), req.name);
    set.insert("price".into(), req.price);
    set
}

pub async fn latest(store: &dyn DocumentStore) -> Result<Vec<Document>, StoreError> {
    store.find(Collection::Products, latest_query()).await
}

pub async fn list(
    store: &dyn DocumentStore,
    email: Option<&str>,
) -> Result<Vec<Document>, StoreError> {
    store.find(Collection::Products, owner_query(email)).await
}

pub async fn get(store: &dyn DocumentStore, id: Uuid) -> Result<Option<Document>, StoreError> {
    store.find_one(Collection::Products, Filter::by_id(id)).await
}

pub async fn insert(
    store: &dyn DocumentStore,
    product: Document,
) -> Result<InsertOneResult, StoreError> {
    store.insert_one(Collection::Products, product).await
}

pub async fn update(
    store: &dyn DocumentStore,
    id: Uuid,
    req: UpdateProductRequest,
) -> Result<UpdateResult, StoreError> {
    store
        .update_one(Collection::Products, Filter::by_id(id), update_set(req))
        .await
}

pub async fn delete(store: &dyn DocumentStore, id: Uuid) -> Result<DeleteResult, StoreError> {
    store.delete_one(Collection::Products, Filter::by_id(id)).await
}
