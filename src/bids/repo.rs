use uuid::Uuid;

use crate::store::{
    Collection, DeleteResult, DocumentStore, Document, Filter, FindQuery, InsertOneResult, Sort,
    StoreError,
};

pub fn buyer_query(email: Option<&str>) -> FindQuery {
    match email {
        Some(email) => FindQuery::filtered(Filter::new().eq("buyer_email", email)),
        None => FindQuery::all(),
    }
}

/// Bids on one product, highest first.
pub fn product_query(product_id: &str) -> FindQuery {
    FindQuery::filtered(Filter::new().eq("product", product_id)).sort(Sort::desc("bid_price"))
}

pub async fn list(
    store: &dyn DocumentStore,
    email: Option<&str>,
) -> Result<Vec<Document>, StoreError> {
    store.find(Collection::Bids, buyer_query(email)).await
}

pub async fn list_for_product(
    store: &dyn DocumentStore,
    product_id: &str,
) -> Result<Vec<Document>, StoreError> {
    store.find(Collection::Bids, product_query(product_id)).await
}

pub async fn insert(store: &dyn DocumentStore, bid: Document) -> Result<InsertOneResult, StoreError> {
    store.insert_one(Collection::Bids, bid).await
}

pub async fn delete(store: &dyn DocumentStore, id: Uuid) -> Result<DeleteResult, StoreError> {
    store.delete_one(Collection::Bids, Filter::by_id(id)).await
}
