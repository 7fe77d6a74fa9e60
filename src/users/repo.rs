use crate::store::{
    Collection, DocumentStore, Document, FindQuery, InsertOneResult, StoreError,
};

/// Inserts `user` unless one with the same email exists; `None` means it did.
pub async fn create_unique(
    store: &dyn DocumentStore,
    user: Document,
) -> Result<Option<InsertOneResult>, StoreError> {
    store.insert_unique(Collection::Users, user).await
}

pub async fn list_all(store: &dyn DocumentStore) -> Result<Vec<Document>, StoreError> {
    store.find(Collection::Users, FindQuery::all()).await
}
