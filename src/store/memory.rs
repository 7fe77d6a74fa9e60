use std::{
    cmp::Ordering,
    collections::HashMap,
    sync::atomic::{AtomicUsize, Ordering as AtomicOrdering},
};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    strip_id, with_id, Collection, DeleteResult, DocumentStore, Document, Filter, FindQuery,
    InsertOneResult, StoreError, UpdateResult,
};

/// Process-local store. Used by tests and by `STORE_BACKEND=memory`.
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<Collection, Vec<(Uuid, Document)>>>,
    calls: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of store operations issued so far.
    pub fn calls(&self) -> usize {
        self.calls.load(AtomicOrdering::SeqCst)
    }

    fn touch(&self) {
        self.calls.fetch_add(1, AtomicOrdering::SeqCst);
    }
}

fn rank(v: Option<&Value>) -> u8 {
    match v {
        None | Some(Value::Null) => 0,
        Some(Value::Bool(_)) => 1,
        Some(Value::Number(_)) => 2,
        Some(Value::String(_)) => 3,
        Some(Value::Array(_)) => 4,
        Some(Value::Object(_)) => 5,
    }
}

/// Missing and null sort lowest; numbers numerically; strings lexically.
fn compare(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn find(&self, coll: Collection, query: FindQuery) -> Result<Vec<Document>, StoreError> {
        self.touch();
        let guard = self.collections.read().await;
        let mut rows: Vec<&(Uuid, Document)> = guard
            .get(&coll)
            .map(|rows| rows.iter().filter(|(id, d)| query.filter.matches(*id, d)).collect())
            .unwrap_or_default();

        if let Some(sort) = &query.sort {
            rows.sort_by(|(_, a), (_, b)| compare(b.get(&sort.field), a.get(&sort.field)));
        }

        let limit = query
            .limit
            .and_then(|l| usize::try_from(l).ok())
            .unwrap_or(usize::MAX);

        Ok(rows
            .into_iter()
            .take(limit)
            .map(|(id, d)| with_id(*id, d.clone()))
            .collect())
    }

    async fn find_one(
        &self,
        coll: Collection,
        filter: Filter,
    ) -> Result<Option<Document>, StoreError> {
        self.touch();
        let guard = self.collections.read().await;
        Ok(guard
            .get(&coll)
            .and_then(|rows| rows.iter().find(|(id, d)| filter.matches(*id, d)))
            .map(|(id, d)| with_id(*id, d.clone())))
    }

    async fn insert_one(
        &self,
        coll: Collection,
        doc: Document,
    ) -> Result<InsertOneResult, StoreError> {
        self.touch();
        let id = Uuid::new_v4();
        self.collections
            .write()
            .await
            .entry(coll)
            .or_default()
            .push((id, strip_id(doc)));
        Ok(InsertOneResult { acknowledged: true, inserted_id: id })
    }

    async fn insert_unique(
        &self,
        coll: Collection,
        doc: Document,
    ) -> Result<Option<InsertOneResult>, StoreError> {
        self.touch();
        let mut guard = self.collections.write().await;
        let rows = guard.entry(coll).or_default();

        if let Some(key) = coll.unique_key() {
            let wanted = doc.get(key);
            if wanted.is_some() && rows.iter().any(|(_, d)| d.get(key) == wanted) {
                return Ok(None);
            }
        }

        let id = Uuid::new_v4();
        rows.push((id, strip_id(doc)));
        Ok(Some(InsertOneResult { acknowledged: true, inserted_id: id }))
    }

    async fn update_one(
        &self,
        coll: Collection,
        filter: Filter,
        set: Document,
    ) -> Result<UpdateResult, StoreError> {
        self.touch();
        let mut guard = self.collections.write().await;
        let Some((_, doc)) = guard
            .get_mut(&coll)
            .and_then(|rows| rows.iter_mut().find(|(id, d)| filter.matches(*id, d)))
        else {
            return Ok(UpdateResult::new(0, 0));
        };

        let before = doc.clone();
        doc.extend(strip_id(set));
        let modified = u64::from(*doc != before);
        Ok(UpdateResult::new(1, modified))
    }

    async fn delete_one(
        &self,
        coll: Collection,
        filter: Filter,
    ) -> Result<DeleteResult, StoreError> {
        self.touch();
        let mut guard = self.collections.write().await;
        let deleted = match guard.get_mut(&coll) {
            Some(rows) => match rows.iter().position(|(id, d)| filter.matches(*id, d)) {
                Some(pos) => {
                    rows.remove(pos);
                    1
                }
                None => 0,
            },
            None => 0,
        };
        Ok(DeleteResult { acknowledged: true, deleted_count: deleted })
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Sort, ID_FIELD};
    use serde_json::json;

    fn doc(v: Value) -> Document {
        v.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn find_sorts_desc_with_missing_fields_last() {
        let store = MemoryStore::new();
        for v in [json!({"p": 10}), json!({}), json!({"p": 50}), json!({"p": 30})] {
            store.insert_one(Collection::Bids, doc(v)).await.unwrap();
        }

        let rows = store
            .find(Collection::Bids, FindQuery::all().sort(Sort::desc("p")))
            .await
            .unwrap();
        let prices: Vec<Option<&Value>> = rows.iter().map(|d| d.get("p")).collect();
        assert_eq!(prices, vec![Some(&json!(50)), Some(&json!(30)), Some(&json!(10)), None]);
    }

    #[tokio::test]
    async fn find_applies_limit_after_sort() {
        let store = MemoryStore::new();
        for day in 1..=9 {
            let at = format!("2024-01-0{day}T00:00:00Z");
            store.insert_one(Collection::Products, doc(json!({"created_at": at}))).await.unwrap();
        }

        let rows = store
            .find(Collection::Products, FindQuery::all().sort(Sort::desc("created_at")).limit(3))
            .await
            .unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0]["created_at"], json!("2024-01-09T00:00:00Z"));
        assert_eq!(rows[2]["created_at"], json!("2024-01-07T00:00:00Z"));
    }

    #[tokio::test]
    async fn insert_unique_refuses_duplicate_key() {
        let store = MemoryStore::new();
        let first = store
            .insert_unique(Collection::Users, doc(json!({"email": "a@x.io"})))
            .await
            .unwrap();
        assert!(first.is_some());

        let second = store
            .insert_unique(Collection::Users, doc(json!({"email": "a@x.io", "name": "again"})))
            .await
            .unwrap();
        assert!(second.is_none());

        let all = store.find(Collection::Users, FindQuery::all()).await.unwrap();
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn insert_discards_caller_id() {
        let store = MemoryStore::new();
        let res = store
            .insert_one(Collection::Products, doc(json!({"_id": "mine", "name": "x"})))
            .await
            .unwrap();
        let found = store
            .find_one(Collection::Products, Filter::by_id(res.inserted_id))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found[ID_FIELD], json!(res.inserted_id.to_string()));
    }

    #[tokio::test]
    async fn update_counts_matched_and_modified() {
        let store = MemoryStore::new();
        let id = store
            .insert_one(Collection::Products, doc(json!({"name": "a", "price": 1})))
            .await
            .unwrap()
            .inserted_id;

        let same = store
            .update_one(Collection::Products, Filter::by_id(id), doc(json!({"name": "a"})))
            .await
            .unwrap();
        assert_eq!((same.matched_count, same.modified_count), (1, 0));

        let changed = store
            .update_one(Collection::Products, Filter::by_id(id), doc(json!({"name": "b"})))
            .await
            .unwrap();
        assert_eq!((changed.matched_count, changed.modified_count), (1, 1));

        let none = store
            .update_one(Collection::Products, Filter::by_id(Uuid::new_v4()), doc(json!({"name": "c"})))
            .await
            .unwrap();
        assert_eq!((none.matched_count, none.modified_count), (0, 0));
    }

    #[tokio::test]
    async fn delete_removes_one_and_counts_calls() {
        let store = MemoryStore::new();
        let id = store
            .insert_one(Collection::Bids, doc(json!({"bid_price": 3})))
            .await
            .unwrap()
            .inserted_id;

        let gone = store.delete_one(Collection::Bids, Filter::by_id(id)).await.unwrap();
        assert_eq!(gone.deleted_count, 1);
        let again = store.delete_one(Collection::Bids, Filter::by_id(id)).await.unwrap();
        assert_eq!(again.deleted_count, 0);
        assert_eq!(store.calls(), 3);
    }
}
