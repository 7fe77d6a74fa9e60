use serde::Deserialize;
use serde_json::Value;

use crate::store::Document;

/// Only `name` and `price` are writable; anything else in the body is dropped.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateProductRequest {
    #[serde(default)]
    pub name: Value,
    #[serde(default)]
    pub price: Value,
}

impl UpdateProductRequest {
    pub fn from_document(doc: Document) -> serde_json::Result<Self> {
        serde_json::from_value(Value::Object(doc))
    }
}
