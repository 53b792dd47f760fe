use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::Value;
use uuid::Uuid;

// ============================================================================
// Document Store - persistence seam for every collection
// ============================================================================
//
// Documents are JSON objects carrying a top-level integer `version`. Writes
// are atomic per document; `replace` only succeeds when the stored version
// matches the caller's expected version (optimistic concurrency).
//
// ============================================================================

pub type Document = Value;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{collection} document {id} not found")]
    NotFound { collection: String, id: Uuid },

    #[error("{collection} document {id} already exists")]
    AlreadyExists { collection: String, id: Uuid },

    #[error("concurrency conflict on {collection}/{id}: expected version {expected}, found {actual}")]
    Conflict {
        collection: String,
        id: Uuid,
        expected: i64,
        actual: i64,
    },

    #[error("document serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("store backend error: {0}")]
    Backend(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Backend(err.to_string())
    }
}

/// A single predicate over a document. Field paths use dots (`owner.userId`).
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Field equals the given JSON value
    Eq(String, Value),
    /// Case-insensitive substring match against any of the listed string fields
    Matches { fields: Vec<String>, needle: String },
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Eq(field.into(), value.into())
    }

    pub fn matches(fields: &[&str], needle: impl Into<String>) -> Self {
        Filter::Matches {
            fields: fields.iter().map(|f| f.to_string()).collect(),
            needle: needle.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sort {
    pub field: String,
    pub descending: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filters: Vec<Filter>,
    pub sort: Option<Sort>,
    pub skip: usize,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn newest_first(mut self, field: &str) -> Self {
        self.sort = Some(Sort {
            field: field.to_string(),
            descending: true,
        });
        self
    }

    pub fn page(mut self, skip: usize, limit: usize) -> Self {
        self.skip = skip;
        self.limit = Some(limit);
        self
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn insert(&self, collection: &str, id: Uuid, doc: Document) -> Result<(), StoreError>;

    async fn get(&self, collection: &str, id: Uuid) -> Result<Option<Document>, StoreError>;

    /// Overwrite a document whose stored version equals `expected_version`
    async fn replace(
        &self,
        collection: &str,
        id: Uuid,
        expected_version: i64,
        doc: Document,
    ) -> Result<(), StoreError>;

    async fn find(&self, collection: &str, query: &Query) -> Result<Vec<Document>, StoreError>;

    async fn count(&self, collection: &str, filters: &[Filter]) -> Result<u64, StoreError>;

    /// Sum a decimal field over matching documents; missing fields count as zero
    async fn sum(&self, collection: &str, filters: &[Filter], field: &str) -> Result<Decimal, StoreError>;

    /// Atomically increment and return a named counter, starting at 1
    async fn next_sequence(&self, name: &str) -> Result<i64, StoreError>;

    /// Backend name for logs and health output
    fn backend(&self) -> &'static str;
}

/// Resolve a dotted path inside a JSON document
pub fn lookup<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(doc, |current, key| current.get(key))
}

pub fn document_version(doc: &Value) -> i64 {
    doc.get("version").and_then(Value::as_i64).unwrap_or(0)
}
