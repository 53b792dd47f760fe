// ============================================================================
// Store - document persistence
// ============================================================================
//
// `DocumentStore` is the backend seam (in-memory or Postgres/JSONB);
// `Collection<T>` is the typed view every domain repository goes through.
//
// ============================================================================

mod collection;
mod document_store;
mod memory;
mod postgres;

pub use collection::{Collection, Entity};
pub use document_store::{lookup, Document, DocumentStore, Filter, Query, Sort, StoreError};
pub use memory::InMemoryDocumentStore;
pub use postgres::PostgresDocumentStore;
