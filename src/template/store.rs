// Template store abstraction
//
// Templates are authored and persisted elsewhere. The resolver only
// needs read access, injected through this trait so tests can run
// against an in-memory store.

use async_trait::async_trait;

use crate::error::StoreError;
use crate::template::types::FsmTemplate;

/// Read-only access to stored templates.
#[async_trait]
pub trait TemplateStore: Send + Sync {
    /// Fetch the template bound to `(type_key, scope)`, if any.
    async fn fetch(&self, type_key: &str, scope: &str) -> Result<Option<FsmTemplate>, StoreError>;

    /// Fetch a template by its stable id. Used for parent-chain walks.
    async fn fetch_by_id(&self, id: &str) -> Result<Option<FsmTemplate>, StoreError>;
}
