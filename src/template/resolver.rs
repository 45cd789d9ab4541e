// Template resolution: parent-chain walk, merge, cache.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use tracing::debug;

use crate::error::TemplateError;
use crate::template::store::TemplateStore;
use crate::template::types::{FsmDefinition, FsmTemplate};

/// Resolves `(type_key, scope)` into a complete, validated
/// `FsmDefinition` by merging the template's parent chain bottom-up.
/// Results are cached; edits to templates happen outside the engine,
/// so the owner of the editing path must call `invalidate`.
pub struct TemplateResolver {
    store: Arc<dyn TemplateStore>,
    cache: Cache<(String, String), Arc<FsmDefinition>>,
    max_depth: usize,
}

impl TemplateResolver {
    pub fn new(
        store: Arc<dyn TemplateStore>,
        cache_capacity: u64,
        cache_ttl: Duration,
        max_depth: usize,
    ) -> Self {
        let cache = Cache::builder()
            .max_capacity(cache_capacity)
            .time_to_live(cache_ttl)
            .build();
        Self {
            store,
            cache,
            max_depth,
        }
    }

    pub async fn resolve(
        &self,
        type_key: &str,
        scope: &str,
    ) -> Result<Arc<FsmDefinition>, TemplateError> {
        let key = (type_key.to_string(), scope.to_string());
        if let Some(cached) = self.cache.get(&key).await {
            debug!(type_key, scope, "template cache hit");
            return Ok(cached);
        }

        let chain = self.load_chain(type_key, scope).await?;
        let merged = merge_chain(&chain);

        if let Some((transition_id, state)) = merged.dangling_endpoint() {
            return Err(TemplateError::InvalidDefinition {
                reason: format!(
                    "transition '{transition_id}' references undeclared state '{state}'"
                ),
            });
        }

        let resolved = Arc::new(merged);
        self.cache.insert(key, Arc::clone(&resolved)).await;
        debug!(
            type_key,
            scope,
            states = resolved.states.len(),
            transitions = resolved.transitions.len(),
            "template resolved"
        );
        Ok(resolved)
    }

    /// Cache-bust hook for the template editing path.
    pub async fn invalidate(&self, type_key: &str, scope: &str) {
        self.cache
            .invalidate(&(type_key.to_string(), scope.to_string()))
            .await;
    }

    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }

    /// Walks the ancestry iteratively, child first. A template id seen
    /// twice means the ancestry is cyclic; the walk is also bounded by
    /// `max_depth` against pathological (acyclic but huge) chains.
    async fn load_chain(
        &self,
        type_key: &str,
        scope: &str,
    ) -> Result<Vec<FsmTemplate>, TemplateError> {
        let leaf = self
            .store
            .fetch(type_key, scope)
            .await?
            .ok_or_else(|| TemplateError::NotFound {
                type_key: type_key.to_string(),
                scope: scope.to_string(),
            })?;

        let mut visited: HashSet<String> = HashSet::new();
        visited.insert(leaf.id.clone());

        let mut chain = vec![leaf];
        while let Some(parent_id) = chain.last().and_then(|t| t.parent_id.clone()) {
            if chain.len() >= self.max_depth {
                return Err(TemplateError::DepthExceeded {
                    max_depth: self.max_depth,
                });
            }
            if !visited.insert(parent_id.clone()) {
                return Err(TemplateError::Cyclic {
                    template_id: parent_id,
                });
            }
            let parent = self.store.fetch_by_id(&parent_id).await?.ok_or_else(|| {
                TemplateError::InvalidDefinition {
                    reason: format!("parent template '{parent_id}' does not exist"),
                }
            })?;
            chain.push(parent);
        }
        Ok(chain)
    }
}

/// Merges a chain ordered child-first. States and transitions start
/// from the root ancestor; each descendant replaces same-key states
/// and same-id transitions (keeping the parent's position so guard
/// tie-breaking order is stable) and appends anything new.
fn merge_chain(chain: &[FsmTemplate]) -> FsmDefinition {
    let mut merged = FsmDefinition::default();
    for template in chain.iter().rev() {
        let def = &template.definition;
        for (key, state) in &def.states {
            merged.states.insert(key.clone(), state.clone());
        }
        for transition in &def.transitions {
            match merged
                .transitions
                .iter_mut()
                .find(|t| t.id == transition.id)
            {
                Some(existing) => *existing = transition.clone(),
                None => merged.transitions.push(transition.clone()),
            }
        }
        if def.metadata.is_some() {
            merged.metadata = def.metadata.clone();
        }
    }
    merged
}
