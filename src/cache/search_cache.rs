//! Cache guard around expensive searches

use super::store::{validate_key, ArtifactStore};
use crate::error::Result;
use crate::optimizer::SearchResult;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Whether to reuse stored results and what to persist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CachePolicy {
    /// Rerun the search even when a stored result exists
    pub remake: bool,
    /// Also store the refit best estimator on its own
    pub save_best: bool,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            remake: true,
            save_best: true,
        }
    }
}

impl CachePolicy {
    /// Reuse stored results when present
    pub fn reuse() -> Self {
        Self {
            remake: false,
            ..Self::default()
        }
    }

    pub fn with_remake(mut self, remake: bool) -> Self {
        self.remake = remake;
        self
    }

    pub fn with_save_best(mut self, save_best: bool) -> Self {
        self.save_best = save_best;
        self
    }
}

/// Store keys for one search variant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactKeys {
    /// Full search result
    pub key: String,
    /// Refit best estimator
    pub best_key: String,
}

impl ArtifactKeys {
    pub fn new(key: impl Into<String>, best_key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            best_key: best_key.into(),
        }
    }

    /// `rf_reg_<tag>.json` and `rf_reg_<tag>-best-estm.json`
    pub fn for_tag(tag: &str) -> Self {
        Self::new(format!("rf_reg_{}.json", tag), format!("rf_reg_{}-best-estm.json", tag))
    }

    /// Both keys must be plain file names
    pub fn validate(&self) -> Result<()> {
        validate_key(&self.key)?;
        validate_key(&self.best_key)
    }
}

/// How a result was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    /// Loaded from the store, no search ran
    Hit,
    /// Searched and persisted
    Computed,
}

#[derive(Debug, Clone)]
pub struct CacheOutcome<E> {
    pub result: SearchResult<E>,
    pub status: CacheStatus,
}

impl<E> CacheOutcome<E> {
    pub fn is_hit(&self) -> bool {
        self.status == CacheStatus::Hit
    }
}

/// Runs a search only when no usable stored result exists
#[derive(Debug)]
pub struct SearchCache<S> {
    store: S,
}

impl<S: ArtifactStore> SearchCache<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Return the stored result for `keys.key`, or run `search_fn` and persist it.
    ///
    /// With `policy.remake` unset and a stored result present, `search_fn` is
    /// never called. A freshly computed result is returned as re-read from the
    /// store, so it is exactly what a later cache hit yields. Keys are checked
    /// before `search_fn` runs. If persisting fails the computed result is
    /// dropped and the error returned; any best estimator from an earlier run
    /// is already gone by then, so a stored result never sits next to an
    /// estimator refit from a different search.
    pub fn get_or_search<E, F>(&self, keys: &ArtifactKeys, policy: CachePolicy, search_fn: F) -> Result<CacheOutcome<E>>
    where
        E: Serialize + DeserializeOwned,
        F: FnOnce() -> Result<SearchResult<E>>,
    {
        keys.validate()?;
        let location = self.store.location(&keys.key);

        if !policy.remake && self.store.exists(&keys.key) {
            info!(location = %location, "Loading cached search result");
            let result = self.store.load(&keys.key)?;
            return Ok(CacheOutcome {
                result,
                status: CacheStatus::Hit,
            });
        }

        if self.store.exists(&keys.key) {
            info!(location = %location, "Remaking search result");
        } else {
            info!(location = %location, "No cached search result; searching");
        }

        let result = search_fn()?;
        self.persist(keys, policy, &result)?;

        Ok(CacheOutcome {
            result: self.store.load(&keys.key)?,
            status: CacheStatus::Computed,
        })
    }

    /// Store a result, and its best estimator when the policy asks for it.
    ///
    /// Any previously stored best estimator is dropped first, then the full
    /// result is written, then the new best estimator.
    pub fn persist<E: Serialize>(&self, keys: &ArtifactKeys, policy: CachePolicy, result: &SearchResult<E>) -> Result<()> {
        keys.validate()?;
        if self.store.delete(&keys.best_key)? {
            debug!(location = %self.store.location(&keys.best_key), "Dropped previous best estimator");
        }
        self.store.save(&keys.key, result)?;
        info!(location = %self.store.location(&keys.key), "Saved search result");

        if policy.save_best {
            match result.best_estimator() {
                Some(best) => {
                    self.store.save(&keys.best_key, best)?;
                    info!(location = %self.store.location(&keys.best_key), "Saved best estimator");
                }
                None => warn!(
                    key = %keys.best_key,
                    "Search ran without refit; no best estimator to save"
                ),
            }
        }
        Ok(())
    }

    /// Load the separately stored best estimator
    pub fn load_best<E: DeserializeOwned>(&self, keys: &ArtifactKeys) -> Result<E> {
        self.store.load(&keys.best_key)
    }

    /// Load a stored full result without searching
    pub fn load_result<E: DeserializeOwned>(&self, keys: &ArtifactKeys) -> Result<SearchResult<E>> {
        self.store.load(&keys.key)
    }
}
