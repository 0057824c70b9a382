//! Gateway configuration.
//!
//! [`GatewayConfig`] is plain data with serde support, so applications can load it from
//! whatever configuration source they already use:
//!
//! ```ignore
//! let config: GatewayConfig = serde_json::from_str(r#"{ "hydration": { "concurrency": 4 } }"#)?;
//! let store = DocumentStore::with_config(backend, config);
//! ```

use serde::{Deserialize, Serialize};

/// Write batch limit of managed document stores.
pub const DEFAULT_MAX_BATCH_SIZE: usize = 500;

/// What hydration does with a reference whose document no longer exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingReference {
    /// Leave the reference in place, unresolved.
    #[default]
    Keep,
    /// Replace the field with `null`.
    Null,
    /// Fail the whole read with [`GatewayError::DanglingReference`](crate::error::GatewayError::DanglingReference).
    Fail,
}

/// Reference hydration settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HydrationOptions {
    /// Whether reads hydrate reference fields at all.
    pub enabled: bool,
    /// Maximum number of reference reads in flight at once. `1` resolves sequentially.
    pub concurrency: usize,
    /// Policy for references to missing documents.
    pub missing: MissingReference,
}

impl HydrationOptions {
    /// Concurrency actually used; `0` is treated as `1`.
    pub fn effective_concurrency(&self) -> usize {
        self.concurrency.max(1)
    }
}

impl Default for HydrationOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            concurrency: 1,
            missing: MissingReference::Keep,
        }
    }
}

/// Settings shared by every collection of a [`DocumentStore`](crate::store::DocumentStore).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub hydration: HydrationOptions,
    /// Largest number of documents a filtered delete removes in one atomic batch.
    pub max_batch_size: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            hydration: HydrationOptions::default(),
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
        }
    }
}
