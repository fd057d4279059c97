//! Long-term memory persistence traits.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::error::Result;

/// Persistence for per-user fact maps (`fact_<n>` -> fact).
#[async_trait]
pub trait FactStore: Send + Sync {
    /// Load the fact map for a user; empty when nothing is stored yet.
    async fn load(&self, user_id: &str) -> Result<BTreeMap<String, String>>;

    /// Replace the stored fact map for a user.
    async fn save(&self, user_id: &str, facts: &BTreeMap<String, String>) -> Result<()>;
}
