// SPDX-License-Identifier: GPL-3.0-only
use async_trait::async_trait;
use crate::store::models::Refset;

#[async_trait]
pub trait RefsetStore: Send + Sync {
    /// Persist a new reference set entity
    async fn add(&self, refset: Refset) -> anyhow::Result<()>;

    /// Get a reference set by its identifier
    async fn get(&self, refset_id: &str) -> anyhow::Result<Option<Refset>>;

    /// List all reference set entities
    async fn list(&self) -> anyhow::Result<Vec<Refset>>;

    /// Update an existing reference set entity
    async fn update(&self, refset: Refset) -> anyhow::Result<()>;

    /// Remove a reference set entity
    async fn remove(&self, refset_id: &str) -> anyhow::Result<()>;
}
