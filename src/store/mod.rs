use crate::error::AppError;
use crate::models::{Category, ConfigFieldSet, ProviderOrder, ProviderRecord};
use async_trait::async_trait;

pub mod http;
#[cfg(test)]
pub mod memory;

/// Remote home of the provider lists and per-provider configuration.
#[async_trait]
pub trait SourceStore: Send + Sync {
    async fn list(&self, category: Category) -> Result<Vec<ProviderRecord>, AppError>;

    async fn save(&self, category: Category, entries: &[ProviderOrder]) -> Result<(), AppError>;

    async fn get_config(&self, provider: &str) -> Result<ConfigFieldSet, AppError>;

    async fn set_config(&self, provider: &str, values: &ConfigFieldSet) -> Result<(), AppError>;
}

/// Assigns `display_order = position + 1` in the given sequence.
pub fn order_entries(records: &[ProviderRecord]) -> Vec<ProviderOrder> {
    records
        .iter()
        .enumerate()
        .map(|(idx, record)| ProviderOrder {
            provider_name: record.name.clone(),
            is_enabled: record.enabled,
            display_order: idx as u32 + 1,
        })
        .collect()
}
