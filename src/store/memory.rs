use crate::error::AppError;
use crate::models::{Category, ConfigFieldSet, ProviderOrder, ProviderRecord};
use crate::store::SourceStore;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Default)]
struct Inner {
    records: Vec<ProviderRecord>,
    configs: HashMap<String, ConfigFieldSet>,
    saved: Vec<Vec<ProviderOrder>>,
    config_writes: Vec<(String, ConfigFieldSet)>,
    list_calls: usize,
    fail_list: Option<String>,
    fail_save: Option<String>,
    fail_get_config: Option<String>,
    fail_set_config: Option<String>,
}

/// In-process store that records every write; failures are injected per call kind.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

fn failure(message: &Option<String>) -> Result<(), AppError> {
    match message {
        Some(message) => Err(AppError::Api {
            status: 500,
            message: message.clone(),
        }),
        None => Ok(()),
    }
}

impl MemoryStore {
    pub fn with_records(records: Vec<ProviderRecord>) -> Self {
        let store = Self::default();
        store.inner.lock().expect("store lock").records = records;
        store
    }

    pub fn set_config_values(&self, provider: &str, values: ConfigFieldSet) {
        self.inner
            .lock()
            .expect("store lock")
            .configs
            .insert(provider.to_string(), values);
    }

    pub fn fail_list(&self, message: Option<&str>) {
        self.inner.lock().expect("store lock").fail_list = message.map(ToString::to_string);
    }

    pub fn fail_save(&self, message: Option<&str>) {
        self.inner.lock().expect("store lock").fail_save = message.map(ToString::to_string);
    }

    pub fn fail_get_config(&self, message: Option<&str>) {
        self.inner.lock().expect("store lock").fail_get_config = message.map(ToString::to_string);
    }

    pub fn fail_set_config(&self, message: Option<&str>) {
        self.inner.lock().expect("store lock").fail_set_config = message.map(ToString::to_string);
    }

    pub fn saved(&self) -> Vec<Vec<ProviderOrder>> {
        self.inner.lock().expect("store lock").saved.clone()
    }

    pub fn config_writes(&self) -> Vec<(String, ConfigFieldSet)> {
        self.inner.lock().expect("store lock").config_writes.clone()
    }

    pub fn list_calls(&self) -> usize {
        self.inner.lock().expect("store lock").list_calls
    }
}

#[async_trait]
impl SourceStore for MemoryStore {
    async fn list(&self, _category: Category) -> Result<Vec<ProviderRecord>, AppError> {
        let mut inner = self.inner.lock().expect("store lock");
        inner.list_calls += 1;
        failure(&inner.fail_list)?;
        Ok(inner.records.clone())
    }

    async fn save(&self, _category: Category, entries: &[ProviderOrder]) -> Result<(), AppError> {
        let mut inner = self.inner.lock().expect("store lock");
        failure(&inner.fail_save)?;
        inner.saved.push(entries.to_vec());

        let mut reordered = Vec::with_capacity(entries.len());
        for entry in entries {
            if let Some(existing) = inner
                .records
                .iter()
                .find(|r| r.name == entry.provider_name)
            {
                reordered.push(ProviderRecord {
                    enabled: entry.is_enabled,
                    order: entry.display_order,
                    ..existing.clone()
                });
            }
        }
        inner.records = reordered;
        Ok(())
    }

    async fn get_config(&self, provider: &str) -> Result<ConfigFieldSet, AppError> {
        let inner = self.inner.lock().expect("store lock");
        failure(&inner.fail_get_config)?;
        Ok(inner.configs.get(provider).cloned().unwrap_or_default())
    }

    async fn set_config(&self, provider: &str, values: &ConfigFieldSet) -> Result<(), AppError> {
        let mut inner = self.inner.lock().expect("store lock");
        failure(&inner.fail_set_config)?;
        inner
            .config_writes
            .push((provider.to_string(), values.clone()));
        inner.configs.insert(provider.to_string(), values.clone());
        Ok(())
    }
}
