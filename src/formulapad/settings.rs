//! Application preferences, one `{key, value}` record per key.

use crate::error::Result;
use crate::model::{RecordKey, Setting};
use crate::store::{Database, StorageBackend};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::rc::Rc;
use tracing::warn;

pub struct SettingsRepository<B: StorageBackend> {
    db: Rc<Database<B>>,
}

impl<B: StorageBackend> SettingsRepository<B> {
    pub fn new(db: Rc<Database<B>>) -> Self {
        Self { db }
    }

    /// Raw JSON value for `key`, if set.
    pub fn get_value(&self, key: &str) -> Result<Option<serde_json::Value>> {
        Ok(self
            .db
            .get::<Setting>(&RecordKey::from(key))?
            .map(|s| s.value))
    }

    /// Typed value for `key`. A stored value of the wrong shape reads as unset.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get_value(key)? {
            Some(value) => match serde_json::from_value(value) {
                Ok(v) => Ok(Some(v)),
                Err(e) => {
                    warn!("Setting {key} has an unexpected shape: {e}");
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }

    pub fn set(&self, key: &str, value: impl Serialize) -> Result<Setting> {
        let setting = Setting {
            key: key.to_string(),
            value: serde_json::to_value(value)?,
        };
        self.db.put(&setting)
    }

    pub fn remove(&self, key: &str) -> Result<()> {
        self.db.delete::<Setting>(&RecordKey::from(key))
    }

    /// Every setting, ordered by key.
    pub fn list(&self) -> Result<Vec<Setting>> {
        self.db.get_all::<Setting>()
    }
}
