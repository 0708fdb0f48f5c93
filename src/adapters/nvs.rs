//! Non-volatile storage adapter over the ESP-IDF NVS partition.
//!
//! NVS commits blob writes atomically, which is the guarantee the
//! credential store's dual-slot scheme builds on.

use esp_idf_svc::nvs::{EspNvs, EspNvsPartition, NvsDefault};
use esp_idf_svc::sys::{ESP_ERR_NVS_NOT_ENOUGH_SPACE, EspError};
use log::warn;

use crate::app::ports::{StorageError, StoragePort};

#[derive(Clone)]
pub struct NvsStorage {
    partition: EspNvsPartition<NvsDefault>,
}

impl NvsStorage {
    pub fn new(partition: EspNvsPartition<NvsDefault>) -> Self {
        Self { partition }
    }

    fn handle(&self, namespace: &str, writable: bool) -> Result<EspNvs<NvsDefault>, StorageError> {
        EspNvs::new(self.partition.clone(), namespace, writable).map_err(|e| {
            warn!("nvs open '{namespace}' failed: {e}");
            StorageError::IoError
        })
    }
}

impl StoragePort for NvsStorage {
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        let nvs = self.handle(namespace, false)?;
        match nvs.get_blob(key, buf) {
            Ok(Some(value)) => Ok(value.len()),
            Ok(None) => Err(StorageError::NotFound),
            Err(e) => {
                warn!("nvs read '{namespace}/{key}' failed: {e}");
                Err(StorageError::IoError)
            }
        }
    }

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        let mut nvs = self.handle(namespace, true)?;
        nvs.set_blob(key, data).map_err(map_write_err)
    }

    fn exists(&self, namespace: &str, key: &str) -> bool {
        let Ok(nvs) = self.handle(namespace, false) else {
            return false;
        };
        nvs.contains(key).unwrap_or(false)
    }
}

fn map_write_err(e: EspError) -> StorageError {
    if e.code() == ESP_ERR_NVS_NOT_ENOUGH_SPACE as i32 {
        StorageError::Full
    } else {
        warn!("nvs write failed: {e}");
        StorageError::IoError
    }
}
