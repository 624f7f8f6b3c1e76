//! Reconciliation records
//!
//! Manages the `.liveflow/state.json` file which pairs every managed entity's
//! remote ID with the desired state it was last reconciled to and the
//! attributes read back from the remote service.

use crate::error::{CloudError, Result};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;

const STATE_VERSION: u32 = 1;
const STATE_DIR: &str = ".liveflow";
const STATE_FILE: &str = "state.json";
const STATE_BACKUP: &str = "state.json.backup";
const LOCK_FILE: &str = "lock.json";

/// Global state containing every reconciliation record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalState {
    /// State file version
    pub version: u32,

    /// Last modified timestamp
    pub updated_at: DateTime<Utc>,

    /// Records indexed by `type.name`
    pub resources: BTreeMap<String, ResourceRecord>,
}

impl Default for GlobalState {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            updated_at: Utc::now(),
            resources: BTreeMap::new(),
        }
    }
}

impl GlobalState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the record key for an entity
    pub fn key(resource_type: &str, name: &str) -> String {
        format!("{}.{}", resource_type, name)
    }

    /// Records of one resource type, keyed by logical name
    pub fn records_of<'a>(
        &'a self,
        resource_type: &'a str,
    ) -> impl Iterator<Item = (&'a str, &'a ResourceRecord)> + 'a {
        self.resources
            .values()
            .filter(move |r| r.resource_type == resource_type)
            .map(|r| (r.name.as_str(), r))
    }

    /// Add or update a record
    pub fn set_record(&mut self, record: ResourceRecord) {
        self.resources.insert(record.key(), record);
        self.updated_at = Utc::now();
    }

    /// Remove a record
    pub fn remove_record(&mut self, key: &str) -> Option<ResourceRecord> {
        let result = self.resources.remove(key);
        if result.is_some() {
            self.updated_at = Utc::now();
        }
        result
    }

    /// Get a record by key
    pub fn get_record(&self, key: &str) -> Option<&ResourceRecord> {
        self.resources.get(key)
    }

    /// Remote ID recorded for an entity
    pub fn id_of(&self, resource_type: &str, name: &str) -> Option<&str> {
        self.get_record(&Self::key(resource_type, name))
            .map(|r| r.id.as_str())
    }
}

/// Reconciliation record of a single entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceRecord {
    /// Remote ID assigned at creation
    pub id: String,

    /// Resource type
    pub resource_type: String,

    /// Logical name in the manifest
    pub name: String,

    /// Last observed lifecycle status
    #[serde(default)]
    pub status: Option<String>,

    /// Desired state the entity was last reconciled to
    pub desired: serde_json::Value,

    /// Observed attributes (ARN, endpoints, computed fields)
    pub attributes: serde_json::Value,

    /// When the record was created
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl ResourceRecord {
    pub fn new(
        resource_type: impl Into<String>,
        name: impl Into<String>,
        id: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            resource_type: resource_type.into(),
            name: name.into(),
            status: None,
            desired: serde_json::Value::Null,
            attributes: serde_json::Value::Null,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn key(&self) -> String {
        GlobalState::key(&self.resource_type, &self.name)
    }

    pub fn with_status(mut self, status: Option<String>) -> Self {
        self.status = status;
        self
    }

    pub fn with_desired<T: Serialize>(mut self, desired: &T) -> Result<Self> {
        self.desired = serde_json::to_value(desired)?;
        Ok(self)
    }

    pub fn with_attributes<T: Serialize>(mut self, observed: &T) -> Result<Self> {
        self.attributes = serde_json::to_value(observed)?;
        Ok(self)
    }

    /// Replace the observed attributes
    pub fn set_attributes<T: Serialize>(&mut self, observed: &T) -> Result<()> {
        self.attributes = serde_json::to_value(observed)?;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn desired_as<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(self.desired.clone())?)
    }

    pub fn get_attribute<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.attributes
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}

/// State manager for reading/writing state files
pub struct StateManager {
    /// Project root directory
    project_root: PathBuf,
}

impl StateManager {
    pub fn new(project_root: impl AsRef<Path>) -> Self {
        Self {
            project_root: project_root.as_ref().to_path_buf(),
        }
    }

    /// Get the state directory path
    fn state_dir(&self) -> PathBuf {
        self.project_root.join(STATE_DIR)
    }

    /// Get the state file path
    pub fn state_path(&self) -> PathBuf {
        self.state_dir().join(STATE_FILE)
    }

    /// Get the backup file path
    fn backup_path(&self) -> PathBuf {
        self.state_dir().join(STATE_BACKUP)
    }

    /// Get the lock file path
    fn lock_path(&self) -> PathBuf {
        self.state_dir().join(LOCK_FILE)
    }

    /// Ensure the state directory exists
    async fn ensure_state_dir(&self) -> Result<()> {
        let dir = self.state_dir();
        if !dir.exists() {
            fs::create_dir_all(&dir).await?;
            tracing::debug!("Created state directory: {}", dir.display());
        }
        Ok(())
    }

    /// Load the current state
    pub async fn load(&self) -> Result<GlobalState> {
        let path = self.state_path();
        if !path.exists() {
            tracing::debug!("State file not found, returning empty state");
            return Ok(GlobalState::new());
        }

        let content = fs::read_to_string(&path).await?;
        let state: GlobalState = serde_json::from_str(&content)?;

        // Version check
        if state.version > STATE_VERSION {
            return Err(CloudError::StateError(format!(
                "State file version {} is newer than supported version {}",
                state.version, STATE_VERSION
            )));
        }

        tracing::debug!("Loaded state with {} records", state.resources.len());
        Ok(state)
    }

    /// Save the state
    pub async fn save(&self, state: &GlobalState) -> Result<()> {
        self.ensure_state_dir().await?;

        let path = self.state_path();
        let backup = self.backup_path();

        // Create backup if state file exists
        if path.exists() {
            if backup.exists() {
                fs::remove_file(&backup).await?;
            }
            fs::rename(&path, &backup).await?;
            tracing::debug!("Created state backup");
        }

        let content = serde_json::to_string_pretty(state)?;
        fs::write(&path, content).await?;

        tracing::debug!("Saved state with {} records", state.resources.len());
        Ok(())
    }

    /// Acquire a lock for exclusive access
    pub async fn acquire_lock(&self) -> Result<StateLock> {
        self.ensure_state_dir().await?;

        let lock_path = self.lock_path();

        // Check for existing lock
        if lock_path.exists() {
            let content = fs::read_to_string(&lock_path).await?;
            let lock_info: LockInfo = serde_json::from_str(&content)?;

            // Check if lock is stale (older than 1 hour)
            let age = Utc::now().signed_duration_since(lock_info.acquired_at);
            if age.num_hours() < 1 {
                return Err(CloudError::LockError(format!(
                    "State is locked by {} since {}",
                    lock_info.holder, lock_info.acquired_at
                )));
            }

            tracing::warn!("Removing stale lock from {}", lock_info.holder);
        }

        let lock_info = LockInfo {
            holder: std::env::var("HOSTNAME")
                .or_else(|_| std::env::var("HOST"))
                .unwrap_or_else(|_| "unknown".to_string()),
            acquired_at: Utc::now(),
        };

        let content = serde_json::to_string_pretty(&lock_info)?;
        fs::write(&lock_path, content).await?;

        tracing::debug!("Acquired state lock");
        Ok(StateLock {
            lock_path,
            released: false,
        })
    }
}

/// Lock information
#[derive(Debug, Serialize, Deserialize)]
struct LockInfo {
    holder: String,
    acquired_at: DateTime<Utc>,
}

/// RAII guard for state lock
pub struct StateLock {
    lock_path: PathBuf,
    released: bool,
}

impl StateLock {
    /// Release the lock
    pub async fn release(mut self) -> Result<()> {
        if !self.released {
            if self.lock_path.exists() {
                fs::remove_file(&self.lock_path).await?;
                tracing::debug!("Released state lock");
            }
            self.released = true;
        }
        Ok(())
    }
}

impl Drop for StateLock {
    fn drop(&mut self) {
        if !self.released && self.lock_path.exists() {
            // Synchronous cleanup in drop - not ideal but necessary
            let _ = std::fs::remove_file(&self.lock_path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_state_save_load() {
        let temp_dir = tempdir().unwrap();
        let manager = StateManager::new(temp_dir.path());

        let mut state = GlobalState::new();
        state.set_record(
            ResourceRecord::new("input", "main", "1234567")
                .with_status(Some("DETACHED".to_string()))
                .with_attributes(&serde_json::json!({"arn": "arn:aws:medialive:us-west-2:1:input:1234567"}))
                .unwrap(),
        );

        manager.save(&state).await.unwrap();

        let loaded = manager.load().await.unwrap();
        assert_eq!(loaded.resources.len(), 1);
        assert_eq!(loaded.id_of("input", "main"), Some("1234567"));
        let record = loaded.get_record("input.main").unwrap();
        assert_eq!(
            record.get_attribute::<String>("arn").as_deref(),
            Some("arn:aws:medialive:us-west-2:1:input:1234567")
        );
    }

    #[tokio::test]
    async fn test_empty_state() {
        let temp_dir = tempdir().unwrap();
        let manager = StateManager::new(temp_dir.path());

        let state = manager.load().await.unwrap();
        assert!(state.resources.is_empty());
    }

    #[tokio::test]
    async fn test_save_keeps_backup() {
        let temp_dir = tempdir().unwrap();
        let manager = StateManager::new(temp_dir.path());

        manager.save(&GlobalState::new()).await.unwrap();
        manager.save(&GlobalState::new()).await.unwrap();

        assert!(temp_dir.path().join(".liveflow/state.json.backup").exists());
    }

    #[tokio::test]
    async fn test_lock_is_exclusive() {
        let temp_dir = tempdir().unwrap();
        let manager = StateManager::new(temp_dir.path());

        let lock = manager.acquire_lock().await.unwrap();
        let second = manager.acquire_lock().await;
        assert!(matches!(second, Err(CloudError::LockError(_))));

        lock.release().await.unwrap();
        assert!(manager.acquire_lock().await.is_ok());
    }

    #[test]
    fn test_records_of_type() {
        let mut state = GlobalState::new();
        state.set_record(ResourceRecord::new("input", "a", "1"));
        state.set_record(ResourceRecord::new("input", "b", "2"));
        state.set_record(ResourceRecord::new("channel", "a", "3"));

        let names: Vec<&str> = state.records_of("input").map(|(n, _)| n).collect();
        assert_eq!(names, vec!["a", "b"]);

        assert!(state.remove_record("input.a").is_some());
        assert_eq!(state.id_of("input", "a"), None);
    }
}
