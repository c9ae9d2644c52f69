use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use tracing::{error, info};

/// Holds the single Gemini API key shared by every generation batch.
pub trait CredentialStore: Send + Sync {
    fn get(&self) -> Option<String>;
    fn set(&self, credential: &str);
    fn clear(&self);
}

fn normalize(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

pub fn mask(credential: &str) -> String {
    let head: String = credential.chars().take(4).collect();
    format!("{head}***")
}

#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    value: RwLock<Option<String>>,
}

impl MemoryCredentialStore {
    pub fn with_credential(credential: &str) -> Self {
        Self { value: RwLock::new(normalize(credential)) }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn get(&self) -> Option<String> {
        self.value.read().clone()
    }

    fn set(&self, credential: &str) {
        *self.value.write() = normalize(credential);
    }

    fn clear(&self) {
        *self.value.write() = None;
    }
}

/// File-backed store so the key survives restarts. The file is the source of
/// truth; the lock keeps the cached copy and the file in step.
#[derive(Debug)]
pub struct FileCredentialStore {
    path: PathBuf,
    cached: RwLock<Option<String>>,
}

impl FileCredentialStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let cached = match std::fs::read_to_string(&path) {
            Ok(contents) => normalize(&contents),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => {
                error!("❌ Could not read credential file {}: {}", path.display(), e);
                None
            }
        };
        Self { path, cached: RwLock::new(cached) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialStore for FileCredentialStore {
    fn get(&self) -> Option<String> {
        self.cached.read().clone()
    }

    fn set(&self, credential: &str) {
        let mut guard = self.cached.write();
        match normalize(credential) {
            Some(value) => {
                if let Err(e) = std::fs::write(&self.path, &value) {
                    error!("❌ Could not persist credential to {}: {}", self.path.display(), e);
                }
                info!("🔑 Stored API key {}", mask(&value));
                *guard = Some(value);
            }
            None => {
                drop(guard);
                self.clear();
            }
        }
    }

    fn clear(&self) {
        let mut guard = self.cached.write();
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => error!("❌ Could not remove credential file {}: {}", self.path.display(), e),
        }
        info!("🧹 Cleared stored API key");
        *guard = None;
    }
}
