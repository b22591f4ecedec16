use super::traits::RunStore;
use crate::research::RunState;
use crate::types::{AppError, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;

/// One JSON file per run under a state directory
pub struct FileRunStore {
    dir: PathBuf,
}

impl FileRunStore {
    /// Open (and create if needed) the state directory
    pub async fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await.map_err(|e| {
            AppError::Storage(format!(
                "Failed to create state directory {}: {}",
                dir.display(),
                e
            ))
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, run_id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", file_stem(run_id)))
    }
}

/// Map a run id onto a safe file name.
///
/// ASCII letters, digits and `-` are kept; every other byte, `_` included,
/// becomes `_XX` in hex, so distinct ids never share a file.
fn file_stem(run_id: &str) -> String {
    let mut stem = String::with_capacity(run_id.len());
    for byte in run_id.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' {
            stem.push(byte as char);
        } else {
            stem.push_str(&format!("_{:02X}", byte));
        }
    }
    stem
}

#[async_trait]
impl RunStore for FileRunStore {
    async fn save(&self, state: &RunState) -> Result<()> {
        let json = serde_json::to_vec_pretty(state)
            .map_err(|e| AppError::Storage(format!("Failed to encode run state: {}", e)))?;

        let path = self.path_for(&state.run_id);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, &json)
            .await
            .map_err(|e| AppError::Storage(format!("Failed to write {}: {}", tmp.display(), e)))?;
        // Rename so readers never see a half-written file.
        fs::rename(&tmp, &path)
            .await
            .map_err(|e| AppError::Storage(format!("Failed to replace {}: {}", path.display(), e)))?;
        Ok(())
    }

    async fn load_all(&self) -> Result<Vec<RunState>> {
        let mut entries = fs::read_dir(&self.dir).await.map_err(|e| {
            AppError::Storage(format!("Failed to read {}: {}", self.dir.display(), e))
        })?;

        let mut runs = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| AppError::Storage(format!("Failed to list run states: {}", e)))?
        {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }

            let bytes = match fs::read(&path).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable run state");
                    continue;
                }
            };
            match serde_json::from_slice::<RunState>(&bytes) {
                Ok(state) => runs.push(state),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Skipping corrupt run state")
                }
            }
        }

        runs.sort_by(|a, b| a.run_id.cmp(&b.run_id));
        Ok(runs)
    }
}
