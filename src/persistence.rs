use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use tracing::debug;

use crate::errors::{EngineError, EngineResult};

/// Read a JSON document, or `None` if the file does not exist yet
pub async fn read_json<T: DeserializeOwned>(path: &Path) -> EngineResult<Option<T>> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(EngineError::Storage(format!(
                "failed to read {}: {}",
                path.display(),
                e
            )))
        }
    };

    serde_json::from_str(&content)
        .map(Some)
        .map_err(|e| EngineError::Storage(format!("failed to parse {}: {}", path.display(), e)))
}

/// Replace the file at `path` with `value` as pretty JSON.
///
/// Writes to a sibling temp file first so a crash never leaves a truncated
/// document behind.
pub async fn write_json<T: Serialize>(path: &Path, value: &T) -> EngineResult<()> {
    let serialized = serde_json::to_string_pretty(value)
        .map_err(|e| EngineError::Storage(format!("failed to serialize {}: {}", path.display(), e)))?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| EngineError::Storage(format!("failed to create {}: {}", parent.display(), e)))?;
    }

    let tmp_path = path.with_extension("json.tmp");
    tokio::fs::write(&tmp_path, serialized)
        .await
        .map_err(|e| EngineError::Storage(format!("failed to write {}: {}", tmp_path.display(), e)))?;
    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| EngineError::Storage(format!("failed to replace {}: {}", path.display(), e)))?;

    debug!("Persisted {}", path.display());
    Ok(())
}
