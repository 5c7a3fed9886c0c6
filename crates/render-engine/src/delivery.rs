//! Hand the finished GIF to the user as a timestamped file.

use std::path::{Path, PathBuf};

use reelgif_common::error::{ReelgifError, ReelgifResult};

/// `export_<unix_ms>.gif`
pub fn export_filename(unix_ms: i64) -> String {
    format!("export_{unix_ms}.gif")
}

/// Write `bytes` into `exports_dir` under a fresh timestamped name.
pub async fn deliver(bytes: &[u8], exports_dir: &Path) -> ReelgifResult<PathBuf> {
    deliver_at(bytes, exports_dir, chrono::Utc::now().timestamp_millis()).await
}

/// Write `bytes` as `export_<unix_ms>.gif`, never replacing an existing file.
///
/// The GIF is staged in a `.part` file and renamed into place, so a reader
/// never observes a partial export. The staging file is removed on failure.
pub async fn deliver_at(bytes: &[u8], exports_dir: &Path, unix_ms: i64) -> ReelgifResult<PathBuf> {
    if bytes.is_empty() {
        return Err(ReelgifError::delivery("Refusing to deliver an empty GIF"));
    }

    tokio::fs::create_dir_all(exports_dir).await.map_err(|e| {
        ReelgifError::delivery(format!("Cannot create {}: {e}", exports_dir.display()))
    })?;

    let target = unique_target(exports_dir, unix_ms).await;
    let staging = target.with_extension("gif.part");

    let written = async {
        tokio::fs::write(&staging, bytes).await?;
        tokio::fs::rename(&staging, &target).await
    }
    .await;

    if let Err(e) = written {
        let _ = tokio::fs::remove_file(&staging).await;
        return Err(ReelgifError::delivery(format!(
            "Failed to write {}: {e}",
            target.display()
        )));
    }

    tracing::info!(path = %target.display(), bytes = bytes.len(), "GIF delivered");
    Ok(target)
}

async fn unique_target(dir: &Path, unix_ms: i64) -> PathBuf {
    let first = dir.join(export_filename(unix_ms));
    if !path_exists(&first).await {
        return first;
    }
    let mut suffix = 1u32;
    loop {
        let candidate = dir.join(format!("export_{unix_ms}_{suffix}.gif"));
        if !path_exists(&candidate).await {
            return candidate;
        }
        suffix += 1;
    }
}

async fn path_exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}
