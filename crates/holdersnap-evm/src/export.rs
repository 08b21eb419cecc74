//! JSON output files.

use std::path::Path;

use serde::Serialize;

use holdersnap_core::error::SnapshotError;
use holdersnap_core::types::HolderBalance;

/// Write `value` as pretty JSON, creating parent directories. The file is
/// replaced atomically via a sibling `.tmp` file.
pub async fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), SnapshotError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut body = serde_json::to_vec_pretty(value)?;
    body.push(b'\n');

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    tokio::fs::write(&tmp, body).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

/// Write the snapshot: `[{"address": "0x…", "balance": 1.5 | null}, …]`.
pub async fn write_snapshot(path: &Path, balances: &[HolderBalance]) -> Result<(), SnapshotError> {
    write_json(path, balances).await?;
    tracing::info!(path = %path.display(), holders = balances.len(), "snapshot written");
    Ok(())
}

/// Read a snapshot file back.
pub async fn read_snapshot(path: &Path) -> Result<Vec<HolderBalance>, SnapshotError> {
    let raw = tokio::fs::read(path).await?;
    Ok(serde_json::from_slice(&raw)?)
}
