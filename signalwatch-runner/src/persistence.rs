//! Monitor state persistence: JSON snapshot save/load across restarts.

use std::path::{Path, PathBuf};

use anyhow::Context;
use signalwatch_core::state::{StateSnapshot, SNAPSHOT_SCHEMA_VERSION};

/// Load a snapshot from disk.
///
/// A missing file means a first run and yields `None`. An unreadable,
/// corrupt or newer-schema file is logged and also yields `None`, so the
/// monitor starts fresh instead of refusing to start.
pub fn load_snapshot(path: &Path) -> Option<StateSnapshot> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "state file unreadable, starting fresh");
            return None;
        }
    };

    match serde_json::from_str::<StateSnapshot>(&content) {
        Ok(snapshot) if snapshot.schema_version > SNAPSHOT_SCHEMA_VERSION => {
            tracing::warn!(
                path = %path.display(),
                found = snapshot.schema_version,
                supported = SNAPSHOT_SCHEMA_VERSION,
                "state file written by a newer version, starting fresh"
            );
            None
        }
        Ok(snapshot) => Some(snapshot),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "state file corrupt, starting fresh");
            None
        }
    }
}

/// Write a snapshot atomically: serialize to a sibling temp file, then rename
/// over the target. Creates parent directories if needed.
pub fn save_snapshot(path: &Path, snapshot: &StateSnapshot) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating state directory {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(snapshot).context("serializing state snapshot")?;

    let tmp = temp_path(path);
    std::fs::write(&tmp, json).with_context(|| format!("writing {}", tmp.display()))?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("renaming {} to {}", tmp.display(), path.display()))?;
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "state".into());
    name.push(".tmp");
    path.with_file_name(name)
}
