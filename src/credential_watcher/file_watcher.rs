//! File-based credential change detection using the `notify` crate.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use notify::{RecommendedWatcher, RecursiveMode, Watcher};

use crate::adapters::FileCredentialStore;

/// Watch the store's settings file and reload it when it changes on disk.
///
/// The parent directory is watched (and created if missing) rather than the
/// file itself, so editors that replace the file on save are still seen.
/// Each reload announces changed keys on the store's signal bus.
///
/// Returns the watcher handle (MUST be kept alive - dropping it stops watching).
pub fn spawn_file_watcher(store: Arc<FileCredentialStore>) -> notify::Result<RecommendedWatcher> {
    let path = store.path().to_path_buf();
    let dir = watch_dir(&path);
    std::fs::create_dir_all(&dir).map_err(notify::Error::io)?;

    let file_name = path.file_name().map(OsStr::to_os_string);
    let mut watcher = notify::recommended_watcher(
        move |result: notify::Result<notify::Event>| match result {
            Ok(event) => {
                if !touches_file(&event, file_name.as_deref()) {
                    return;
                }
                tracing::debug!("Settings file event: {:?}", event.kind);
                match store.reload() {
                    Ok(changes) if changes.is_empty() => {
                        tracing::trace!("Settings file touched without changes");
                    }
                    Ok(_) => {}
                    Err(e) => tracing::warn!("Failed to reload settings file: {}", e),
                }
            }
            Err(e) => tracing::warn!("Settings file watch error: {}", e),
        },
    )?;

    watcher.watch(&dir, RecursiveMode::NonRecursive)?;
    tracing::info!("Watching {} for credential changes", path.display());

    Ok(watcher)
}

fn watch_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Whether `event` may have changed the file named `file_name`.
fn touches_file(event: &notify::Event, file_name: Option<&OsStr>) -> bool {
    if event.kind.is_access() {
        return false;
    }
    // Compare names only: the watcher may report canonicalized paths
    event
        .paths
        .iter()
        .any(|p| file_name.is_some() && p.file_name() == file_name)
}
