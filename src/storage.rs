//! Index path resolution, per spec.md §4.10: an absolute configured path is
//! used verbatim; a relative one resolves under a per-user writable
//! directory in packaged mode (mirroring the original's
//! `%LOCALAPPDATA%/FinLite`-style base dir, realized here with `directories`)
//! or relative to the current working directory in development mode.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;

pub fn resolve_index_path(configured: &str, packaged_mode: bool) -> PathBuf {
    let configured = Path::new(configured);
    if configured.is_absolute() {
        return configured.to_path_buf();
    }

    if packaged_mode {
        if let Some(dirs) = ProjectDirs::from("dev", "tablerag", "tablerag") {
            return dirs.data_local_dir().join(configured);
        }
    }

    configured.to_path_buf()
}
