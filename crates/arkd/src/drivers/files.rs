//! Filesystem drivers: ini sync and map wipes.

use crate::capabilities::{FileSync, WipeRoutine};
use crate::config_store::ConfigStore;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Names containing any of these survive a wipe (tribe sync, bans, paintings)
const PROTECTED_MARKERS: [&str; 3] = ["sync", "ban", "paint"];

/// Copies backup ini files into the live config directory
pub struct IniSync {
    config: Arc<ConfigStore>,
}

impl IniSync {
    pub fn new(config: Arc<ConfigStore>) -> Self {
        Self { config }
    }
}

#[async_trait]
impl FileSync for IniSync {
    async fn sync(&self, source: &Path) -> bool {
        let Some(name) = source.file_name() else {
            error!("ini source has no file name: {}", source.display());
            return false;
        };
        if !tokio::fs::try_exists(source).await.unwrap_or(false) {
            error!("ini file not found: {}", source.display());
            return false;
        }

        let dest = self.config.snapshot().paths.ini_dir().join(name);
        match tokio::fs::copy(source, &dest).await {
            Ok(_) => {
                info!("Synced {} to {}", source.display(), dest.display());
                true
            }
            Err(e) => {
                error!("Failed to sync {}: {}", source.display(), e);
                false
            }
        }
    }
}

/// Deletes map save data, keeping protected files
pub struct FsWipe {
    config: Arc<ConfigStore>,
}

impl FsWipe {
    pub fn new(config: Arc<ConfigStore>) -> Self {
        Self { config }
    }
}

#[async_trait]
impl WipeRoutine for FsWipe {
    async fn wipe(&self, include_cluster: bool) -> Result<usize> {
        let paths = self.config.snapshot().paths.clone();
        let maps_dir = paths.maps_dir();
        let cluster_dir = include_cluster.then(|| paths.cluster_dir());

        tokio::task::spawn_blocking(move || -> Result<usize> {
            if cluster_dir.is_some() {
                info!("Also wiping cluster data");
            }
            let targets = collect_wipe_targets(&maps_dir, cluster_dir.as_deref())
                .with_context(|| format!("Failed to scan {}", maps_dir.display()))?;

            let mut deleted = 0;
            for path in &targets {
                match std::fs::remove_file(path) {
                    Ok(()) => deleted += 1,
                    Err(e) => warn!("Failed to delete {}: {}", path.display(), e),
                }
            }
            info!("Deleted {} files", deleted);
            Ok(deleted)
        })
        .await
        .context("Wipe task panicked")?
    }
}

pub fn is_protected(path: &Path) -> bool {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    PROTECTED_MARKERS.iter().any(|m| name.contains(m))
}

/// Files to delete: everything in each map folder and one level of
/// sub-folders below it, plus the cluster directory when given. Protected
/// names are left out. A missing directory contributes nothing.
pub fn collect_wipe_targets(maps_dir: &Path, cluster_dir: Option<&Path>) -> io::Result<Vec<PathBuf>> {
    let mut targets = Vec::new();

    if let Some(cluster) = cluster_dir {
        targets.extend(files_in(cluster)?);
    }

    for map in dirs_in(maps_dir)? {
        for entry in entries(&map)? {
            if entry.is_dir() {
                targets.extend(files_in(&entry)?);
            } else {
                targets.push(entry);
            }
        }
    }

    targets.retain(|p| !is_protected(p));
    Ok(targets)
}

fn entries(dir: &Path) -> io::Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    std::fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect()
}

fn files_in(dir: &Path) -> io::Result<Vec<PathBuf>> {
    Ok(entries(dir)?.into_iter().filter(|p| p.is_file()).collect())
}

fn dirs_in(dir: &Path) -> io::Result<Vec<PathBuf>> {
    Ok(entries(dir)?.into_iter().filter(|p| p.is_dir()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_common::config::PathsConfig;
    use ark_common::Config;
    use std::fs;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"x").unwrap();
    }

    fn store_for(saved: &Path) -> Arc<ConfigStore> {
        let mut config = Config::default();
        config.paths = PathsConfig {
            saved_dir: saved.to_path_buf(),
        };
        Arc::new(ConfigStore::fixed(config))
    }

    #[test]
    fn test_protected_names() {
        assert!(is_protected(Path::new("TheIsland/123.arktributetribe_SYNC")));
        assert!(is_protected(Path::new("BanList.txt")));
        assert!(is_protected(Path::new("Sign_Paintings.pnt")));
        assert!(!is_protected(Path::new("TheIsland.ark")));
    }

    #[test]
    fn test_collect_targets() {
        let tmp = TempDir::new().unwrap();
        let maps = tmp.path().join("Maps");
        touch(&maps.join("TheIslandSOTF/TheIsland.ark"));
        touch(&maps.join("TheIslandSOTF/BanList.txt"));
        touch(&maps.join("TheIslandSOTF/SavedArks/123.arkprofile"));
        touch(&maps.join("TheIslandSOTF/SavedArks/Deep/ignored.ark"));
        touch(&maps.join("stray.txt"));

        let mut targets = collect_wipe_targets(&maps, None).unwrap();
        targets.sort();

        assert_eq!(
            targets,
            vec![
                maps.join("TheIslandSOTF/SavedArks/123.arkprofile"),
                maps.join("TheIslandSOTF/TheIsland.ark"),
            ]
        );
    }

    #[test]
    fn test_collect_missing_dirs() {
        let tmp = TempDir::new().unwrap();
        let targets =
            collect_wipe_targets(&tmp.path().join("Maps"), Some(&tmp.path().join("nope"))).unwrap();
        assert!(targets.is_empty());
    }

    #[tokio::test]
    async fn test_wipe_with_cluster() {
        let tmp = TempDir::new().unwrap();
        let paths = PathsConfig {
            saved_dir: tmp.path().to_path_buf(),
        };
        touch(&paths.maps_dir().join("Ragnarok/Ragnarok.ark"));
        touch(&paths.cluster_dir().join("76561198000000000"));
        touch(&paths.cluster_dir().join("tribe_sync"));

        let wipe = FsWipe::new(store_for(tmp.path()));
        let deleted = wipe.wipe(true).await.unwrap();

        assert_eq!(deleted, 2);
        assert!(!paths.maps_dir().join("Ragnarok/Ragnarok.ark").exists());
        assert!(paths.cluster_dir().join("tribe_sync").exists());
    }

    #[tokio::test]
    async fn test_wipe_without_cluster_keeps_cluster() {
        let tmp = TempDir::new().unwrap();
        let paths = PathsConfig {
            saved_dir: tmp.path().to_path_buf(),
        };
        touch(&paths.cluster_dir().join("76561198000000000"));

        let deleted = FsWipe::new(store_for(tmp.path())).wipe(false).await.unwrap();
        assert_eq!(deleted, 0);
        assert!(paths.cluster_dir().join("76561198000000000").exists());
    }

    #[tokio::test]
    async fn test_ini_sync() {
        let tmp = TempDir::new().unwrap();
        let paths = PathsConfig {
            saved_dir: tmp.path().join("Saved"),
        };
        fs::create_dir_all(paths.ini_dir()).unwrap();
        let source = tmp.path().join("backup/Game.ini");
        touch(&source);

        let sync = IniSync::new(store_for(&paths.saved_dir));
        assert!(sync.sync(&source).await);
        assert!(paths.ini_dir().join("Game.ini").exists());

        assert!(!sync.sync(&tmp.path().join("missing/Game.ini")).await);
    }
}
