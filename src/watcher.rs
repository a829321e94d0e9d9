//! File watcher that invalidates source caches.
//!
//! Watches the directories holding file-backed sources and clears the cache
//! of every source whose file changed, so the next read goes back to disk.
//! Uses debouncing to coalesce rapid file changes.

use crate::source::Source;
use crate::source_list::SourceList;
use notify_debouncer_mini::{DebounceEventResult, DebouncedEventKind, Debouncer, new_debouncer};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Configuration for the cache watcher.
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Debounce duration for coalescing rapid changes.
    pub debounce_duration: Duration,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            debounce_duration: Duration::from_millis(500),
        }
    }
}

/// A file-backed source and the absolute path of its file.
#[derive(Debug, Clone)]
struct WatchedSource {
    path: PathBuf,
    source: Source,
}

/// Handle to a running watcher.
///
/// Dropping it drops the debouncer, which closes the event channel and lets
/// the watcher thread exit.
pub struct CacheWatcher {
    /// Paths whose sources had their caches cleared.
    pub invalidated: mpsc::Receiver<PathBuf>,
    _debouncer: Debouncer<notify::RecommendedWatcher>,
}

impl CacheWatcher {
    /// Watch every file-backed source currently in `sources`.
    ///
    /// Sources added to the list afterwards are not watched.
    pub fn start(sources: &SourceList, config: WatcherConfig) -> Result<Self, notify::Error> {
        let watched: Vec<WatchedSource> = sources
            .iter()
            .filter_map(|source| {
                let path = absolute(source.watch_path()?);
                Some(WatchedSource { path, source })
            })
            .collect();

        let (notify_tx, notify_rx) = mpsc::channel::<DebounceEventResult>();
        let (event_tx, event_rx) = mpsc::channel();
        let mut debouncer = new_debouncer(config.debounce_duration, notify_tx)?;

        let dirs: BTreeSet<PathBuf> = watched
            .iter()
            .filter_map(|w| w.path.parent().map(Path::to_path_buf))
            .collect();
        for dir in &dirs {
            if dir.exists() {
                info!("Watching config directory: {}", dir.display());
                debouncer
                    .watcher()
                    .watch(dir, notify::RecursiveMode::NonRecursive)?;
            } else {
                warn!(
                    "Config directory does not exist, skipping watch: {}",
                    dir.display()
                );
            }
        }

        thread::Builder::new()
            .name("config-cache-watcher".to_string())
            .spawn(move || process_notify_events(notify_rx, event_tx, &watched))
            .map_err(notify::Error::io)?;

        Ok(Self {
            invalidated: event_rx,
            _debouncer: debouncer,
        })
    }
}

fn process_notify_events(
    rx: mpsc::Receiver<DebounceEventResult>,
    tx: mpsc::Sender<PathBuf>,
    watched: &[WatchedSource],
) {
    loop {
        match rx.recv() {
            Ok(Ok(events)) => {
                let changed: BTreeSet<PathBuf> = events
                    .into_iter()
                    .filter(|e| {
                        matches!(
                            e.kind,
                            DebouncedEventKind::Any | DebouncedEventKind::AnyContinuous
                        )
                    })
                    .map(|e| e.path)
                    .collect();

                for path in changed {
                    let sources = matching_sources(&path, watched);
                    if sources.is_empty() {
                        continue;
                    }
                    for source in sources {
                        debug!(source = source.name(), "Clearing cache after file change");
                        source.clear_cache();
                    }
                    // Nobody listening is fine; keep invalidating.
                    let _ = tx.send(path);
                }
            }
            Ok(Err(e)) => {
                error!("File watcher error: {}", e);
            }
            Err(_) => {
                info!("Config watcher channel closed, stopping");
                return;
            }
        }
    }
}

/// Sources backed by the file at `path`.
fn matching_sources<'a>(path: &Path, watched: &'a [WatchedSource]) -> Vec<&'a Source> {
    let path = absolute(path);
    watched
        .iter()
        .filter(|w| w.path == path)
        .map(|w| &w.source)
        .collect()
}

/// Absolute form of `path` with symlinks in its directory resolved.
fn absolute(path: &Path) -> PathBuf {
    let resolved = match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) if !parent.as_os_str().is_empty() => parent
            .canonicalize()
            .ok()
            .map(|parent| parent.join(name)),
        _ => None,
    };
    resolved
        .or_else(|| std::path::absolute(path).ok())
        .unwrap_or_else(|| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::{MemoryAdapter, YamlFile};
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn watched(path: &Path) -> WatchedSource {
        WatchedSource {
            path: absolute(path),
            source: Source::new(YamlFile::new(path)),
        }
    }

    #[test]
    fn test_matching_sources_by_path() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.yaml");
        let b = dir.path().join("b.yaml");
        let list = vec![watched(&a), watched(&b)];

        let found = matching_sources(&a, &list);
        assert_eq!(found.len(), 1);
        assert!(found[0].ptr_eq(&list[0].source));

        assert!(matching_sources(&dir.path().join("c.yaml"), &list).is_empty());
    }

    #[test]
    fn test_start_skips_memory_sources() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "a: 1\n").unwrap();

        let list = SourceList::new();
        list.push(Source::new(MemoryAdapter::new(json!({"a": 0}))));
        list.push(Source::builder(YamlFile::new(&path)).cached(true).build());

        let watcher = CacheWatcher::start(&list, WatcherConfig::default()).unwrap();
        assert!(watcher.invalidated.try_recv().is_err());
        drop(watcher);
    }

    #[test]
    fn test_file_change_clears_cache() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "a: 1\n").unwrap();

        let source = Source::builder(YamlFile::new(&path)).cached(true).build();
        let list = SourceList::new();
        list.push(source.clone());

        let config = WatcherConfig {
            debounce_duration: Duration::from_millis(100),
        };
        let watcher = CacheWatcher::start(&list, config).unwrap();

        let key = crate::keys::KeyPath::parse("a");
        assert_eq!(source.read_path(&key).unwrap(), Some(json!(1)));

        fs::write(&path, "a: 2\n").unwrap();
        let changed = watcher
            .invalidated
            .recv_timeout(Duration::from_secs(5))
            .unwrap();
        assert_eq!(changed.file_name(), path.file_name());
        assert!(source.is_cached());
        assert_eq!(source.read_path(&key).unwrap(), Some(json!(2)));
    }
}
