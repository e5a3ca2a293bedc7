//! Registry of the tool servers started by this session

use crate::error::Result;
use crate::lock;
use crate::server::ServerProcess;
use async_io::Timer;
use chrono::{DateTime, Utc};
use futures::lock::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use url::Url;

/// Interval between background refreshes
pub const DEFAULT_RECONCILE_INTERVAL: Duration = Duration::from_secs(5);

/// How long an exited server stays listed before it is pruned
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(60);

/// Snapshot of a tracked server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerInfo {
    /// Process ID
    pub pid: u32,
    /// Game data file the server was started for
    pub target: PathBuf,
    /// Address the server listens on
    pub listen_address: Url,
    /// Lock file announcing the server
    pub lock_file_path: PathBuf,
    /// When the server was started
    pub started_at: DateTime<Utc>,
    /// When a refresh first saw the server gone
    pub exited_at: Option<DateTime<Utc>>,
}

struct Tracked {
    server: ServerProcess,
    exited: Option<(Instant, DateTime<Utc>)>,
}

impl Tracked {
    fn info(&self) -> ServerInfo {
        ServerInfo {
            pid: self.server.pid(),
            target: self.server.target().to_path_buf(),
            listen_address: self.server.listen_address().clone(),
            lock_file_path: self.server.lock_file_path().to_path_buf(),
            started_at: self.server.started_at(),
            exited_at: self.exited.map(|(_, at)| at),
        }
    }
}

/// Servers keyed by their normalized target path
///
/// Share it through an `Arc`; [`spawn_reconciler`](Self::spawn_reconciler)
/// keeps liveness current in the background.
pub struct ProcessList {
    servers: Mutex<HashMap<String, Tracked>>,
    retention: Duration,
}

impl Default for ProcessList {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessList {
    /// Create an empty list with the default retention window
    pub fn new() -> Self {
        Self::with_retention(DEFAULT_RETENTION)
    }

    /// Create an empty list that prunes exited servers after `retention`
    pub fn with_retention(retention: Duration) -> Self {
        Self {
            servers: Mutex::new(HashMap::new()),
            retention,
        }
    }

    /// Start tracking `server`, returning the server previously tracked for the same target
    pub async fn track(&self, server: ServerProcess) -> Result<Option<ServerProcess>> {
        let key = lock::normalize_target_path(server.target())?;
        debug!("Tracking server {} for {}", server.pid(), key);
        let previous = self.servers.lock().await.insert(
            key,
            Tracked {
                server,
                exited: None,
            },
        );
        Ok(previous.map(|tracked| tracked.server))
    }

    /// Snapshot of the server tracked for `target`
    pub async fn get(&self, target: &Path) -> Option<ServerInfo> {
        let key = lock::normalize_target_path(target).ok()?;
        self.servers.lock().await.get(&key).map(Tracked::info)
    }

    /// Stop tracking the server for `target` and hand it back
    pub async fn remove(&self, target: &Path) -> Option<ServerProcess> {
        let key = lock::normalize_target_path(target).ok()?;
        self.servers
            .lock()
            .await
            .remove(&key)
            .map(|tracked| tracked.server)
    }

    /// Snapshots of every tracked server
    pub async fn list(&self) -> Vec<ServerInfo> {
        let mut servers: Vec<_> = self.servers.lock().await.values().map(Tracked::info).collect();
        servers.sort_by(|a, b| a.started_at.cmp(&b.started_at));
        servers
    }

    /// Number of tracked servers, exited ones included until pruned
    pub async fn len(&self) -> usize {
        self.servers.lock().await.len()
    }

    /// True when nothing is tracked
    pub async fn is_empty(&self) -> bool {
        self.servers.lock().await.is_empty()
    }

    /// Update liveness of every entry and prune those exited longer than the retention window
    ///
    /// Failures for one entry are logged and skipped. Returns the number of
    /// pruned entries.
    pub async fn refresh(&self) -> usize {
        let pruned = {
            let mut servers = self.servers.lock().await;
            for (key, tracked) in servers.iter_mut() {
                if tracked.exited.is_some() {
                    continue;
                }
                match tracked.server.poll_exit() {
                    Ok(Some(status)) => {
                        info!(
                            "Server {} for {} exited with {}",
                            tracked.server.pid(),
                            key,
                            status
                        );
                        tracked.exited = Some((Instant::now(), Utc::now()));
                    }
                    Ok(None) => {}
                    Err(e) => debug!("Refresh of server {} failed: {}", tracked.server.pid(), e),
                }
            }

            let expired: Vec<String> = servers
                .iter()
                .filter(|(_, tracked)| {
                    tracked
                        .exited
                        .is_some_and(|(at, _)| at.elapsed() >= self.retention)
                })
                .map(|(key, _)| key.clone())
                .collect();
            expired
                .into_iter()
                .filter_map(|key| servers.remove(&key))
                .collect::<Vec<_>>()
        };

        let count = pruned.len();
        for tracked in pruned {
            let pid = tracked.server.pid();
            let path = tracked.server.lock_file_path();
            // Another session may have started a new server for the target since
            match lock::read_lock_file(path).await {
                Ok(Some(content)) if content.pid != pid => {
                    debug!("Lock file {} now belongs to pid {}", path.display(), content.pid);
                }
                _ => {
                    lock::delete_lock_file(path).await;
                }
            }
            debug!("Pruned server {}", pid);
        }
        count
    }

    /// Refresh every `interval` until the returned task is dropped
    ///
    /// The task also stops once the list itself is dropped.
    pub fn spawn_reconciler(self: &Arc<Self>, interval: Duration) -> smol::Task<()> {
        let list: Weak<Self> = Arc::downgrade(self);
        smol::spawn(async move {
            loop {
                Timer::after(interval).await;
                let Some(list) = list.upgrade() else {
                    break;
                };
                let pruned = list.refresh().await;
                if pruned > 0 {
                    debug!("Reconciler pruned {} servers", pruned);
                }
            }
        })
    }

    /// End every tracked server, returning how many ended cleanly
    pub async fn end_all(&self, grace: Duration) -> usize {
        let servers: Vec<Tracked> = self.servers.lock().await.drain().map(|(_, t)| t).collect();
        let mut ended = 0;
        for tracked in servers {
            let pid = tracked.server.pid();
            match tracked.server.end_gracefully(grace).await {
                Ok(()) => ended += 1,
                Err(e) => warn!("Failed to end server {}: {}", pid, e),
            }
        }
        ended
    }
}

impl std::fmt::Debug for ProcessList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessList")
            .field("retention", &self.retention)
            .finish_non_exhaustive()
    }
}
