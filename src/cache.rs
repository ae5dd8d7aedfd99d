//! Expiring observation-template cache.
//!
//! Templates are registered with a time to live. Expired entries are hidden
//! from lookups immediately and physically removed by [`TemplateCache::sweep`],
//! which a [`Sweeper`] thread can run periodically.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use tracing::{debug, warn};

use crate::error::Result;
use crate::model::ObservationCriteria;

#[derive(Debug, Clone)]
struct CacheEntry {
    criteria: ObservationCriteria,
    /// `None` never expires.
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

#[derive(Debug, Default)]
pub struct TemplateCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl TemplateCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, CacheEntry>> {
        // entries stay consistent even if a holder panicked
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Registers `criteria` for `ttl`. A TTL too large to represent as an
    /// instant keeps the entry forever.
    pub fn insert(&self, template_id: impl Into<String>, criteria: ObservationCriteria, ttl: Duration) {
        let template_id = template_id.into();
        debug!("Registering template {} for {:?}", template_id, ttl);
        self.lock().insert(
            template_id,
            CacheEntry {
                criteria,
                expires_at: Instant::now().checked_add(ttl),
            },
        );
    }

    pub fn get(&self, template_id: &str) -> Option<ObservationCriteria> {
        let now = Instant::now();
        self.lock()
            .get(template_id)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.criteria.clone())
    }

    pub fn remove(&self, template_id: &str) -> Option<ObservationCriteria> {
        self.lock().remove(template_id).map(|entry| entry.criteria)
    }

    /// Number of stored entries, expired ones included until swept.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Drops expired entries and returns how many were removed.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, entry| entry.is_live(now));
        before - entries.len()
    }

    /// Starts a named thread that sweeps `cache` every `interval` until the
    /// returned handle is dropped.
    pub fn start_sweeper(cache: Arc<TemplateCache>, interval: Duration) -> Result<Sweeper> {
        let (stop_tx, stop_rx) = bounded::<()>(1);

        let handle = thread::Builder::new()
            .name("sos-template-sweeper".to_string())
            .spawn(move || loop {
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {
                        let removed = cache.sweep();
                        if removed > 0 {
                            debug!("Swept {} expired templates", removed);
                        }
                    }
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            })?;

        Ok(Sweeper {
            stop_tx,
            handle: Some(handle),
        })
    }
}

/// Handle to a running sweep thread. Dropping it stops and joins the thread.
pub struct Sweeper {
    stop_tx: Sender<()>,
    handle: Option<JoinHandle<()>>,
}

impl Sweeper {
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        let _ = self.stop_tx.try_send(());
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("Template sweeper thread panicked");
            }
        }
    }
}

impl Drop for Sweeper {
    fn drop(&mut self) {
        self.shutdown();
    }
}
