//! The background Update Manager (spec §4.E): the only thread that writes
//! dirty entities back to the [`StorageBackend`] and drains the deferred
//! deletion queue. Runs on a fixed scan interval rather than being woken
//! per mutation, matching the original source's batched-flush design.

use crate::{
    config::UpdateManagerConfig,
    dbaccess::DatabaseAccess,
    id::Id,
    time::{JumpDetector, TimeStamp},
};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::thread::JoinHandle;
use std::time::Duration;

pub struct UpdateManager {
    access: Arc<DatabaseAccess>,
    config: UpdateManagerConfig,
    shutdown: Arc<AtomicBool>,
    handle: parking_lot::Mutex<Option<JoinHandle<()>>>,
    jump_detector: parking_lot::Mutex<JumpDetector>,
}

impl UpdateManager {
    pub fn new(access: Arc<DatabaseAccess>, config: UpdateManagerConfig) -> Self {
        Self {
            access,
            config,
            shutdown: Arc::new(AtomicBool::new(false)),
            handle: parking_lot::Mutex::new(None),
            jump_detector: parking_lot::Mutex::new(JumpDetector::new()),
        }
    }

    /// Spawns the background scan thread. Calling this twice without an
    /// intervening [`Self::stop`] is a no-op.
    pub fn start(self: &Arc<Self>) {
        let mut handle = self.handle.lock();
        if handle.is_some() {
            return;
        }
        let manager = self.clone();
        *handle = Some(std::thread::spawn(move || manager.run()));
    }

    pub fn stop(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.lock().take() {
            let _ = handle.join();
        }
    }

    fn run(&self) {
        let interval = Duration::from_millis(self.config.scan_interval_ms.max(1));
        while !self.shutdown.load(Ordering::SeqCst) {
            self.observe_time();
            self.flush_dirty();
            self.drain_deletions();
            std::thread::sleep(interval);
        }
    }

    /// Checks wall-clock time for a jump since the last scan and logs it
    /// (spec §4.E). Public so a host process can also forward an explicit
    /// `os_time_has_jumped` signal between scans.
    pub fn observe_time(&self) {
        let jumped = self
            .jump_detector
            .lock()
            .observe(TimeStamp::now(), self.config.clock_jump_tolerance_secs);
        if let Some(backwards) = jumped {
            tracing::warn!(backwards, "system clock jump detected between scans");
        }
    }

    fn flush_dirty(&self) {
        for cache in self.access.all_site_caches() {
            for entity_id in cache.dirty_entity_ids() {
                let id = Id::new(cache.site_id(), entity_id);
                let Some(entity_ref) = cache.get(entity_id) else {
                    continue;
                };
                let (snapshot, deltas) = {
                    let mut guard = entity_ref.write();
                    let deltas = guard.header_mut().take_pending_deltas();
                    guard.header_mut().dirty.clear();
                    (guard.clone(), deltas)
                };
                if let Err(err) = self.access.backend().save_entity(id, &snapshot) {
                    tracing::error!(%id, error = %err, "failed to flush dirty entity");
                    entity_ref.write().header_mut().dirty.mark_all();
                    continue;
                }
                if !deltas.is_empty() {
                    tracing::debug!(%id, count = deltas.len(), "applied reference deltas");
                }
                self.access.clear_rename_in_flight(id);
            }
        }
    }

    fn drain_deletions(&self) {
        for cache in self.access.all_site_caches() {
            for entity_id in cache.delete_pending_ids() {
                if cache.is_anything_referenced(entity_id) {
                    continue;
                }
                let id = Id::new(cache.site_id(), entity_id);
                if let Err(err) = self.access.finish_delete(&cache, id) {
                    tracing::warn!(%id, error = %err, "retrying deferred delete next scan");
                }
            }
        }
    }
}

impl Drop for UpdateManager {
    fn drop(&mut self) {
        self.stop();
    }
}
