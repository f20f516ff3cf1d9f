//! Retry, backoff and escalation for stale chunk loads.
//!
//! One [`RetryRecord`] per failing module key. Each classified failure either
//! schedules a retry (`base_delay * 2^attempts`, purging static-asset caches
//! before the next load) or, once `max_retries` retries have been spent,
//! clears the record and publishes a `recovery-required` notification.
//!
//! Retries run on their own abortable tasks and report back over a channel;
//! loader-hook callbacks do the same. [`ChunkRecoveryManager::poll`] drains
//! both from the owner's loop.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::{AbortHandle, Abortable};
use tokio::sync::mpsc;
use tokio::time::Instant;

use staleguard_config::RecoverySettings;
use staleguard_core::{CacheStore, LoaderHook, NotificationChannel};
use staleguard_types::{Disposition, HookId, LoadFailure, ModuleKey, Notification, ResourceErrorEvent};

use crate::classify;
use crate::purge::purge_caches;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RetryRecord {
    /// Never exceeds `max_retries`.
    pub attempts: u32,
    pub next_retry_at: Option<Instant>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleOutcome {
    /// Retry `attempt` (1-based) will run after `delay`.
    Scheduled { attempt: u32, delay: Duration },
    /// A retry for this key is already pending.
    Coalesced,
    /// Retries exhausted; the user was asked to recover manually.
    Escalated,
}

/// A scheduled retry ran: caches were purged and the next load may proceed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryFired {
    pub key: ModuleKey,
    pub attempt: u32,
    pub purged: usize,
}

struct Registration {
    hook: Arc<dyn LoaderHook>,
    id: HookId,
}

pub struct ChunkRecoveryManager {
    settings: RecoverySettings,
    caches: Arc<dyn CacheStore>,
    records: BTreeMap<ModuleKey, RetryRecord>,
    pending: HashMap<ModuleKey, AbortHandle>,
    fired_tx: mpsc::UnboundedSender<RetryFired>,
    fired_rx: mpsc::UnboundedReceiver<RetryFired>,
    hook_tx: mpsc::UnboundedSender<LoadFailure>,
    hook_rx: mpsc::UnboundedReceiver<LoadFailure>,
    registration: Option<Registration>,
    fired: Vec<RetryFired>,
    escalations: u64,
}

impl std::fmt::Debug for ChunkRecoveryManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkRecoveryManager")
            .field("records", &self.records)
            .field("pending", &self.pending.len())
            .field("initialized", &self.registration.is_some())
            .field("escalations", &self.escalations)
            .finish_non_exhaustive()
    }
}

impl ChunkRecoveryManager {
    #[must_use]
    pub fn new(settings: RecoverySettings, caches: Arc<dyn CacheStore>) -> Self {
        let (fired_tx, fired_rx) = mpsc::unbounded_channel();
        let (hook_tx, hook_rx) = mpsc::unbounded_channel();
        Self {
            settings,
            caches,
            records: BTreeMap::new(),
            pending: HashMap::new(),
            fired_tx,
            fired_rx,
            hook_tx,
            hook_rx,
            registration: None,
            fired: Vec::new(),
            escalations: 0,
        }
    }

    /// Register with the module loader. A second call is a no-op.
    pub fn initialize(&mut self, hook: Arc<dyn LoaderHook>) {
        if self.registration.is_some() {
            return;
        }
        let tx = self.hook_tx.clone();
        let id = hook.register(Box::new(move |failure| {
            let _ = tx.send(failure);
        }));
        tracing::info!(hook = %id, "Chunk recovery initialized");
        self.registration = Some(Registration { hook, id });
    }

    /// Unregister, abort every pending retry and forget all records. Idempotent.
    pub fn cleanup(&mut self) {
        if let Some(registration) = self.registration.take() {
            registration.hook.unregister(registration.id);
            tracing::info!(hook = %registration.id, "Chunk recovery cleaned up");
        }
        for (_, abort) in self.pending.drain() {
            abort.abort();
        }
        self.records.clear();
        while self.fired_rx.try_recv().is_ok() {}
        while self.hook_rx.try_recv().is_ok() {}
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.registration.is_some()
    }

    /// A global resource-load error.
    ///
    /// Always passes through: the host's default reporting still sees it.
    pub fn on_resource_error(
        &mut self,
        event: &ResourceErrorEvent,
        channel: &mut NotificationChannel,
        now: Instant,
    ) -> Disposition {
        if let Some(key) = classify::key_for_resource_error(event, &self.settings.static_chunk_path)
        {
            let _ = self.handle(&key, channel, now);
        }
        Disposition::PassThrough
    }

    /// An unhandled promise rejection. Classified chunk failures are ours.
    pub fn on_unhandled_rejection(
        &mut self,
        failure: &LoadFailure,
        channel: &mut NotificationChannel,
        now: Instant,
    ) -> Disposition {
        if !classify::classify(failure) {
            return Disposition::PassThrough;
        }
        let key = classify::key_for_failure(failure, &self.settings.static_chunk_path);
        tracing::debug!(key = %key, "Chunk load rejection: {failure}");
        let _ = self.handle(&key, channel, now);
        Disposition::Handled
    }

    /// Advance the retry state machine for `key` after a classified failure.
    pub fn handle(
        &mut self,
        key: &ModuleKey,
        channel: &mut NotificationChannel,
        now: Instant,
    ) -> HandleOutcome {
        if self.pending.contains_key(key) {
            tracing::debug!(key = %key, "Retry already pending; failure coalesced");
            return HandleOutcome::Coalesced;
        }

        let record = self.records.entry(key.clone()).or_default();
        if record.attempts >= self.settings.max_retries {
            self.records.remove(key);
            self.escalations += 1;
            tracing::info!(
                key = %key,
                retries = self.settings.max_retries,
                "Chunk retries exhausted; manual recovery required"
            );
            channel.publish(
                Notification::recovery_required(self.settings.display_window),
                now,
            );
            return HandleOutcome::Escalated;
        }

        let delay = backoff_delay(self.settings.base_delay, record.attempts);
        record.attempts += 1;
        record.next_retry_at = Some(now + delay);
        let attempt = record.attempts;

        tracing::info!(
            key = %key,
            attempt,
            delay_ms = delay.as_millis() as u64,
            "Chunk load failed; retry scheduled"
        );
        let abort = self.spawn_retry(key.clone(), attempt, delay);
        self.pending.insert(key.clone(), abort);
        HandleOutcome::Scheduled { attempt, delay }
    }

    fn spawn_retry(&self, key: ModuleKey, attempt: u32, delay: Duration) -> AbortHandle {
        let caches = Arc::clone(&self.caches);
        let namespaces = self.settings.cache_namespaces.clone();
        let tx = self.fired_tx.clone();

        let task = async move {
            tokio::time::sleep(delay).await;
            let purged = purge_caches(caches.as_ref(), &namespaces).await;
            let _ = tx.send(RetryFired {
                key,
                attempt,
                purged,
            });
        };

        let (abort, registration) = AbortHandle::new_pair();
        tokio::spawn(async move {
            let _ = Abortable::new(task, registration).await;
        });
        abort
    }

    /// Drain loader-hook failures and retry reports. Returns how many were processed.
    pub fn poll(&mut self, channel: &mut NotificationChannel, now: Instant) -> usize {
        let mut processed = 0;

        while let Ok(failure) = self.hook_rx.try_recv() {
            processed += 1;
            if !classify::classify(&failure) {
                tracing::debug!("Loader failure not a stale chunk: {failure}");
                continue;
            }
            let key = classify::key_for_failure(&failure, &self.settings.static_chunk_path);
            let _ = self.handle(&key, channel, now);
        }

        while let Ok(fired) = self.fired_rx.try_recv() {
            processed += 1;
            self.pending.remove(&fired.key);
            if let Some(record) = self.records.get_mut(&fired.key) {
                record.next_retry_at = None;
            }
            tracing::debug!(
                key = %fired.key,
                attempt = fired.attempt,
                purged = fired.purged,
                "Chunk retry ran"
            );
            self.fired.push(fired);
        }

        processed
    }

    /// Retries that ran since the last call.
    pub fn take_fired(&mut self) -> Vec<RetryFired> {
        std::mem::take(&mut self.fired)
    }

    /// The chunk loaded after all; forget it. Returns whether a record existed.
    pub fn mark_loaded(&mut self, key: &ModuleKey) -> bool {
        if let Some(abort) = self.pending.remove(key) {
            abort.abort();
        }
        let existed = self.records.remove(key).is_some();
        if existed {
            tracing::info!(key = %key, "Chunk recovered");
        }
        existed
    }

    #[must_use]
    pub fn record(&self, key: &ModuleKey) -> Option<&RetryRecord> {
        self.records.get(key)
    }

    #[must_use]
    pub fn records(&self) -> &BTreeMap<ModuleKey, RetryRecord> {
        &self.records
    }

    #[must_use]
    pub fn pending_retries(&self) -> usize {
        self.pending.len()
    }

    #[must_use]
    pub fn escalations(&self) -> u64 {
        self.escalations
    }

    #[must_use]
    pub fn settings(&self) -> &RecoverySettings {
        &self.settings
    }
}

impl Drop for ChunkRecoveryManager {
    fn drop(&mut self) {
        self.cleanup();
    }
}

/// `base * 2^attempts`, saturating.
#[must_use]
pub fn backoff_delay(base: Duration, attempts: u32) -> Duration {
    let factor = 2u32.checked_pow(attempts).unwrap_or(u32::MAX);
    base.saturating_mul(factor)
}
