//! # Checkpoint Tracker
//!
//! Owns the last-handled timestamp of every handler, loads prior values from the network
//! and periodically republishes the values that changed.
//!
//! ## Concurrency
//!
//! The handler set is fixed at construction. Each handler owns one slot holding an
//! `AtomicU64` timestamp and an `AtomicBool` dirty flag, addressed through an immutable
//! name index, so `hit` and `get` never take a lock and never wait:
//!
//! - `hit` is a compare-and-retry max-merge: a concurrent larger value is never overwritten
//! - a flush cycle swaps every dirty flag to `false` before its first publish, so a `hit`
//!   landing mid-flush raises the flag again and is published by the following cycle
//!
//! ## Flush Cycle
//!
//! The timer only starts a cycle: the records taken at cycle start are published by a
//! spawned task, concurrently and independently of each other, so an unacknowledged
//! publish never delays the next tick or another handler's record.

use futures::future::join_all;
use futures::StreamExt;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::record::{CheckpointRecord, CheckpointSettings};
use crate::clock::Clock;
use crate::error::{DispatchError, Result};
use crate::events::Filter;
use crate::relay::{RelayClient, SubscribeOptions, SubscriptionItem};

#[derive(Debug)]
struct CheckpointSlot {
    name: String,
    timestamp: AtomicU64,
    dirty: AtomicBool,
}

impl CheckpointSlot {
    fn new(name: String) -> Self {
        Self {
            name,
            timestamp: AtomicU64::new(0),
            dirty: AtomicBool::new(false),
        }
    }
}

/// Flush cycle counters
#[derive(Debug, Default)]
struct FlushStats {
    cycles: AtomicU64,
    skipped_cycles: AtomicU64,
    records_published: AtomicU64,
    publish_failures: AtomicU64,
}

/// Point-in-time copy of the flush counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FlushStatsSnapshot {
    pub cycles: u64,
    pub skipped_cycles: u64,
    pub records_published: u64,
    pub publish_failures: u64,
}

/// Outcome of one flush cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Pool was not fully connected; nothing was attempted
    pub skipped: bool,
    pub published: Vec<CheckpointRecord>,
    /// Handlers whose publish failed; they stay dirty
    pub failed: Vec<String>,
}

#[derive(Debug)]
struct TrackerState {
    reader: Arc<dyn RelayClient>,
    writer: Arc<dyn RelayClient>,
    index: HashMap<String, usize>,
    slots: Box<[CheckpointSlot]>,
    settings: CheckpointSettings,
    clock: Arc<dyn Clock>,
    loaded: OnceCell<usize>,
    stats: FlushStats,
}

/// Record taken from a dirty slot at cycle start, waiting to be published
#[derive(Debug)]
struct PendingRecord {
    slot: usize,
    record: CheckpointRecord,
}

impl TrackerState {
    fn slot(&self, name: &str) -> Result<&CheckpointSlot> {
        self.index
            .get(name)
            .map(|&i| &self.slots[i])
            .ok_or_else(|| DispatchError::unknown_handler(name))
    }

    fn hit(&self, name: &str, timestamp: u64) -> Result<bool> {
        let slot = self.slot(name)?;
        let mut current = slot.timestamp.load(Ordering::Acquire);

        loop {
            if timestamp <= current {
                return Ok(false);
            }
            match slot.timestamp.compare_exchange_weak(
                current,
                timestamp,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    slot.dirty.store(true, Ordering::Release);
                    return Ok(true);
                }
                // Lost the race: retry against the value that won
                Err(actual) => current = actual,
            }
        }
    }

    /// Open a flush cycle: gate on pool connectivity and take every dirty slot.
    ///
    /// `None` when the pool is not publishable; dirty flags are left untouched then.
    fn begin_cycle(&self) -> Option<Vec<PendingRecord>> {
        self.stats.cycles.fetch_add(1, Ordering::Relaxed);

        let pool = self.writer.pool_stats();
        if !pool.is_publishable() {
            self.stats.skipped_cycles.fetch_add(1, Ordering::Relaxed);
            debug!(
                connected = pool.connected,
                connecting = pool.connecting,
                disconnected = pool.disconnected,
                total = pool.total,
                "Relay pool not fully connected, skipping checkpoint flush"
            );
            return None;
        }

        let pending = self
            .slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.dirty.swap(false, Ordering::AcqRel))
            .map(|(index, slot)| PendingRecord {
                slot: index,
                record: CheckpointRecord::new(
                    slot.name.clone(),
                    slot.timestamp.load(Ordering::Acquire),
                ),
            })
            .collect();

        Some(pending)
    }

    /// Publish the records of one cycle concurrently
    async fn publish_records(&self, pending: Vec<PendingRecord>) -> FlushReport {
        let pubkey = self.writer.public_key();
        let published_at = self.clock.now();

        let outcomes = join_all(pending.into_iter().map(|pending| {
            let event = pending
                .record
                .to_event(&self.settings, pubkey.as_deref(), published_at);
            async move {
                let result = self.writer.publish(event).await;
                (pending, result)
            }
        }))
        .await;

        let mut report = FlushReport::default();
        for (pending, result) in outcomes {
            let PendingRecord { slot, record } = pending;
            match result {
                Ok(()) => {
                    self.stats.records_published.fetch_add(1, Ordering::Relaxed);
                    debug!(
                        handler = %record.handler,
                        timestamp = record.timestamp,
                        published_at = published_at,
                        "Published checkpoint"
                    );
                    report.published.push(record);
                }
                Err(e) => {
                    self.slots[slot].dirty.store(true, Ordering::Release);
                    self.stats.publish_failures.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        handler = %record.handler,
                        timestamp = record.timestamp,
                        error = %e,
                        "Failed to publish checkpoint, retrying next cycle"
                    );
                    report.failed.push(record.handler);
                }
            }
        }

        report
    }

    async fn load_last_handled(&self) -> Result<usize> {
        if self.slots.is_empty() {
            return Ok(0);
        }

        let mut filter = Filter::new().kinds([self.settings.kind]).tag(
            'd',
            self.slots
                .iter()
                .map(|slot| self.settings.tag_value(&slot.name)),
        );
        if let Some(pubkey) = self.writer.public_key() {
            filter = filter.authors([pubkey]);
        }

        let mut stream = self
            .reader
            .subscribe(filter, SubscribeOptions::one_shot())
            .await?;

        let mut applied = 0;
        let mut ignored = 0;
        while let Some(item) = stream.next().await {
            let event = match item {
                SubscriptionItem::Event(event) => event,
                SubscriptionItem::EndOfStoredEvents => break,
            };

            match CheckpointRecord::from_event(&event, &self.settings) {
                Some(record) if self.hit(&record.handler, record.timestamp).is_ok() => {
                    applied += 1;
                }
                _ => {
                    ignored += 1;
                    debug!(event_id = %event.id, "Ignoring malformed checkpoint record");
                }
            }
        }

        info!(
            applied = applied,
            ignored = ignored,
            "📥 Loaded prior checkpoints"
        );
        Ok(applied)
    }
}

fn log_flush(report: &FlushReport) {
    if !report.published.is_empty() || !report.failed.is_empty() {
        info!(
            published = report.published.len(),
            failed = report.failed.len(),
            "💾 Checkpoint flush completed"
        );
    }
}

/// Per-handler checkpoint store persisted through the relay network
#[derive(Debug)]
pub struct CheckpointTracker {
    state: Arc<TrackerState>,
    flush_task: Mutex<Option<JoinHandle<()>>>,
}

impl CheckpointTracker {
    /// Create a tracker for a closed set of handler names and start its flush timer.
    ///
    /// Must be called within a tokio runtime. The first flush runs one interval after
    /// construction. Repeated names share one checkpoint.
    pub fn new<I, S>(
        reader: Arc<dyn RelayClient>,
        writer: Arc<dyn RelayClient>,
        handler_names: I,
        settings: CheckpointSettings,
        clock: Arc<dyn Clock>,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut index = HashMap::new();
        let mut slots = Vec::new();
        for name in handler_names {
            let name = name.into();
            if index.contains_key(&name) {
                continue;
            }
            index.insert(name.clone(), slots.len());
            slots.push(CheckpointSlot::new(name));
        }

        info!(
            handlers = slots.len(),
            kind = settings.kind,
            flush_interval_seconds = settings.flush_interval.as_secs(),
            "📌 Checkpoint tracker created"
        );

        let state = Arc::new(TrackerState {
            reader,
            writer,
            index,
            slots: slots.into_boxed_slice(),
            settings,
            clock,
            loaded: OnceCell::new(),
            stats: FlushStats::default(),
        });
        let flush_task = Self::spawn_flush_loop(Arc::clone(&state));

        Self {
            state,
            flush_task: Mutex::new(Some(flush_task)),
        }
    }

    fn spawn_flush_loop(state: Arc<TrackerState>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let period = state.settings.flush_interval.max(Duration::from_millis(1));
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                interval.tick().await;
                let Some(pending) = state.begin_cycle() else {
                    continue;
                };
                if pending.is_empty() {
                    continue;
                }

                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    log_flush(&state.publish_records(pending).await);
                });
            }
        })
    }

    /// Current checkpoint of `name`; 0 when nothing was handled yet
    pub fn get(&self, name: &str) -> Result<u64> {
        Ok(self.state.slot(name)?.timestamp.load(Ordering::Acquire))
    }

    /// Raise the checkpoint of `name` to `timestamp` if it is greater.
    ///
    /// Returns whether the stored value increased (and the handler is now dirty).
    pub fn hit(&self, name: &str, timestamp: u64) -> Result<bool> {
        self.state.hit(name, timestamp)
    }

    /// Whether `name` has a change not yet flushed
    pub fn is_dirty(&self, name: &str) -> Result<bool> {
        Ok(self.state.slot(name)?.dirty.load(Ordering::Acquire))
    }

    pub fn handler_names(&self) -> impl Iterator<Item = &str> {
        self.state.slots.iter().map(|slot| slot.name.as_str())
    }

    pub fn settings(&self) -> &CheckpointSettings {
        &self.state.settings
    }

    /// Load prior checkpoints from the network.
    ///
    /// Replays the stored checkpoint records once and folds every well-formed record of a
    /// known handler into its checkpoint. Completes at end-of-stored-events. Concurrent
    /// callers wait for the same load; once it succeeded every call returns the number of
    /// records it applied. A failed load is retried by the next call.
    pub async fn fetch_last_handled(&self) -> Result<usize> {
        self.state
            .loaded
            .get_or_try_init(|| self.state.load_last_handled())
            .await
            .copied()
    }

    /// Run one flush cycle immediately, independent of the timer
    ///
    /// Unlike the timer, waits for every publish of the cycle to settle.
    pub async fn flush(&self) -> FlushReport {
        let Some(pending) = self.state.begin_cycle() else {
            return FlushReport {
                skipped: true,
                ..Default::default()
            };
        };
        let report = self.state.publish_records(pending).await;
        log_flush(&report);
        report
    }

    pub fn flush_stats(&self) -> FlushStatsSnapshot {
        let stats = &self.state.stats;
        FlushStatsSnapshot {
            cycles: stats.cycles.load(Ordering::Relaxed),
            skipped_cycles: stats.skipped_cycles.load(Ordering::Relaxed),
            records_published: stats.records_published.load(Ordering::Relaxed),
            publish_failures: stats.publish_failures.load(Ordering::Relaxed),
        }
    }

    /// Stop the flush timer. Idempotent; pending dirty checkpoints are not flushed.
    pub fn shutdown(&self) {
        if let Some(task) = self.flush_task.lock().take() {
            task.abort();
            info!("Checkpoint flush timer stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.flush_task
            .lock()
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }
}

impl Drop for CheckpointTracker {
    fn drop(&mut self) {
        if let Some(task) = self.flush_task.get_mut().take() {
            task.abort();
        }
    }
}
