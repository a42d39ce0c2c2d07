//! Monitor daemon and runtime loop.

use super::events::{filter_ignored, MonitorConfig, RenamePairer};
use crate::codec::TagCodec;
use crate::error::ApiError;
use crate::indexer::{ChangeEvent, CommitDebouncer, Indexer, PathAction};
use notify::{Event, RecursiveMode, Watcher};
use std::sync::mpsc;
use std::thread;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Messages delivered to the monitor loop.
pub enum MonitorMessage {
    Fs(notify::Result<Event>),
    Stop,
}

/// Cloneable handle that stops a running monitor.
#[derive(Clone)]
pub struct MonitorHandle {
    tx: mpsc::Sender<MonitorMessage>,
}

impl MonitorHandle {
    /// Ask the monitor loop to finish. It commits pending changes first.
    pub fn stop(&self) {
        if self.tx.send(MonitorMessage::Stop).is_err() {
            debug!("Monitor already stopped");
        }
    }

    /// Stop the monitor on Ctrl-C, from a dedicated signal thread.
    pub fn stop_on_ctrl_c(self) -> std::io::Result<thread::JoinHandle<()>> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        thread::Builder::new()
            .name("taxis-signal".to_string())
            .spawn(move || {
                match runtime.block_on(tokio::signal::ctrl_c()) {
                    Ok(()) => info!("Interrupt received, stopping monitor"),
                    Err(e) => error!(error = %e, "Failed to listen for interrupt"),
                }
                self.stop();
            })
    }
}

/// Totals reported when the monitor exits.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MonitorSummary {
    pub events: usize,
    pub failures: usize,
    pub commits: usize,
}

/// Watch mode daemon: the single writer of an index.
pub struct MonitorDaemon<C: TagCodec> {
    indexer: Indexer<C>,
    config: MonitorConfig,
    debouncer: CommitDebouncer,
    pairer: RenamePairer,
    tx: mpsc::Sender<MonitorMessage>,
    rx: mpsc::Receiver<MonitorMessage>,
    summary: MonitorSummary,
}

impl<C: TagCodec> MonitorDaemon<C> {
    pub fn new(indexer: Indexer<C>, config: MonitorConfig) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            indexer: indexer.with_ignore(config.ignore.clone()),
            debouncer: CommitDebouncer::new(config.commit_wait),
            pairer: RenamePairer::new(config.rename_window),
            config,
            tx,
            rx,
            summary: MonitorSummary::default(),
        }
    }

    pub fn handle(&self) -> MonitorHandle {
        MonitorHandle {
            tx: self.tx.clone(),
        }
    }

    pub fn indexer(&self) -> &Indexer<C> {
        &self.indexer
    }

    /// Optionally repair and rescan, then watch until stopped.
    pub fn run(mut self) -> Result<MonitorSummary, ApiError> {
        if self.config.scan {
            self.initial_scan()?;
        }

        let tx = self.tx.clone();
        let mut watcher = notify::recommended_watcher(move |res| {
            if tx.send(MonitorMessage::Fs(res)).is_err() {
                error!("Error sending watch event: monitor loop is gone");
            }
        })?;
        for directory in &self.config.directories {
            watcher.watch(directory, RecursiveMode::Recursive)?;
            info!(directory = %directory.display(), "Starting watch");
        }

        self.indexer.store().begin_batch()?;
        loop {
            let timeout = self.pairer.next_deadline().map_or(self.config.tick, |deadline| {
                deadline
                    .saturating_duration_since(Instant::now())
                    .min(self.config.tick)
            });
            match self.rx.recv_timeout(timeout) {
                Ok(MonitorMessage::Fs(Ok(event))) => self.handle_event(event, Instant::now())?,
                Ok(MonitorMessage::Fs(Err(e))) => warn!(error = %e, "Watch error"),
                Ok(MonitorMessage::Stop) => break,
                Err(mpsc::RecvTimeoutError::Timeout) => self.tick(Instant::now())?,
                Err(mpsc::RecvTimeoutError::Disconnected) => {
                    error!("Watcher channel disconnected");
                    break;
                }
            }
        }
        drop(watcher);

        self.shutdown()
    }

    fn initial_scan(&mut self) -> Result<(), ApiError> {
        info!("Looking for deleted files");
        let repair = self.indexer.repair()?;
        info!(
            checked = repair.checked,
            removed = repair.removed,
            failed = repair.failed,
            "Repair finished"
        );
        for directory in self.config.directories.clone() {
            info!(directory = %directory.display(), "Scanning");
            let report = self.indexer.scan_directory(&directory);
            info!(
                directory = %directory.display(),
                scanned = report.scanned,
                created = report.created,
                updated = report.updated,
                failed = report.failed,
                "Scan finished"
            );
        }
        Ok(())
    }

    /// Apply one notify event and commit if the debounce window has passed.
    ///
    /// Per-path failures are logged and counted; only storage failures while
    /// committing abort the loop.
    pub fn handle_event(&mut self, event: Event, now: Instant) -> Result<(), ApiError> {
        let mut changes = self.pairer.expire(now);
        changes.extend(self.pairer.convert(event, now));
        self.apply_changes(changes, now)
    }

    /// Periodic wake-up without events.
    pub fn tick(&mut self, now: Instant) -> Result<(), ApiError> {
        let expired = self.pairer.expire(now);
        self.apply_changes(expired, now)?;
        if self.debouncer.on_tick(now) {
            self.commit()?;
        }
        Ok(())
    }

    fn apply_changes(&mut self, changes: Vec<ChangeEvent>, now: Instant) -> Result<(), ApiError> {
        let changes: Vec<ChangeEvent> = changes
            .into_iter()
            .filter_map(|change| filter_ignored(change, &self.config.ignore))
            .collect();
        if changes.is_empty() {
            return Ok(());
        }
        for change in &changes {
            self.summary.events += 1;
            match self.indexer.apply_change(change) {
                Ok(PathAction::Skipped) => debug!(?change, "Not a file; skipping"),
                Ok(action) => debug!(?change, ?action, "Applied change"),
                Err(e) => {
                    self.summary.failures += 1;
                    warn!(?change, error = %e, "Failed to apply change");
                }
            }
        }
        if self.debouncer.on_event(now) {
            self.commit()?;
        }
        Ok(())
    }

    fn commit(&mut self) -> Result<(), ApiError> {
        let store = self.indexer.store();
        if store.commit_batch()? {
            self.summary.commits += 1;
            debug!("Committed");
        }
        store.begin_batch()?;
        Ok(())
    }

    fn shutdown(mut self) -> Result<MonitorSummary, ApiError> {
        let held = self.pairer.flush();
        self.apply_changes(held, Instant::now())?;
        self.debouncer.flush();
        if self.indexer.store().commit_batch()? {
            self.summary.commits += 1;
        }
        info!(
            events = self.summary.events,
            failures = self.summary.failures,
            commits = self.summary.commits,
            "Monitor stopped"
        );
        Ok(self.summary)
    }
}
