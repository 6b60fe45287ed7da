//! Run a scan on a worker thread while the caller stays responsive.
//!
//! The worker owns all in-progress data. Callers see a [`ScanStatus`]
//! snapshot guarded by one mutex, and receive the finished [`ScanReport`]
//! exactly once over a channel. Dropping the [`ScanHandle`] abandons the
//! scan; the worker runs to completion and its result is discarded.

use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Instant;
use anyhow::{anyhow, Context, Result};

use crate::dedup::ScanReport;
use crate::grouping::GroupingEngine;
use crate::scanner::{ScanConfig, Scanner};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ScanPhase {
    #[default]
    Starting,
    /// Walking directories
    Scanning,
    /// Fingerprinting the files found
    Hashing,
    Grouping,
    Finished,
    Failed,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanStatus {
    pub phase: ScanPhase,
    /// Files fingerprinted so far; final once grouping starts
    pub records: usize,
    /// Files queued for fingerprinting, known once the walk is done
    pub total: usize,
    pub groups: usize,
}

pub struct ScanHandle {
    status: Arc<Mutex<ScanStatus>>,
    receiver: Receiver<Result<ScanReport>>,
}

impl ScanHandle {
    pub fn status(&self) -> ScanStatus {
        lock(&self.status).clone()
    }

    /// The finished report if the worker is done, without blocking
    pub fn try_result(&self) -> Option<Result<ScanReport>> {
        match self.receiver.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(worker_lost())),
        }
    }

    /// Block until the worker publishes its report
    pub fn wait(self) -> Result<ScanReport> {
        self.receiver.recv().unwrap_or_else(|_| Err(worker_lost()))
    }
}

fn worker_lost() -> anyhow::Error {
    anyhow!("scan worker stopped without producing a result")
}

/// A poisoned status only means a worker panicked mid-update; the data is
/// plain counters and still safe to read.
fn lock(status: &Mutex<ScanStatus>) -> MutexGuard<'_, ScanStatus> {
    status.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn update(status: &Mutex<ScanStatus>, apply: impl FnOnce(&mut ScanStatus)) {
    apply(&mut lock(status));
}

/// Start scanning and grouping `config` on a background thread
pub fn spawn_scan(config: ScanConfig) -> Result<ScanHandle> {
    config.validate()?;

    let status = Arc::new(Mutex::new(ScanStatus::default()));
    let (sender, receiver) = mpsc::channel();
    let worker_status = Arc::clone(&status);

    thread::Builder::new()
        .name("dedup-scan".into())
        .spawn(move || {
            let result = run(config, &worker_status);
            if result.is_err() {
                update(&worker_status, |s| s.phase = ScanPhase::Failed);
            }
            if sender.send(result).is_err() {
                log::debug!("Scan result discarded; the handle was dropped");
            }
        })
        .context("Failed to start scan worker")?;

    Ok(ScanHandle { status, receiver })
}

fn run(config: ScanConfig, status: &Mutex<ScanStatus>) -> Result<ScanReport> {
    let started = Instant::now();
    update(status, |s| s.phase = ScanPhase::Scanning);

    let output = Scanner::with_config(config).scan_with_progress(|hashed, total| {
        update(status, |s| {
            s.phase = ScanPhase::Hashing;
            s.records = s.records.max(hashed);
            s.total = total;
        })
    })?;
    update(status, |s| {
        s.phase = ScanPhase::Grouping;
        s.records = output.records.len();
    });

    let result_set = GroupingEngine::new().group(&output.records);
    update(status, |s| {
        s.phase = ScanPhase::Finished;
        s.groups = result_set.groups.len();
    });

    Ok(ScanReport {
        records: output.records,
        result_set,
        skipped_directories: output.skipped_directories,
        truncated: output.truncated,
        elapsed: started.elapsed(),
    })
}
