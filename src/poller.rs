//! Poll scheduling.
//!
//! A scheduler thread owns the [`Dashboard`] and ticks every interval. Each
//! tick hands a [`FetchJob`] to two long-lived fetch workers (snapshot and
//! names) through capacity-1 queues; a worker still busy with a slow request
//! skips the tick. Completions come back over one channel and are applied in
//! arrival order, unless they belong to an older [`Generation`].

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, bounded, select, unbounded};

use crate::error::IkamonError;
use crate::model::{NameRecord, RawSnapshot};
use crate::source::{NameProvider, SnapshotProvider};
use crate::state::{self, Dashboard, SharedView, StatusNotice};

/// Cancellation token shared by the scheduler and its workers.
///
/// Bumped on every target change. Work tagged with an older value is stale:
/// workers skip it and the scheduler drops its results.
#[derive(Clone, Debug, Default)]
pub struct Generation(Arc<AtomicU64>);

impl Generation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }

    /// Invalidate all outstanding work and return the new generation.
    pub fn advance(&self) -> u64 {
        self.0.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.current() == generation
    }
}

#[derive(Clone, Debug)]
pub struct FetchJob {
    pub generation: u64,
    pub target: String,
}

#[derive(Debug)]
pub enum Completion {
    Snapshot {
        generation: u64,
        result: Result<RawSnapshot, IkamonError>,
    },
    Names {
        generation: u64,
        result: Result<Vec<NameRecord>, IkamonError>,
    },
}

impl Completion {
    fn generation(&self) -> u64 {
        match self {
            Self::Snapshot { generation, .. } | Self::Names { generation, .. } => *generation,
        }
    }
}

enum Control {
    SetTarget(String),
    Shutdown,
}

/// Handle to the running scheduler.
///
/// Dropping the poller stops ticking. Requests already in flight finish on
/// their worker and their results are discarded.
pub struct Poller {
    view: SharedView,
    control_tx: Sender<Control>,
    notice_rx: Receiver<StatusNotice>,
    generation: Generation,
    scheduler: Option<thread::JoinHandle<()>>,
}

impl Poller {
    /// Start polling `target` every `interval`. The first poll is issued
    /// immediately.
    pub fn spawn(
        target: &str,
        interval: Duration,
        snapshots: Arc<dyn SnapshotProvider>,
        names: Arc<dyn NameProvider>,
    ) -> Result<Self, IkamonError> {
        let view = state::new_shared_view(target);
        let generation = Generation::new();
        let (control_tx, control_rx) = unbounded::<Control>();
        let (notice_tx, notice_rx) = unbounded::<StatusNotice>();
        let (done_tx, done_rx) = unbounded::<Completion>();

        let (snapshot_jobs, snapshot_rx) = bounded::<FetchJob>(1);
        let (names_jobs, names_rx) = bounded::<FetchJob>(1);

        let workers = vec![
            spawn_worker("ikamon-snapshot", snapshot_rx, done_tx.clone(), generation.clone(), move |job| {
                Completion::Snapshot {
                    generation: job.generation,
                    result: snapshots.fetch_snapshot(&job.target),
                }
            })?,
            spawn_worker("ikamon-names", names_rx, done_tx, generation.clone(), move |job| {
                Completion::Names {
                    generation: job.generation,
                    result: names.fetch_names(&job.target),
                }
            })?,
        ];

        let scheduler = Scheduler {
            dashboard: Dashboard::new(target),
            view: Arc::clone(&view),
            generation: generation.clone(),
            snapshot_jobs,
            names_jobs,
            notice_tx,
            _workers: workers,
        };
        let handle = thread::Builder::new()
            .name("ikamon-poller".into())
            .spawn(move || scheduler.run(interval, &control_rx, &done_rx))
            .map_err(|e| IkamonError::Fatal(format!("spawn poller thread: {e}")))?;

        Ok(Self {
            view,
            control_tx,
            notice_rx,
            generation,
            scheduler: Some(handle),
        })
    }

    /// The shared view the scheduler publishes into.
    pub fn view(&self) -> SharedView {
        Arc::clone(&self.view)
    }

    /// Switch to another target. Results still pending for the old target
    /// are discarded.
    pub fn set_target(&self, target: &str) {
        if self.control_tx.send(Control::SetTarget(target.to_string())).is_err() {
            log::warn!("poller stopped, target change to {target} ignored");
        }
    }

    /// Receiver for connection status notices, for use in `select!`.
    pub fn notices(&self) -> &Receiver<StatusNotice> {
        &self.notice_rx
    }

    pub fn try_notice(&self) -> Option<StatusNotice> {
        self.notice_rx.try_recv().ok()
    }

    /// Stop the scheduler and wait for it to exit.
    pub fn shutdown(&mut self) {
        let _ = self.control_tx.send(Control::Shutdown);
        if let Some(handle) = self.scheduler.take() {
            if handle.join().is_err() {
                log::warn!("poller thread panicked");
            }
        }
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct Scheduler {
    dashboard: Dashboard,
    view: SharedView,
    generation: Generation,
    snapshot_jobs: Sender<FetchJob>,
    names_jobs: Sender<FetchJob>,
    notice_tx: Sender<StatusNotice>,
    // Detached on exit; each worker stops once its job queue closes.
    _workers: Vec<thread::JoinHandle<()>>,
}

impl Scheduler {
    fn run(mut self, interval: Duration, control_rx: &Receiver<Control>, done_rx: &Receiver<Completion>) {
        let ticker = crossbeam_channel::tick(interval);
        self.submit();

        loop {
            select! {
                recv(ticker) -> _ => self.submit(),
                recv(control_rx) -> msg => match msg {
                    Ok(Control::SetTarget(target)) => {
                        let generation = self.generation.advance();
                        log::debug!("generation {generation} for {target}");
                        self.dashboard.set_target(&target);
                        self.view.store(self.dashboard.view());
                        self.submit();
                    }
                    Ok(Control::Shutdown) | Err(_) => return,
                },
                recv(done_rx) -> msg => match msg {
                    Ok(completion) => self.apply(completion),
                    Err(_) => return,
                },
            }
        }
    }

    fn submit(&self) {
        let job = FetchJob {
            generation: self.generation.current(),
            target: self.dashboard.target().to_string(),
        };
        if self.snapshot_jobs.try_send(job.clone()).is_err() {
            log::debug!("snapshot fetch still running, skipping tick");
        }
        if self.names_jobs.try_send(job).is_err() {
            log::debug!("names fetch still running, skipping tick");
        }
    }

    fn apply(&mut self, completion: Completion) {
        if !self.generation.is_current(completion.generation()) {
            log::debug!("discarding stale completion from generation {}", completion.generation());
            return;
        }
        match completion {
            Completion::Snapshot { result, .. } => {
                if let Some(notice) = self.dashboard.apply_snapshot(result) {
                    let _ = self.notice_tx.send(notice);
                }
            }
            Completion::Names { result, .. } => self.dashboard.apply_names(result),
        }
        self.view.store(self.dashboard.view());
    }
}

fn spawn_worker<F>(
    name: &str,
    jobs: Receiver<FetchJob>,
    done: Sender<Completion>,
    generation: Generation,
    fetch: F,
) -> Result<thread::JoinHandle<()>, IkamonError>
where
    F: Fn(&FetchJob) -> Completion + Send + 'static,
{
    thread::Builder::new()
        .name(name.to_string())
        .spawn(move || {
            while let Ok(job) = jobs.recv() {
                if !generation.is_current(job.generation) {
                    continue;
                }
                if done.send(fetch(&job)).is_err() {
                    return;
                }
            }
        })
        .map_err(|e| IkamonError::Fatal(format!("spawn {name} worker: {e}")))
}
