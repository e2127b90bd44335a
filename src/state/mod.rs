pub mod differ;
pub mod merge;
pub mod registry;

use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::enrichment::names::NameTable;
use crate::error::IkamonError;
use crate::model::{ConnectionStatus, DEFAULT_NAME, DashboardView, NameRecord, RawSnapshot};

use self::merge::AliasMerger;
use self::registry::{PeerRegistry, TickRecords};

/// Latest published view, swapped in whole by the poller.
pub type SharedView = Arc<ArcSwap<DashboardView>>;

/// Create a new shared view for `target`, before any poll has completed.
pub fn new_shared_view(target: &str) -> SharedView {
    Arc::new(ArcSwap::from_pointee(DashboardView::empty(target)))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Error,
}

/// One-off message emitted when the connection status changes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusNotice {
    pub level: NoticeLevel,
    pub message: String,
}

impl StatusNotice {
    fn success(message: String) -> Self {
        Self {
            level: NoticeLevel::Success,
            message,
        }
    }

    fn error(message: String) -> Self {
        Self {
            level: NoticeLevel::Error,
            message,
        }
    }
}

impl std::fmt::Display for StatusNotice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

#[derive(Clone, Copy, Debug, Default)]
struct OverallTotals {
    outbound: u64,
    inbound: u64,
}

#[derive(Clone, Debug)]
struct Header {
    name: String,
    version: String,
    time: f64,
}

impl Default for Header {
    fn default() -> Self {
        Self {
            name: DEFAULT_NAME.to_string(),
            version: String::new(),
            time: 0.0,
        }
    }
}

/// The aggregation engine for one monitored target.
///
/// Feed it poll results in completion order; every applied result produces a
/// fresh immutable [`DashboardView`]. The engine never performs I/O.
pub struct Dashboard {
    target: String,
    status: ConnectionStatus,
    registry: PeerRegistry,
    local_merger: AliasMerger,
    remote_merger: AliasMerger,
    names: NameTable,
    totals: OverallTotals,
    deltas: OverallTotals,
    header: Header,
    records: TickRecords,
    view: Arc<DashboardView>,
    sequence: u64,
}

impl Dashboard {
    pub fn new(target: &str) -> Self {
        Self {
            target: target.to_string(),
            status: ConnectionStatus::Connecting,
            registry: PeerRegistry::new(),
            local_merger: AliasMerger::new(),
            remote_merger: AliasMerger::new(),
            names: NameTable::new(),
            totals: OverallTotals::default(),
            deltas: OverallTotals::default(),
            header: Header::default(),
            records: TickRecords::default(),
            view: Arc::new(DashboardView::empty(target)),
            sequence: 0,
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn names(&self) -> &NameTable {
        &self.names
    }

    /// The most recently built view.
    pub fn view(&self) -> Arc<DashboardView> {
        Arc::clone(&self.view)
    }

    /// Run one full tick: apply the name result (if one arrived) and then the
    /// snapshot result.
    pub fn tick(
        &mut self,
        snapshot: Result<RawSnapshot, IkamonError>,
        names: Option<Result<Vec<NameRecord>, IkamonError>>,
    ) -> (Arc<DashboardView>, Option<StatusNotice>) {
        if let Some(names) = names {
            self.apply_names(names);
        }
        let notice = self.apply_snapshot(snapshot);
        (self.view(), notice)
    }

    /// Apply a snapshot fetch result.
    ///
    /// A failed fetch clears all peer history and zeroes the counters, so the
    /// next successful snapshot starts without deltas. A notice is returned
    /// only when the connection status changes.
    pub fn apply_snapshot(&mut self, result: Result<RawSnapshot, IkamonError>) -> Option<StatusNotice> {
        let previous = self.status;
        let notice = match result {
            Ok(snapshot) => {
                self.observe(&snapshot);
                self.status = ConnectionStatus::Active;
                (previous != ConnectionStatus::Active).then(|| {
                    log::info!("connected to {} ({})", self.header.name, self.target);
                    StatusNotice::success(format!("Connected to {} ({}).", self.header.name, self.target))
                })
            }
            Err(e) => {
                log::debug!("snapshot from {} failed: {e}", self.target);
                self.clear_traffic();
                self.status = ConnectionStatus::Inactive;
                match previous {
                    ConnectionStatus::Active => {
                        log::info!("disconnected from {}", self.target);
                        Some(StatusNotice::error(format!("Disconnected from IkaGo ({}).", self.target)))
                    }
                    ConnectionStatus::Connecting => {
                        log::info!("cannot connect to {}", self.target);
                        Some(StatusNotice::error(format!("Cannot connect to IkaGo ({}).", self.target)))
                    }
                    ConnectionStatus::Inactive => None,
                }
            }
        };
        self.publish();
        notice
    }

    /// Apply a name-resolution fetch result.
    ///
    /// On success the stored records are merged again under the new table.
    /// On failure the previous table stays in effect and nothing is published.
    pub fn apply_names(&mut self, result: Result<Vec<NameRecord>, IkamonError>) {
        match result {
            Ok(records) => {
                self.names = NameTable::from_records(&records);
                log::debug!("name table for {}: {} entries", self.target, self.names.len());
                self.publish();
            }
            Err(e) => log::debug!("keeping previous names for {}: {e}", self.target),
        }
    }

    /// Switch to another target. History, aliases and status start over.
    pub fn set_target(&mut self, target: &str) {
        log::info!("target changed: {} -> {target}", self.target);
        self.target = target.to_string();
        self.names = NameTable::new();
        self.clear_traffic();
        self.status = ConnectionStatus::Connecting;
        self.publish();
    }

    fn observe(&mut self, snapshot: &RawSnapshot) {
        self.records = self.registry.observe(snapshot);

        let local = &snapshot.monitor.local;
        let current = OverallTotals {
            outbound: local.outbound_total(),
            inbound: local.inbound_total(),
        };
        self.deltas = OverallTotals {
            outbound: overall_delta(self.totals.outbound, current.outbound),
            inbound: overall_delta(self.totals.inbound, current.inbound),
        };
        self.totals = current;

        self.header = Header {
            name: snapshot
                .name
                .clone()
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| DEFAULT_NAME.to_string()),
            version: snapshot.version.clone().unwrap_or_default(),
            time: snapshot.time.filter(|t| t.is_finite()).unwrap_or(0.0),
        };
    }

    fn clear_traffic(&mut self) {
        self.registry.reset();
        self.local_merger.reset();
        self.remote_merger.reset();
        self.records = TickRecords::default();
        self.totals = OverallTotals::default();
        self.deltas = OverallTotals::default();
        self.header = Header::default();
    }

    fn publish(&mut self) {
        self.sequence += 1;
        let local = self.local_merger.merge(self.records.local.clone(), &self.names);
        let remote = self.remote_merger.merge(self.records.remote.clone(), &self.names);
        self.view = Arc::new(DashboardView {
            sequence: self.sequence,
            name: self.header.name.clone(),
            version: self.header.version.clone(),
            target: self.target.clone(),
            status: self.status,
            time: self.header.time,
            outbound_delta: self.deltas.outbound,
            outbound_total: self.totals.outbound,
            inbound_delta: self.deltas.inbound,
            inbound_total: self.totals.inbound,
            local,
            remote,
        });
    }
}

/// Growth of an overall counter; zero when there is no earlier total to
/// compare against or the counter went backwards.
fn overall_delta(previous: u64, current: u64) -> u64 {
    if previous == 0 {
        0
    } else {
        current.saturating_sub(previous)
    }
}
