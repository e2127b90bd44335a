use rustc_hash::FxHashMap;

use crate::model::peer::PeerRecord;
use crate::model::RawSnapshot;
use crate::state::differ::diff_scope;

/// Cumulative totals remembered for one address from the previous tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PeerTotals {
    pub outbound: u64,
    pub inbound: u64,
}

/// Previous tick's totals for one scope, keyed by raw address.
pub type ScopeHistory = FxHashMap<String, PeerTotals>;

/// Records produced by one successful tick, per scope, in snapshot order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TickRecords {
    pub local: Vec<PeerRecord>,
    pub remote: Vec<PeerRecord>,
}

/// Owns the counter history needed to turn cumulative totals into deltas.
///
/// History is replaced wholesale on every observed snapshot, so an address
/// that disappears for one tick starts over as a first observation.
#[derive(Default)]
pub struct PeerRegistry {
    local: ScopeHistory,
    remote: ScopeHistory,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Difference `snapshot` against the stored history and remember it.
    pub fn observe(&mut self, snapshot: &RawSnapshot) -> TickRecords {
        let local = diff_scope(&self.local, &snapshot.monitor.local);
        let remote = diff_scope(&self.remote, &snapshot.monitor.remote);
        self.local = history_of(&local);
        self.remote = history_of(&remote);
        TickRecords { local, remote }
    }

    /// Forget everything. Counter continuity is no longer trusted.
    pub fn reset(&mut self) {
        self.local.clear();
        self.remote.clear();
    }
}

fn history_of(records: &[PeerRecord]) -> ScopeHistory {
    records
        .iter()
        .map(|r| {
            (
                r.address.clone(),
                PeerTotals {
                    outbound: r.outbound_total,
                    inbound: r.inbound_total,
                },
            )
        })
        .collect()
}
