use crate::model::peer::PeerRecord;
use crate::model::{Counter, ScopeCounters};
use crate::state::registry::{PeerTotals, ScopeHistory};

/// Turn one scope's cumulative counters into per-address records.
///
/// Addresses are visited in snapshot order: every outbound key first, then
/// inbound keys that had no outbound entry. Deltas are taken against
/// `previous` and clamped at zero.
pub fn diff_scope(previous: &ScopeHistory, current: &ScopeCounters) -> Vec<PeerRecord> {
    let inbound_only = current
        .inbound
        .keys()
        .filter(|addr| !current.out.contains_key(*addr));

    current
        .out
        .keys()
        .chain(inbound_only)
        .map(|addr| {
            diff_peer(
                previous.get(addr),
                addr,
                current.out.get(addr),
                current.inbound.get(addr),
            )
        })
        .collect()
}

/// Build the record for a single address.
///
/// A direction missing from the current snapshot counts as no traffic: total
/// and delta are both zero.
pub fn diff_peer(
    previous: Option<&PeerTotals>,
    address: &str,
    outbound: Option<&Counter>,
    inbound: Option<&Counter>,
) -> PeerRecord {
    let outbound_total = outbound.map_or(0, |c| c.size);
    let inbound_total = inbound.map_or(0, |c| c.size);
    let last_seen = outbound
        .map_or(0.0, |c| c.last_seen)
        .max(inbound.map_or(0.0, |c| c.last_seen));

    let Some(prev) = previous else {
        return PeerRecord::first_seen(address, outbound_total, inbound_total, last_seen);
    };

    PeerRecord {
        address: address.to_string(),
        outbound_delta: outbound.map_or(0, |c| c.size.saturating_sub(prev.outbound)),
        outbound_total,
        inbound_delta: inbound.map_or(0, |c| c.size.saturating_sub(prev.inbound)),
        inbound_total,
        last_seen,
    }
}
