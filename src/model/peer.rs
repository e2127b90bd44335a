use serde::Serialize;

/// Per-tick traffic for one raw address within one scope.
///
/// Deltas are never negative: a counter that went backwards (monitor restart)
/// reads as zero traffic for that tick.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PeerRecord {
    pub address: String,
    pub outbound_delta: u64,
    pub outbound_total: u64,
    pub inbound_delta: u64,
    pub inbound_total: u64,
    pub last_seen: f64,
}

impl PeerRecord {
    /// A record seen for the first time: totals as reported, no delta yet.
    pub fn first_seen(address: &str, outbound_total: u64, inbound_total: u64, last_seen: f64) -> Self {
        Self {
            address: address.to_string(),
            outbound_delta: 0,
            outbound_total,
            inbound_delta: 0,
            inbound_total,
            last_seen,
        }
    }
}

/// One display row: either a single raw address, or every address that
/// resolved to the same alias.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AggregatePeerRow {
    /// Alias for merged rows, the raw address otherwise.
    pub display_key: String,
    pub alias: Option<String>,
    /// Member with the most recent `last_seen`.
    pub representative: String,
    pub outbound_delta: u64,
    pub outbound_total: u64,
    pub inbound_delta: u64,
    pub inbound_total: u64,
    pub last_seen: f64,
    /// Ordered by descending `last_seen`.
    pub members: Vec<PeerRecord>,
}

impl AggregatePeerRow {
    pub fn single(record: PeerRecord, alias: Option<&str>) -> Self {
        Self {
            display_key: alias.map_or_else(|| record.address.clone(), str::to_string),
            alias: alias.map(str::to_string),
            representative: record.address.clone(),
            outbound_delta: record.outbound_delta,
            outbound_total: record.outbound_total,
            inbound_delta: record.inbound_delta,
            inbound_total: record.inbound_total,
            last_seen: record.last_seen,
            members: vec![record],
        }
    }

    /// Fold another member's traffic into this row.
    ///
    /// Member order and the representative are settled afterwards by the
    /// merger, once every member is known.
    pub fn absorb(&mut self, record: PeerRecord) {
        self.outbound_delta = self.outbound_delta.saturating_add(record.outbound_delta);
        self.outbound_total = self.outbound_total.saturating_add(record.outbound_total);
        self.inbound_delta = self.inbound_delta.saturating_add(record.inbound_delta);
        self.inbound_total = self.inbound_total.saturating_add(record.inbound_total);
        self.last_seen = self.last_seen.max(record.last_seen);
        self.members.push(record);
    }

    pub fn is_merged(&self) -> bool {
        self.members.len() > 1
    }

    pub fn delta(&self) -> (u64, u64) {
        (self.outbound_delta, self.inbound_delta)
    }

    pub fn total(&self) -> (u64, u64) {
        (self.outbound_total, self.inbound_total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(address: &str, out: u64, inb: u64, last_seen: f64) -> PeerRecord {
        PeerRecord {
            address: address.to_string(),
            outbound_delta: out,
            outbound_total: out * 10,
            inbound_delta: inb,
            inbound_total: inb * 10,
            last_seen,
        }
    }

    #[test]
    fn single_row_keyed_by_address() {
        let row = AggregatePeerRow::single(record("10.0.0.1", 1, 2, 3.0), None);
        assert_eq!(row.display_key, "10.0.0.1");
        assert_eq!(row.representative, "10.0.0.1");
        assert!(row.alias.is_none());
        assert!(!row.is_merged());
    }

    #[test]
    fn single_row_keyed_by_alias() {
        let row = AggregatePeerRow::single(record("10.0.0.1", 1, 2, 3.0), Some("nas"));
        assert_eq!(row.display_key, "nas");
        assert_eq!(row.alias.as_deref(), Some("nas"));
        assert_eq!(row.representative, "10.0.0.1");
    }

    #[test]
    fn absorb_sums_fields() {
        let mut row = AggregatePeerRow::single(record("a", 1, 2, 3.0), Some("x"));
        row.absorb(record("b", 4, 5, 9.0));
        assert_eq!(row.delta(), (5, 7));
        assert_eq!(row.total(), (50, 70));
        assert_eq!(row.last_seen, 9.0);
        assert_eq!(row.members.len(), 2);
        assert!(row.is_merged());
    }

    #[test]
    fn first_seen_has_zero_delta() {
        let r = PeerRecord::first_seen("a", 100, 200, 4.0);
        assert_eq!(r.outbound_delta, 0);
        assert_eq!(r.inbound_delta, 0);
        assert_eq!(r.outbound_total, 100);
        assert_eq!(r.inbound_total, 200);
    }
}
