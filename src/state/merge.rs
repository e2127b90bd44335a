use std::cmp::Ordering;

use rustc_hash::FxHashMap;

use crate::enrichment::names::NameTable;
use crate::model::peer::{AggregatePeerRow, PeerRecord};

/// Groups records that resolve to the same alias into one display row.
///
/// Remembers each alias row's representative between ticks: when several
/// members tie for the latest `last_seen`, the previous representative keeps
/// the spot if it is among them, otherwise the first tied member in input
/// order takes it.
#[derive(Default)]
pub struct AliasMerger {
    representatives: FxHashMap<String, String>,
}

impl AliasMerger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one scope's records.
    ///
    /// Rows come back sorted by `last_seen` descending. The sort is stable: a
    /// merged row sits where its first member was inserted, so equal
    /// timestamps keep input order.
    pub fn merge(&mut self, records: Vec<PeerRecord>, names: &NameTable) -> Vec<AggregatePeerRow> {
        let mut rows: Vec<AggregatePeerRow> = Vec::with_capacity(records.len());
        let mut groups: FxHashMap<String, usize> = FxHashMap::default();

        for record in records {
            let Some(alias) = names.get(&record.address) else {
                rows.push(AggregatePeerRow::single(record, None));
                continue;
            };
            match groups.get(alias) {
                Some(&idx) => rows[idx].absorb(record),
                None => {
                    groups.insert(alias.to_string(), rows.len());
                    rows.push(AggregatePeerRow::single(record, Some(alias)));
                }
            }
        }

        for row in rows.iter_mut().filter(|r| r.alias.is_some()) {
            row.members.sort_by(|a, b| by_recency(a.last_seen, b.last_seen));
            row.representative = self.pick_representative(row);
        }

        rows.sort_by(|a, b| by_recency(a.last_seen, b.last_seen));

        self.representatives = rows
            .iter()
            .filter(|r| r.alias.is_some())
            .map(|r| (r.display_key.clone(), r.representative.clone()))
            .collect();

        rows
    }

    pub fn reset(&mut self) {
        self.representatives.clear();
    }

    fn pick_representative(&self, row: &AggregatePeerRow) -> String {
        // Members are already sorted, so the tied leaders form a prefix.
        let newest = row.members[0].last_seen;
        let tied = row.members.iter().take_while(|m| m.last_seen == newest);

        if let Some(previous) = self.representatives.get(&row.display_key) {
            if let Some(kept) = tied.clone().find(|m| &m.address == previous) {
                return kept.address.clone();
            }
        }
        row.members[0].address.clone()
    }
}

/// Descending by timestamp; NaN sorts like any other value under total order.
fn by_recency(a: f64, b: f64) -> Ordering {
    b.total_cmp(&a)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NameRecord;

    fn rec(address: &str, out_delta: u64, out_total: u64, last_seen: f64) -> PeerRecord {
        PeerRecord {
            address: address.to_string(),
            outbound_delta: out_delta,
            outbound_total: out_total,
            inbound_delta: out_delta / 2,
            inbound_total: out_total / 2,
            last_seen,
        }
    }

    fn names(pairs: &[(&str, &str)]) -> NameTable {
        let records: Vec<NameRecord> = pairs
            .iter()
            .map(|(ip, name)| NameRecord {
                ip: ip.to_string(),
                name: name.to_string(),
            })
            .collect();
        NameTable::from_records(&records)
    }

    fn keys(rows: &[AggregatePeerRow]) -> Vec<&str> {
        rows.iter().map(|r| r.display_key.as_str()).collect()
    }

    #[test]
    fn unresolved_records_stay_single() {
        let mut merger = AliasMerger::new();
        let rows = merger.merge(
            vec![rec("a", 1, 10, 1.0), rec("b", 2, 20, 2.0)],
            &NameTable::new(),
        );
        assert_eq!(keys(&rows), vec!["b", "a"]);
        assert!(rows.iter().all(|r| r.members.len() == 1));
    }

    #[test]
    fn same_alias_merges_and_sums() {
        let mut merger = AliasMerger::new();
        let table = names(&[("a", "cdn"), ("b", "cdn")]);
        let rows = merger.merge(vec![rec("a", 1, 10, 1.0), rec("b", 2, 20, 2.0)], &table);
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.display_key, "cdn");
        assert_eq!(row.outbound_delta, 3);
        assert_eq!(row.outbound_total, 30);
        assert_eq!(row.inbound_total, 15);
        assert_eq!(row.last_seen, 2.0);
        assert_eq!(row.representative, "b");
        let members: Vec<&str> = row.members.iter().map(|m| m.address.as_str()).collect();
        assert_eq!(members, vec!["b", "a"]);
    }

    #[test]
    fn totals_match_sum_of_members() {
        let mut merger = AliasMerger::new();
        let table = names(&[("a", "x"), ("b", "x"), ("c", "x")]);
        let rows = merger.merge(
            vec![rec("a", 5, 50, 1.0), rec("b", 7, 70, 3.0), rec("c", 9, 90, 2.0)],
            &table,
        );
        let row = &rows[0];
        let out_delta: u64 = row.members.iter().map(|m| m.outbound_delta).sum();
        let in_total: u64 = row.members.iter().map(|m| m.inbound_total).sum();
        assert_eq!(row.outbound_delta, out_delta);
        assert_eq!(row.inbound_total, in_total);
    }

    #[test]
    fn merging_in_stages_matches_merging_at_once() {
        let table = names(&[("a", "x"), ("b", "x"), ("c", "x")]);
        let all = AliasMerger::new().merge(
            vec![rec("a", 5, 50, 1.0), rec("b", 7, 70, 3.0), rec("c", 9, 90, 2.0)],
            &table,
        );

        let mut staged = AliasMerger::new()
            .merge(vec![rec("a", 5, 50, 1.0), rec("b", 7, 70, 3.0)], &table)
            .remove(0);
        staged.absorb(rec("c", 9, 90, 2.0));

        assert_eq!(all[0].total(), staged.total());
        assert_eq!(all[0].delta(), staged.delta());
        assert_eq!(all[0].last_seen, staged.last_seen);
    }

    #[test]
    fn equal_timestamps_keep_insertion_order() {
        let mut merger = AliasMerger::new();
        for order in permutations(&["a", "b", "c", "d"]) {
            let mut input = vec![rec("z", 1, 1, 9.0)];
            input.extend(order.iter().map(|a| rec(a, 1, 1, 5.0)));

            let rows = merger.merge(input.clone(), &NameTable::new());
            let mut expected = vec!["z"];
            expected.extend(order.iter().copied());
            assert_eq!(keys(&rows), expected, "input order {order:?}");

            // Same input again gives exactly the same order.
            let again = merger.merge(input, &NameTable::new());
            assert_eq!(keys(&rows), keys(&again));
        }
    }

    fn permutations<'a>(items: &[&'a str]) -> Vec<Vec<&'a str>> {
        if items.len() <= 1 {
            return vec![items.to_vec()];
        }
        let mut out = Vec::new();
        for i in 0..items.len() {
            let mut rest = items.to_vec();
            let head = rest.remove(i);
            for mut tail in permutations(&rest) {
                tail.insert(0, head);
                out.push(tail);
            }
        }
        out
    }

    #[test]
    fn merged_row_takes_position_of_first_member() {
        let mut merger = AliasMerger::new();
        let table = names(&[("b", "grp"), ("d", "grp")]);
        let rows = merger.merge(
            vec![
                rec("a", 1, 1, 5.0),
                rec("b", 1, 1, 5.0),
                rec("c", 1, 1, 5.0),
                rec("d", 1, 1, 5.0),
            ],
            &table,
        );
        assert_eq!(keys(&rows), vec!["a", "grp", "c"]);
    }

    #[test]
    fn tie_without_history_picks_first_inserted() {
        let mut merger = AliasMerger::new();
        let table = names(&[("a", "x"), ("b", "x")]);
        let rows = merger.merge(vec![rec("a", 1, 1, 4.0), rec("b", 1, 1, 4.0)], &table);
        assert_eq!(rows[0].representative, "a");
    }

    #[test]
    fn tie_keeps_previous_representative() {
        let mut merger = AliasMerger::new();
        let table = names(&[("a", "x"), ("b", "x")]);

        // Tick 1: b is strictly newest.
        let rows = merger.merge(vec![rec("a", 1, 1, 1.0), rec("b", 1, 1, 2.0)], &table);
        assert_eq!(rows[0].representative, "b");

        // Tick 2: both tied; b stays even though a comes first.
        let rows = merger.merge(vec![rec("a", 1, 1, 3.0), rec("b", 1, 1, 3.0)], &table);
        assert_eq!(rows[0].representative, "b");

        // Tick 3: a strictly newest; it takes over.
        let rows = merger.merge(vec![rec("a", 1, 1, 5.0), rec("b", 1, 1, 3.0)], &table);
        assert_eq!(rows[0].representative, "a");
    }

    #[test]
    fn reset_forgets_representatives() {
        let mut merger = AliasMerger::new();
        let table = names(&[("a", "x"), ("b", "x")]);
        merger.merge(vec![rec("a", 1, 1, 1.0), rec("b", 1, 1, 2.0)], &table);
        merger.reset();
        let rows = merger.merge(vec![rec("a", 1, 1, 3.0), rec("b", 1, 1, 3.0)], &table);
        assert_eq!(rows[0].representative, "a");
    }

    #[test]
    fn partial_resolution_mixes_rows() {
        let mut merger = AliasMerger::new();
        let table = names(&[("a", "web"), ("c", "web")]);
        let rows = merger.merge(
            vec![rec("a", 1, 10, 1.0), rec("b", 1, 10, 6.0), rec("c", 1, 10, 3.0)],
            &table,
        );
        assert_eq!(keys(&rows), vec!["b", "web"]);
        assert_eq!(rows[1].representative, "c");
        assert_eq!(rows[1].outbound_total, 20);
    }
}
