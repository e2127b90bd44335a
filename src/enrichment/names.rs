use std::collections::HashMap;

use crate::model::NameRecord;

/// Address -> alias mapping published by the monitor's `/dns` endpoint.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NameTable {
    names: HashMap<String, String>,
}

impl NameTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from `/dns` records. Later duplicates win; blank names
    /// are skipped since they cannot label a row.
    pub fn from_records(records: &[NameRecord]) -> Self {
        records
            .iter()
            .map(|r| (r.ip.as_str(), r.name.as_str()))
            .collect()
    }

    pub fn get(&self, address: &str) -> Option<&str> {
        self.names.get(address).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl<'a> FromIterator<(&'a str, &'a str)> for NameTable {
    fn from_iter<I: IntoIterator<Item = (&'a str, &'a str)>>(iter: I) -> Self {
        let names = iter
            .into_iter()
            .filter(|(_, name)| !name.trim().is_empty())
            .map(|(ip, name)| (ip.to_string(), name.to_string()))
            .collect();
        Self { names }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(ip: &str, name: &str) -> NameRecord {
        NameRecord {
            ip: ip.to_string(),
            name: name.to_string(),
        }
    }

    #[test]
    fn lookup_by_address() {
        let table = NameTable::from_records(&[rec("1.1.1.1", "one.one"), rec("8.8.8.8", "dns.google")]);
        assert_eq!(table.get("8.8.8.8"), Some("dns.google"));
        assert_eq!(table.get("9.9.9.9"), None);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn later_duplicate_wins() {
        let table = NameTable::from_records(&[rec("1.1.1.1", "old"), rec("1.1.1.1", "new")]);
        assert_eq!(table.get("1.1.1.1"), Some("new"));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn blank_names_skipped() {
        let table = NameTable::from_records(&[rec("1.1.1.1", ""), rec("2.2.2.2", "  ")]);
        assert!(table.is_empty());
    }
}
