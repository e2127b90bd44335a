pub mod peer;

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use self::peer::AggregatePeerRow;

/// Name shown in the header when the monitored process has not identified itself.
pub const DEFAULT_NAME: &str = "IkaGo";

/// Cumulative counter reported for one raw address in one direction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct Counter {
    pub size: u64,
    #[serde(rename = "lastSeen")]
    pub last_seen: f64,
}

impl Counter {
    /// Reads a counter out of an arbitrary JSON value.
    ///
    /// Missing or mistyped fields read as zero so that one odd entry never
    /// invalidates the rest of the snapshot.
    fn from_value(value: &Value) -> Self {
        let size = value
            .get("size")
            .and_then(|s| {
                s.as_u64().or_else(|| {
                    s.as_f64()
                        .filter(|f| f.is_finite() && *f >= 0.0)
                        .map(|f| f as u64)
                })
            })
            .unwrap_or(0);
        let last_seen = value
            .get("lastSeen")
            .and_then(Value::as_f64)
            .filter(|f| f.is_finite())
            .unwrap_or(0.0);
        Self { size, last_seen }
    }
}

/// Address -> counter, in the order the monitor reported them.
pub type CounterMap = IndexMap<String, Counter>;

/// Both traffic directions observed for one scope.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ScopeCounters {
    #[serde(default, deserialize_with = "lenient_counters")]
    pub out: CounterMap,
    #[serde(default, rename = "in", deserialize_with = "lenient_counters")]
    pub inbound: CounterMap,
}

impl ScopeCounters {
    pub fn outbound_total(&self) -> u64 {
        self.out
            .values()
            .fold(0u64, |acc, c| acc.saturating_add(c.size))
    }

    pub fn inbound_total(&self) -> u64 {
        self.inbound
            .values()
            .fold(0u64, |acc, c| acc.saturating_add(c.size))
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Monitor {
    #[serde(default)]
    pub local: ScopeCounters,
    #[serde(default)]
    pub remote: ScopeCounters,
}

/// One poll's worth of cumulative counters from the monitored process.
///
/// `monitor` is required: a payload without it means the endpoint is not an
/// IkaGo monitor (or not ready), which is handled like an unreachable target.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct RawSnapshot {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub time: Option<f64>,
    pub monitor: Monitor,
}

/// A single `{ip, name}` entry from the monitor's `/dns` endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct NameRecord {
    pub ip: String,
    pub name: String,
}

fn lenient_counters<'de, D>(deserializer: D) -> Result<CounterMap, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    let Some(Value::Object(entries)) = value else {
        return Ok(CounterMap::new());
    };
    Ok(entries
        .iter()
        .map(|(addr, v)| (addr.clone(), Counter::from_value(v)))
        .collect())
}

#[derive(Clone, Copy, Serialize, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Local,
    Remote,
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::Remote => write!(f, "remote"),
        }
    }
}

#[derive(Clone, Copy, Serialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Connecting,
    Active,
    Inactive,
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connecting => write!(f, "Connecting"),
            Self::Active => write!(f, "Active"),
            Self::Inactive => write!(f, "Inactive"),
        }
    }
}

/// Whether traffic columns show per-tick deltas or running totals.
#[derive(Clone, Copy, Serialize, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DisplayMode {
    #[default]
    Rate,
    Total,
}

impl DisplayMode {
    pub fn toggle(self) -> Self {
        match self {
            Self::Rate => Self::Total,
            Self::Total => Self::Rate,
        }
    }
}

/// Immutable view model published after every applied poll result.
#[derive(Clone, Debug, Serialize)]
pub struct DashboardView {
    /// Bumped on every publish so renderers can tell a fresh view apart.
    pub sequence: u64,
    pub name: String,
    pub version: String,
    pub target: String,
    pub status: ConnectionStatus,
    /// Operation time of the monitored process, in seconds.
    pub time: f64,
    pub outbound_delta: u64,
    pub outbound_total: u64,
    pub inbound_delta: u64,
    pub inbound_total: u64,
    pub local: Vec<AggregatePeerRow>,
    pub remote: Vec<AggregatePeerRow>,
}

impl DashboardView {
    pub fn empty(target: &str) -> Self {
        Self {
            sequence: 0,
            name: DEFAULT_NAME.to_string(),
            version: String::new(),
            target: target.to_string(),
            status: ConnectionStatus::Connecting,
            time: 0.0,
            outbound_delta: 0,
            outbound_total: 0,
            inbound_delta: 0,
            inbound_total: 0,
            local: Vec::new(),
            remote: Vec::new(),
        }
    }

    pub fn rows(&self, scope: Scope) -> &[AggregatePeerRow] {
        match scope {
            Scope::Local => &self.local,
            Scope::Remote => &self.remote,
        }
    }
}
