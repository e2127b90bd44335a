use std::collections::HashMap;
use std::sync::Arc;
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use crate::error::IkamonError;
use crate::source::GeoProvider;

/// Requests a pending prefix absorbs before another lookup is allowed.
pub const BACKOFF_CEILING: u8 = 15;

/// Default number of prefixes the cache remembers.
pub const DEFAULT_CAPACITY: usize = 4096;

/// Lookup state of one address prefix.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GeoState {
    /// Unresolved; the count is how many more requests pass before the next
    /// lookup is issued.
    Pending(u8),
    /// Country code. Never looked up again.
    Resolved(String),
}

/// Answer to a single [`GeoCache::request`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Lookup {
    Known(String),
    /// No code yet. `issue` tells the caller to start a lookup now.
    Unknown { issue: bool },
}

/// Monotonic access counter used to order cache entries by recency.
pub trait LogicalClock {
    fn tick(&mut self) -> u64;
}

/// Default clock: a plain counter bumped on every request.
#[derive(Debug, Default)]
pub struct SequenceClock {
    next: u64,
}

impl LogicalClock for SequenceClock {
    fn tick(&mut self) -> u64 {
        self.next += 1;
        self.next
    }
}

struct Entry {
    state: GeoState,
    last_used: u64,
}

/// Rate-limited country lookup state, keyed by address prefix.
///
/// The first request for a prefix asks for a lookup. While unresolved, the
/// prefix then swallows [`BACKOFF_CEILING`] requests before asking again, so
/// a busy row costs the provider one call per sixteen refreshes at most. A
/// successful answer is kept for the lifetime of the entry.
///
/// The cache holds at most `capacity` prefixes; a new prefix beyond that
/// evicts the one requested least recently.
pub struct GeoCache<C: LogicalClock = SequenceClock> {
    entries: HashMap<String, Entry>,
    capacity: usize,
    clock: C,
}

impl GeoCache<SequenceClock> {
    pub fn new(capacity: usize) -> Self {
        Self::with_clock(capacity, SequenceClock::default())
    }
}

impl Default for GeoCache<SequenceClock> {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl<C: LogicalClock> GeoCache<C> {
    pub fn with_clock(capacity: usize, clock: C) -> Self {
        Self {
            entries: HashMap::new(),
            capacity: capacity.max(1),
            clock,
        }
    }

    /// Record one display request for `prefix` and advance its state.
    pub fn request(&mut self, prefix: &str) -> Lookup {
        let now = self.clock.tick();

        if let Some(entry) = self.entries.get_mut(prefix) {
            entry.last_used = now;
            return match entry.state {
                GeoState::Resolved(ref code) => Lookup::Known(code.clone()),
                GeoState::Pending(0) => {
                    entry.state = GeoState::Pending(BACKOFF_CEILING);
                    Lookup::Unknown { issue: true }
                }
                GeoState::Pending(n) => {
                    entry.state = GeoState::Pending(n - 1);
                    Lookup::Unknown { issue: false }
                }
            };
        }

        if self.entries.len() >= self.capacity {
            self.evict_oldest();
        }
        self.entries.insert(
            prefix.to_string(),
            Entry {
                state: GeoState::Pending(BACKOFF_CEILING),
                last_used: now,
            },
        );
        Lookup::Unknown { issue: true }
    }

    /// Apply a finished lookup. Failures leave the state as it is; answers
    /// for prefixes that were evicted meanwhile are dropped.
    pub fn complete(&mut self, prefix: &str, result: Result<String, IkamonError>) {
        let Ok(code) = result else {
            return;
        };
        if let Some(entry) = self.entries.get_mut(prefix) {
            entry.state = GeoState::Resolved(code);
        }
    }

    /// Undo the backoff of a lookup that was asked for but never started,
    /// so the next request for `prefix` asks again.
    pub fn reissue(&mut self, prefix: &str) {
        if let Some(entry) = self.entries.get_mut(prefix) {
            if matches!(entry.state, GeoState::Pending(_)) {
                entry.state = GeoState::Pending(0);
            }
        }
    }

    /// Current state without counting as a request.
    pub fn state(&self, prefix: &str) -> Option<&GeoState> {
        self.entries.get(prefix).map(|e| &e.state)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn evict_oldest(&mut self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, e)| e.last_used)
            .map(|(k, _)| k.clone());
        if let Some(key) = oldest {
            log::debug!("geo cache full, evicting {key}");
            self.entries.remove(&key);
        }
    }
}

/// The prefix an address is geolocated by: everything before its last `.`.
///
/// Addresses without a dot (IPv6, bare hostnames) have no prefix.
pub fn prefix_of(address: &str) -> Option<&str> {
    address
        .rfind('.')
        .map(|i| &address[..i])
        .filter(|p| !p.is_empty())
}

/// The address actually sent to the provider for `prefix`.
pub fn query_address(prefix: &str) -> String {
    format!("{prefix}.1")
}

type Completion = (String, Result<String, IkamonError>);

/// Country resolver running provider calls on worker threads.
///
/// `lookup()` never blocks: it consults the [`GeoCache`], enqueues a provider
/// call when the cache allows one, and returns the code only once known.
/// Call `collect_results()` periodically to drain finished lookups.
pub struct GeoResolver {
    cache: GeoCache,
    query_tx: crossbeam_channel::Sender<String>,
    result_rx: mpsc::Receiver<Completion>,
    in_flight: usize,
    _workers: Vec<thread::JoinHandle<()>>,
}

impl GeoResolver {
    /// Create a resolver with `n_workers` background lookup threads.
    pub fn new(
        provider: Arc<dyn GeoProvider>,
        n_workers: usize,
        capacity: usize,
    ) -> Result<Self, IkamonError> {
        let (query_tx, query_rx) = crossbeam_channel::bounded::<String>(64);
        let (result_tx, result_rx) = mpsc::sync_channel::<Completion>(64);

        let mut workers = Vec::with_capacity(n_workers);
        for i in 0..n_workers.max(1) {
            let rx = query_rx.clone();
            let tx = result_tx.clone();
            let provider = Arc::clone(&provider);
            let h = thread::Builder::new()
                .name(format!("ikamon-geo-{i}"))
                .spawn(move || geo_worker(provider, rx, tx))
                .map_err(|e| IkamonError::Fatal(format!("spawn geo worker: {e}")))?;
            workers.push(h);
        }

        Ok(Self {
            cache: GeoCache::new(capacity),
            query_tx,
            result_rx,
            in_flight: 0,
            _workers: workers,
        })
    }

    /// Request the country of `address`, counting against its prefix budget.
    pub fn lookup(&mut self, address: &str) -> Option<String> {
        let prefix = prefix_of(address)?;
        match self.cache.request(prefix) {
            Lookup::Known(code) => Some(code),
            Lookup::Unknown { issue: true } => {
                if self.query_tx.try_send(prefix.to_string()).is_ok() {
                    self.in_flight += 1;
                } else {
                    log::debug!("geo queue full, deferring {prefix}");
                    self.cache.reissue(prefix);
                }
                None
            }
            Lookup::Unknown { issue: false } => None,
        }
    }

    /// Known country of `address`, without touching the request budget.
    pub fn peek(&self, address: &str) -> Option<&str> {
        match self.cache.state(prefix_of(address)?) {
            Some(GeoState::Resolved(code)) => Some(code.as_str()),
            _ => None,
        }
    }

    /// Drain completed lookups from worker threads (non-blocking).
    pub fn collect_results(&mut self) {
        while let Ok((prefix, result)) = self.result_rx.try_recv() {
            self.in_flight = self.in_flight.saturating_sub(1);
            if let Err(e) = &result {
                log::debug!("geo lookup for {prefix} failed: {e}");
            }
            self.cache.complete(&prefix, result);
        }
    }

    /// Wait up to `timeout` for in-flight lookups to finish.
    pub fn wait_for_pending(&mut self, timeout: Duration) {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            self.collect_results();
            if self.in_flight == 0 {
                break;
            }
            thread::sleep(Duration::from_millis(20));
        }
        self.collect_results();
    }

    pub fn cache(&self) -> &GeoCache {
        &self.cache
    }
}

/// Worker thread: reads prefixes from the work queue, asks the provider, and
/// sends results back. Exits when either channel is closed.
fn geo_worker(
    provider: Arc<dyn GeoProvider>,
    rx: crossbeam_channel::Receiver<String>,
    tx: mpsc::SyncSender<Completion>,
) {
    while let Ok(prefix) = rx.recv() {
        let result = provider.country_code(&query_address(&prefix));
        if tx.send((prefix, result)).is_err() {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Condvar, Mutex};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn issued(cache: &mut GeoCache, prefix: &str, requests: usize) -> usize {
        (0..requests)
            .filter(|_| cache.request(prefix) == Lookup::Unknown { issue: true })
            .count()
    }

    #[test]
    fn first_request_issues_one_lookup() {
        let mut cache = GeoCache::default();
        assert_eq!(cache.request("1.2.3"), Lookup::Unknown { issue: true });
        assert_eq!(cache.state("1.2.3"), Some(&GeoState::Pending(BACKOFF_CEILING)));
    }

    #[test]
    fn unresolved_prefix_retries_every_sixteenth_request() {
        let mut cache = GeoCache::default();
        assert_eq!(issued(&mut cache, "1.2.3", 1), 1);
        // Requests 2..=16 are absorbed by the counter.
        assert_eq!(issued(&mut cache, "1.2.3", 15), 0);
        assert_eq!(cache.state("1.2.3"), Some(&GeoState::Pending(0)));
        // Request 17 issues again.
        assert_eq!(issued(&mut cache, "1.2.3", 1), 1);
        assert_eq!(issued(&mut cache, "1.2.3", 32), 2);
    }

    #[test]
    fn failure_leaves_state_unchanged() {
        let mut cache = GeoCache::default();
        cache.request("1.2.3");
        cache.request("1.2.3");
        cache.complete("1.2.3", Err(IkamonError::Lookup("rate limited".into())));
        assert_eq!(cache.state("1.2.3"), Some(&GeoState::Pending(BACKOFF_CEILING - 1)));
    }

    #[test]
    fn resolved_prefix_never_issues_again() {
        let mut cache = GeoCache::default();
        cache.request("8.8.8");
        cache.complete("8.8.8", Ok("US".to_string()));
        for _ in 0..100 {
            assert_eq!(cache.request("8.8.8"), Lookup::Known("US".to_string()));
        }
    }

    #[test]
    fn prefixes_are_independent() {
        let mut cache = GeoCache::default();
        assert_eq!(cache.request("1.1.1"), Lookup::Unknown { issue: true });
        assert_eq!(cache.request("2.2.2"), Lookup::Unknown { issue: true });
        assert_eq!(cache.request("1.1.1"), Lookup::Unknown { issue: false });
    }

    #[test]
    fn least_recently_requested_is_evicted() {
        let mut cache = GeoCache::new(2);
        cache.request("a.a");
        cache.request("b.b");
        cache.request("a.a");
        cache.request("c.c");
        assert_eq!(cache.len(), 2);
        assert!(cache.state("b.b").is_none());
        assert!(cache.state("a.a").is_some());
        assert!(cache.state("c.c").is_some());
    }

    #[test]
    fn completion_for_evicted_prefix_is_dropped() {
        let mut cache = GeoCache::new(1);
        cache.request("a.a");
        cache.request("b.b");
        cache.complete("a.a", Ok("DE".to_string()));
        assert!(cache.state("a.a").is_none());
        assert_eq!(cache.len(), 1);
    }

    struct FixedClock(u64);

    impl LogicalClock for FixedClock {
        fn tick(&mut self) -> u64 {
            self.0
        }
    }

    #[test]
    fn injected_clock_orders_eviction() {
        // All entries share a timestamp; eviction still keeps the bound.
        let mut cache = GeoCache::with_clock(3, FixedClock(7));
        for p in ["a.a", "b.b", "c.c", "d.d", "e.e"] {
            cache.request(p);
        }
        assert_eq!(cache.len(), 3);
        assert!(cache.state("e.e").is_some());
    }

    #[test]
    fn prefix_strips_last_segment() {
        assert_eq!(prefix_of("192.168.1.20"), Some("192.168.1"));
        assert_eq!(prefix_of("fe80::1"), None);
        assert_eq!(prefix_of(".5"), None);
        assert_eq!(query_address("192.168.1"), "192.168.1.1");
    }

    struct CountingProvider {
        calls: AtomicUsize,
        seen: Mutex<Vec<String>>,
        answer: Option<&'static str>,
    }

    impl GeoProvider for CountingProvider {
        fn country_code(&self, ip: &str) -> Result<String, IkamonError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Ok(mut seen) = self.seen.lock() {
                seen.push(ip.to_string());
            }
            self.answer
                .map(str::to_string)
                .ok_or_else(|| IkamonError::Lookup("no answer".into()))
        }
    }

    fn provider(answer: Option<&'static str>) -> Arc<CountingProvider> {
        Arc::new(CountingProvider {
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
            answer,
        })
    }

    #[test]
    fn resolver_queries_representative_address() {
        let p = provider(Some("JP"));
        let mut resolver = GeoResolver::new(p.clone(), 1, 16).unwrap();
        assert_eq!(resolver.lookup("203.0.113.77"), None);
        resolver.wait_for_pending(Duration::from_secs(5));

        assert_eq!(resolver.peek("203.0.113.5"), Some("JP"));
        assert_eq!(resolver.lookup("203.0.113.9"), Some("JP".to_string()));
        assert_eq!(p.calls.load(Ordering::SeqCst), 1);
        assert_eq!(*p.seen.lock().unwrap(), vec!["203.0.113.1".to_string()]);
    }

    #[test]
    fn resolver_failure_is_silent_and_throttled() {
        let p = provider(None);
        let mut resolver = GeoResolver::new(p.clone(), 1, 16).unwrap();
        for _ in 0..16 {
            assert_eq!(resolver.lookup("10.1.1.1"), None);
            resolver.wait_for_pending(Duration::from_secs(5));
        }
        assert_eq!(p.calls.load(Ordering::SeqCst), 1);
        resolver.lookup("10.1.1.1");
        resolver.wait_for_pending(Duration::from_secs(5));
        assert_eq!(p.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn resolver_skips_addresses_without_prefix() {
        let p = provider(Some("US"));
        let mut resolver = GeoResolver::new(p.clone(), 1, 16).unwrap();
        assert_eq!(resolver.lookup("::1"), None);
        resolver.wait_for_pending(Duration::from_millis(100));
        assert_eq!(p.calls.load(Ordering::SeqCst), 0);
        assert!(resolver.cache().is_empty());
    }

    /// Provider that holds every call until `open()` is called.
    struct GatedProvider {
        open: Mutex<bool>,
        cv: Condvar,
    }

    impl GatedProvider {
        fn open(&self) {
            *self.open.lock().unwrap() = true;
            self.cv.notify_all();
        }
    }

    impl GeoProvider for GatedProvider {
        fn country_code(&self, _ip: &str) -> Result<String, IkamonError> {
            let mut open = self.open.lock().unwrap();
            while !*open {
                open = self.cv.wait(open).unwrap();
            }
            Ok("SE".to_string())
        }
    }

    #[test]
    fn reissue_only_touches_pending_prefixes() {
        let mut cache = GeoCache::default();
        cache.request("1.1.1");
        cache.request("2.2.2");
        cache.complete("2.2.2", Ok("FR".to_string()));
        cache.reissue("1.1.1");
        cache.reissue("2.2.2");
        cache.reissue("3.3.3");
        assert_eq!(cache.state("1.1.1"), Some(&GeoState::Pending(0)));
        assert_eq!(cache.state("2.2.2"), Some(&GeoState::Resolved("FR".to_string())));
        assert!(cache.state("3.3.3").is_none());
        assert_eq!(cache.request("1.1.1"), Lookup::Unknown { issue: true });
    }

    // With the single worker stuck and the work queue full, a prefix whose
    // lookup could not be queued asks again on its very next request.
    #[test]
    fn full_queue_does_not_spend_backoff() {
        let gate = Arc::new(GatedProvider {
            open: Mutex::new(false),
            cv: Condvar::new(),
        });
        let mut resolver = GeoResolver::new(gate.clone(), 1, 256).unwrap();
        for i in 0..70 {
            assert_eq!(resolver.lookup(&format!("10.0.{i}.5")), None);
        }
        assert_eq!(resolver.cache().state("10.0.69"), Some(&GeoState::Pending(0)));
        // Still full: deferred again instead of counting down.
        resolver.lookup("10.0.69.5");
        assert_eq!(resolver.cache().state("10.0.69"), Some(&GeoState::Pending(0)));

        gate.open();
        resolver.wait_for_pending(Duration::from_secs(5));
        assert_eq!(resolver.peek("10.0.69.5"), None);
        assert_eq!(resolver.lookup("10.0.69.5"), None);
        resolver.wait_for_pending(Duration::from_secs(5));
        assert_eq!(resolver.peek("10.0.69.5"), Some("SE"));
        assert_eq!(resolver.peek("10.0.0.5"), Some("SE"));
    }
}
