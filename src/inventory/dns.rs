//! DNS alias resolution
//!
//! When `dns_resolution` is enabled every host name is looked up once and,
//! if it is an alias for another name, the canonical name is stored in the
//! `DNSName` host variable.
//!
//! Lookups are fanned out on the tokio runtime:
//! - at most `dns_concurrency` lookups in flight (semaphore)
//! - each lookup bounded by `dns_timeout_ms`
//! - the whole phase bounded by `dns_deadline_ms`
//!
//! A lookup that fails, times out or misses the deadline is treated as "no
//! alias" and reported as an [`InventoryWarning::DnsLookupFailure`].
//!
//! `getaddrinfo` cannot be cancelled: a timed-out lookup keeps its blocking
//! thread until the system resolver gives up. Drive the plugin with
//! [`block_on`] so process exit waits at most [`SHUTDOWN_GRACE`] for them.

use async_trait::async_trait;
use indexmap::IndexSet;
use std::collections::HashMap;
use std::future::Future;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::{timeout, timeout_at, Instant};
use tracing::{debug, info};

use crate::config::GitHostsConfig;
use crate::error::InventoryWarning;

#[cfg(unix)]
const AI_CANONNAME: i32 = libc::AI_CANONNAME;
#[cfg(not(unix))]
const AI_CANONNAME: i32 = 0x0002;

/// Outcome of a single lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DnsOutcome {
    /// The name is an alias for this canonical name
    Alias(String),
    /// The name resolves to itself, or does not exist
    NoAlias,
    /// The lookup did not finish within its timeout
    TimedOut,
    /// The resolver reported an error
    Failed(String),
}

/// Resolves host names to their DNS alias target
#[async_trait]
pub trait DnsResolver: Send + Sync {
    /// Resolver name, for logging
    fn name(&self) -> &str;

    /// Look up one host
    async fn lookup(&self, host: &str) -> DnsOutcome;

    /// Alias target for a host, if any
    async fn resolve_alias(&self, host: &str) -> Option<String> {
        match self.lookup(host).await {
            DnsOutcome::Alias(target) => Some(target),
            _ => None,
        }
    }
}

// ============================================================================
// System Resolver
// ============================================================================

/// Resolver backed by the platform's `getaddrinfo`
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemDnsResolver;

impl SystemDnsResolver {
    /// Create a system resolver
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DnsResolver for SystemDnsResolver {
    fn name(&self) -> &str {
        "system"
    }

    async fn lookup(&self, host: &str) -> DnsOutcome {
        if host.parse::<IpAddr>().is_ok() {
            return DnsOutcome::NoAlias;
        }

        let query = host.to_string();
        match tokio::task::spawn_blocking(move || canonical_name(&query)).await {
            Ok(outcome) => outcome,
            Err(e) => DnsOutcome::Failed(e.to_string()),
        }
    }
}

/// How long runtime shutdown waits for abandoned blocking lookups
pub const SHUTDOWN_GRACE: Duration = Duration::from_millis(250);

/// Run `future` to completion on a fresh multi-threaded runtime, then shut
/// the runtime down without waiting more than [`SHUTDOWN_GRACE`] for
/// blocking lookups that are still stuck in the system resolver.
pub fn block_on<F: Future>(future: F) -> std::io::Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let output = runtime.block_on(future);
    runtime.shutdown_timeout(SHUTDOWN_GRACE);
    Ok(output)
}

/// Blocking canonical-name lookup
fn canonical_name(host: &str) -> DnsOutcome {
    let hints = dns_lookup::AddrInfoHints {
        flags: AI_CANONNAME,
        ..dns_lookup::AddrInfoHints::default()
    };

    match dns_lookup::getaddrinfo(Some(host), None, Some(hints)) {
        Ok(mut infos) => {
            let canonical = infos.find_map(|info| info.ok().and_then(|i| i.canonname));
            match canonical {
                Some(name) => alias_if_different(host, &name),
                None => DnsOutcome::NoAlias,
            }
        }
        Err(e) => match e.kind() {
            dns_lookup::LookupErrorKind::NoName | dns_lookup::LookupErrorKind::NoData => {
                DnsOutcome::NoAlias
            }
            _ => DnsOutcome::Failed(std::io::Error::from(e).to_string()),
        },
    }
}

/// Alias outcome when `canonical` names a different host than `host`.
///
/// A short name expanded by the resolver's search domains (`web01` to
/// `web01.corp.example.com`) is the same host, not an alias.
fn alias_if_different(host: &str, canonical: &str) -> DnsOutcome {
    let canonical = canonical.trim_end_matches('.');
    let host = host.trim_end_matches('.');
    if canonical.is_empty() || canonical.eq_ignore_ascii_case(host) || is_search_expansion(host, canonical) {
        DnsOutcome::NoAlias
    } else {
        DnsOutcome::Alias(canonical.to_string())
    }
}

/// Whether `canonical` is `host` followed by one or more domain labels
fn is_search_expansion(host: &str, canonical: &str) -> bool {
    canonical.len() > host.len() + 1
        && canonical.is_char_boundary(host.len())
        && canonical[..host.len()].eq_ignore_ascii_case(host)
        && canonical.as_bytes()[host.len()] == b'.'
}

// ============================================================================
// Static Resolver
// ============================================================================

/// Resolver answering from a fixed table
#[derive(Debug, Clone, Default)]
pub struct StaticDnsResolver {
    aliases: HashMap<String, String>,
    failures: HashMap<String, String>,
}

impl StaticDnsResolver {
    /// Create an empty resolver; every lookup yields no alias
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `host` with `target`
    pub fn with_alias(mut self, host: impl Into<String>, target: impl Into<String>) -> Self {
        self.aliases.insert(host.into(), target.into());
        self
    }

    /// Fail lookups of `host` with `reason`
    pub fn with_failure(mut self, host: impl Into<String>, reason: impl Into<String>) -> Self {
        self.failures.insert(host.into(), reason.into());
        self
    }
}

#[async_trait]
impl DnsResolver for StaticDnsResolver {
    fn name(&self) -> &str {
        "static"
    }

    async fn lookup(&self, host: &str) -> DnsOutcome {
        if let Some(reason) = self.failures.get(host) {
            return DnsOutcome::Failed(reason.clone());
        }
        match self.aliases.get(host) {
            Some(target) => alias_if_different(host, target),
            None => DnsOutcome::NoAlias,
        }
    }
}

// ============================================================================
// Bulk Resolution
// ============================================================================

/// Limits for a bulk resolution phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DnsSettings {
    /// Timeout of a single lookup
    pub lookup_timeout: Duration,
    /// Deadline for the whole phase
    pub deadline: Duration,
    /// Maximum lookups in flight
    pub concurrency: usize,
}

impl Default for DnsSettings {
    fn default() -> Self {
        Self {
            lookup_timeout: Duration::from_secs(2),
            deadline: Duration::from_secs(30),
            concurrency: 32,
        }
    }
}

impl DnsSettings {
    /// Settings from an inventory source configuration
    pub fn from_config(config: &GitHostsConfig) -> Self {
        Self {
            lookup_timeout: config.dns_timeout(),
            deadline: config.dns_deadline(),
            concurrency: config.dns_concurrency,
        }
    }

    /// Set the per-lookup timeout
    pub fn with_lookup_timeout(mut self, lookup_timeout: Duration) -> Self {
        self.lookup_timeout = lookup_timeout;
        self
    }

    /// Set the phase deadline
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    /// Set the concurrency limit
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }
}

/// Results of a bulk resolution phase
#[derive(Debug, Clone, Default)]
pub struct DnsReport {
    /// Host name to alias target, for hosts that have one
    pub aliases: HashMap<String, String>,
    /// Failed, timed out and unfinished lookups
    pub warnings: Vec<InventoryWarning>,
    /// Number of lookups performed
    pub lookups: usize,
}

/// Resolve every host concurrently and wait for all results.
///
/// Duplicate names are looked up once. Returns when every lookup has
/// finished or the deadline has passed, whichever comes first.
pub async fn resolve_all<I>(
    resolver: Arc<dyn DnsResolver>,
    hosts: I,
    settings: DnsSettings,
) -> DnsReport
where
    I: IntoIterator<Item = String>,
{
    let mut pending: IndexSet<String> = hosts.into_iter().collect();
    let mut report = DnsReport {
        lookups: pending.len(),
        ..Default::default()
    };
    if pending.is_empty() {
        return report;
    }

    debug!(
        "Resolving {} hosts with {} resolver (concurrency {})",
        pending.len(),
        resolver.name(),
        settings.concurrency
    );

    let semaphore = Arc::new(Semaphore::new(settings.concurrency.max(1)));
    let mut tasks = JoinSet::new();

    for host in pending.iter().cloned() {
        let semaphore = semaphore.clone();
        let resolver = resolver.clone();
        let lookup_timeout = settings.lookup_timeout;

        tasks.spawn(async move {
            let outcome = match semaphore.acquire_owned().await {
                Ok(_permit) => match timeout(lookup_timeout, resolver.lookup(&host)).await {
                    Ok(outcome) => outcome,
                    Err(_) => DnsOutcome::TimedOut,
                },
                Err(_) => DnsOutcome::Failed("resolver pool closed".to_string()),
            };
            (host, outcome)
        });
    }

    let deadline = Instant::now() + settings.deadline;
    let mut deadline_hit = false;

    loop {
        match timeout_at(deadline, tasks.join_next()).await {
            Ok(Some(Ok((host, outcome)))) => {
                pending.shift_remove(&host);
                match outcome {
                    DnsOutcome::Alias(target) => {
                        debug!("{} is an alias for {}", host, target);
                        report.aliases.insert(host, target);
                    }
                    DnsOutcome::NoAlias => {}
                    DnsOutcome::TimedOut => report.warnings.push(InventoryWarning::DnsLookupFailure {
                        host,
                        reason: format!(
                            "timed out after {} ms",
                            settings.lookup_timeout.as_millis()
                        ),
                    }),
                    DnsOutcome::Failed(reason) => {
                        report
                            .warnings
                            .push(InventoryWarning::DnsLookupFailure { host, reason })
                    }
                }
            }
            Ok(Some(Err(e))) => debug!("DNS lookup task failed: {}", e),
            Ok(None) => break,
            Err(_) => {
                deadline_hit = true;
                tasks.abort_all();
                break;
            }
        }
    }

    let reason = if deadline_hit {
        format!("not finished within {} ms", settings.deadline.as_millis())
    } else {
        "lookup task aborted".to_string()
    };
    for host in pending {
        report.warnings.push(InventoryWarning::DnsLookupFailure {
            host,
            reason: reason.clone(),
        });
    }

    for warning in &report.warnings {
        warning.log();
    }
    info!(
        "DNS phase finished: {} lookups, {} aliases, {} failures",
        report.lookups,
        report.aliases.len(),
        report.warnings.len()
    );

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Resolver that sleeps before answering and records peak concurrency
    struct SlowResolver {
        delay: Duration,
        active: AtomicUsize,
        peak: AtomicUsize,
    }

    impl SlowResolver {
        fn new(delay: Duration) -> Self {
            Self {
                delay,
                active: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl DnsResolver for SlowResolver {
        fn name(&self) -> &str {
            "slow"
        }

        async fn lookup(&self, host: &str) -> DnsOutcome {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.active.fetch_sub(1, Ordering::SeqCst);
            DnsOutcome::Alias(format!("alias-of-{}", host))
        }
    }

    fn hosts(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_alias_if_different() {
        assert_eq!(
            alias_if_different("www.example.com", "web01.example.com."),
            DnsOutcome::Alias("web01.example.com".to_string())
        );
        assert_eq!(
            alias_if_different("web01.example.com", "WEB01.example.com."),
            DnsOutcome::NoAlias
        );
        assert_eq!(alias_if_different("web01", "."), DnsOutcome::NoAlias);
    }

    #[test]
    fn test_block_on_does_not_wait_for_stuck_lookups() {
        let started = std::time::Instant::now();
        let output = block_on(async {
            drop(tokio::task::spawn_blocking(|| std::thread::sleep(Duration::from_secs(10))));
            "inventory"
        })
        .unwrap();

        assert_eq!(output, "inventory");
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_search_domain_expansion_is_not_alias() {
        assert_eq!(
            alias_if_different("web01", "web01.corp.example.com."),
            DnsOutcome::NoAlias
        );
        assert_eq!(
            alias_if_different("WEB01.corp", "web01.corp.example.com"),
            DnsOutcome::NoAlias
        );
        assert_eq!(
            alias_if_different("web01", "web01-lb.example.com"),
            DnsOutcome::Alias("web01-lb.example.com".to_string())
        );
        assert_eq!(
            alias_if_different("www", "web01.example.com"),
            DnsOutcome::Alias("web01.example.com".to_string())
        );
        assert!(!is_search_expansion("web01", "web01."));
    }

    #[tokio::test]
    async fn test_static_resolver() {
        let resolver = StaticDnsResolver::new()
            .with_alias("www.example.com", "web01.example.com")
            .with_failure("broken.example.com", "SERVFAIL");

        assert_eq!(
            resolver.resolve_alias("www.example.com").await.as_deref(),
            Some("web01.example.com")
        );
        assert_eq!(resolver.resolve_alias("db01.example.com").await, None);
        assert_eq!(
            resolver.lookup("broken.example.com").await,
            DnsOutcome::Failed("SERVFAIL".to_string())
        );
    }

    #[tokio::test]
    async fn test_system_resolver_skips_ip_literals() {
        let resolver = SystemDnsResolver::new();
        assert_eq!(resolver.lookup("192.0.2.10").await, DnsOutcome::NoAlias);
        assert_eq!(resolver.lookup("2001:db8::1").await, DnsOutcome::NoAlias);
    }

    #[tokio::test]
    async fn test_resolve_all_collects_aliases_and_failures() {
        let resolver: Arc<dyn DnsResolver> = Arc::new(
            StaticDnsResolver::new()
                .with_alias("www", "web01")
                .with_failure("bad", "SERVFAIL"),
        );
        let report = resolve_all(
            resolver,
            hosts(&["www", "db01", "bad", "www"]),
            DnsSettings::default(),
        )
        .await;

        assert_eq!(report.lookups, 3);
        assert_eq!(report.aliases.len(), 1);
        assert_eq!(report.aliases.get("www").map(String::as_str), Some("web01"));
        assert_eq!(report.warnings.len(), 1);
        assert!(matches!(
            &report.warnings[0],
            InventoryWarning::DnsLookupFailure { host, .. } if host == "bad"
        ));
    }

    #[tokio::test]
    async fn test_resolve_all_respects_concurrency() {
        let slow = Arc::new(SlowResolver::new(Duration::from_millis(20)));
        let resolver: Arc<dyn DnsResolver> = slow.clone();
        let names: Vec<String> = (0..12).map(|i| format!("host{:02}", i)).collect();

        let report = resolve_all(
            resolver,
            names,
            DnsSettings::default().with_concurrency(3),
        )
        .await;

        assert_eq!(report.aliases.len(), 12);
        assert!(slow.peak.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn test_resolve_all_per_lookup_timeout() {
        let resolver: Arc<dyn DnsResolver> = Arc::new(SlowResolver::new(Duration::from_secs(5)));
        let report = resolve_all(
            resolver,
            hosts(&["web01"]),
            DnsSettings::default().with_lookup_timeout(Duration::from_millis(20)),
        )
        .await;

        assert!(report.aliases.is_empty());
        assert_eq!(report.warnings.len(), 1);
    }

    #[tokio::test]
    async fn test_resolve_all_global_deadline() {
        let resolver: Arc<dyn DnsResolver> = Arc::new(SlowResolver::new(Duration::from_secs(5)));
        let started = std::time::Instant::now();
        let report = resolve_all(
            resolver,
            hosts(&["a", "b", "c"]),
            DnsSettings::default()
                .with_lookup_timeout(Duration::from_secs(10))
                .with_deadline(Duration::from_millis(50)),
        )
        .await;

        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(report.aliases.is_empty());
        assert_eq!(report.warnings.len(), 3);
    }

    #[tokio::test]
    async fn test_resolve_all_empty() {
        let resolver: Arc<dyn DnsResolver> = Arc::new(StaticDnsResolver::new());
        let report = resolve_all(resolver, Vec::new(), DnsSettings::default()).await;
        assert_eq!(report.lookups, 0);
        assert!(report.warnings.is_empty());
    }
}
