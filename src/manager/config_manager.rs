//! The single writer driving generation cycles.

use arc_swap::ArcSwapOption;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::time::{sleep_until, Instant};

use crate::config::RetryConfig;
use crate::generator::{ConfigGenerator, Generated, ResolvedCredentials};
use crate::manager::{CycleError, CycleOutcome, CycleStatus, Trigger};
use crate::observability::metrics;
use crate::resilience::{calculate_backoff, with_timeout};
use crate::servicespec::ServiceSpecification;
use crate::snapshot::SnapshotPublisher;
use crate::sources::{KeySource, SpecificationSource, TokenSource};

/// Default deadline for each external call of a cycle.
const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(5);

/// Per-process version bookkeeping, guarded by the cycle lock.
#[derive(Debug, Default)]
struct VersionState {
    /// Versions handed out so far under each config id.
    revisions: HashMap<String, u32>,
}

impl VersionState {
    /// The config id itself for its first snapshot, `<config_id>#<n>` after.
    /// Candidates for which `taken` holds are skipped, so a derived version
    /// never collides with a config id that was served as-is.
    fn next_version(&mut self, config_id: &str, taken: impl Fn(&str) -> bool) -> String {
        let n = self.revisions.entry(config_id.to_string()).or_insert(0);
        loop {
            let candidate = match *n {
                0 => config_id.to_string(),
                rev => format!("{}#{}", config_id, rev),
            };
            *n += 1;
            if !taken(&candidate) {
                return candidate;
            }
        }
    }
}

pub struct ConfigManager {
    source: Arc<dyn SpecificationSource>,
    keys: Arc<dyn KeySource>,
    tokens: Arc<dyn TokenSource>,
    generator: ConfigGenerator,
    publisher: Arc<SnapshotPublisher>,
    fetch_timeout: Duration,
    state: Mutex<VersionState>,
    last: ArcSwapOption<CycleStatus>,
}

impl ConfigManager {
    pub fn new(
        source: Arc<dyn SpecificationSource>,
        keys: Arc<dyn KeySource>,
        tokens: Arc<dyn TokenSource>,
        generator: ConfigGenerator,
        publisher: Arc<SnapshotPublisher>,
    ) -> Self {
        Self {
            source,
            keys,
            tokens,
            generator,
            publisher,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            state: Mutex::new(VersionState::default()),
            last: ArcSwapOption::empty(),
        }
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn publisher(&self) -> &Arc<SnapshotPublisher> {
        &self.publisher
    }

    /// Status of the most recent finished cycle.
    pub fn last_status(&self) -> Option<Arc<CycleStatus>> {
        self.last.load_full()
    }

    /// Run one full cycle. Concurrent callers wait for the running cycle.
    pub async fn run_cycle(&self) -> Result<CycleOutcome, CycleError> {
        let mut state = self.state.lock().await;
        let start = std::time::Instant::now();

        let mut config_id = None;
        let mut warnings = Vec::new();
        let result = self.cycle(&mut state, &mut config_id, &mut warnings).await;

        let status = match &result {
            Ok(outcome) => {
                let label = match outcome {
                    CycleOutcome::Published { .. } => "published",
                    CycleOutcome::Unchanged { .. } => "unchanged",
                };
                metrics::record_cycle(label, start);
                CycleStatus {
                    outcome: label,
                    config_id,
                    version: Some(outcome.version().to_string()),
                    error: None,
                    warnings,
                    finished_at_unix: unix_now(),
                }
            }
            Err(e) => {
                metrics::record_cycle("failed", start);
                tracing::error!(
                    kind = e.kind(),
                    error = %e,
                    serving = ?self.publisher.current_version(),
                    "Generation cycle failed, keeping current snapshot"
                );
                CycleStatus {
                    outcome: "failed",
                    config_id,
                    version: self.publisher.current_version(),
                    error: Some(e.to_string()),
                    warnings,
                    finished_at_unix: unix_now(),
                }
            }
        };
        self.last.store(Some(Arc::new(status)));

        result
    }

    async fn cycle(
        &self,
        state: &mut VersionState,
        config_id_out: &mut Option<String>,
        warnings_out: &mut Vec<String>,
    ) -> Result<CycleOutcome, CycleError> {
        let fetched = with_timeout(self.fetch_timeout, "service specification", self.source.fetch()).await?;
        *config_id_out = Some(fetched.config_id.clone());

        let credentials = self.resolve_credentials(&fetched.spec).await?;
        let Generated {
            listener,
            clusters,
            warnings,
        } = self.generator.generate(&fetched.spec, &credentials)?;
        *warnings_out = warnings.iter().map(ToString::to_string).collect();

        if let Some(current) = self.publisher.current() {
            if current.listener() == &listener && current.clusters() == clusters.as_slice() {
                tracing::debug!(version = %current.version(), "Generated content unchanged");
                return Ok(CycleOutcome::Unchanged {
                    version: current.version().to_string(),
                });
            }
        }

        let version = state.next_version(&fetched.config_id, |v| self.publisher.knows_version(v));
        let snapshot = self.publisher.publish(version, listener, clusters)?;

        tracing::info!(
            service = %fetched.spec.name,
            config_id = %fetched.config_id,
            version = %snapshot.version(),
            warnings = warnings.len(),
            "Generation cycle published snapshot"
        );
        Ok(CycleOutcome::Published {
            version: snapshot.version().to_string(),
        })
    }

    /// Fetch every provider's key set once, and the token descriptor when
    /// usage reporting is on.
    async fn resolve_credentials(&self, spec: &ServiceSpecification) -> Result<ResolvedCredentials, CycleError> {
        let mut credentials = ResolvedCredentials::default();

        for provider in &spec.authentication.providers {
            if credentials.keys.contains_key(&provider.id) {
                continue;
            }
            let what = format!("key set of provider {}", provider.id);
            let jwks = with_timeout(self.fetch_timeout, &what, self.keys.fetch_jwks(&provider.jwks_uri)).await?;
            tracing::debug!(provider = %provider.id, jwks_uri = %provider.jwks_uri, "Resolved key set");
            credentials.keys.insert(provider.id.clone(), jwks);
        }

        if spec.usage_reporting_enabled() {
            with_timeout(self.fetch_timeout, "access token", self.tokens.access_token()).await?;
            credentials.token_uri = Some(self.tokens.token_uri());
        }

        Ok(credentials)
    }

    /// Drive cycles until shutdown: immediately at start, then every
    /// `interval`, on every trigger, and after failures with backoff.
    pub async fn run(
        self: Arc<Self>,
        interval: Duration,
        retries: RetryConfig,
        mut triggers: mpsc::UnboundedReceiver<Trigger>,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        let mut next = Instant::now();
        let mut failures = 0u32;
        let mut triggers_open = true;

        loop {
            tokio::select! {
                _ = sleep_until(next) => {}
                trigger = triggers.recv(), if triggers_open => match trigger {
                    Some(trigger) => tracing::info!(?trigger, "Regeneration triggered"),
                    None => {
                        triggers_open = false;
                        continue;
                    }
                },
                _ = shutdown.recv() => break,
            }

            while triggers.try_recv().is_ok() {}

            match self.run_cycle().await {
                Ok(_) => {
                    failures = 0;
                    next = Instant::now() + interval;
                }
                Err(_) => {
                    failures = failures.saturating_add(1);
                    let delay = calculate_backoff(failures, retries.base_delay_ms, retries.max_delay_ms).min(interval);
                    tracing::info!(attempt = failures, delay = ?delay, "Retrying generation cycle");
                    next = Instant::now() + delay;
                }
            }
        }

        tracing::info!("Config manager stopped");
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
