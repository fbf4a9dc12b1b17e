//! Fan-out of one lookup to every provider under a shared deadline.
//!
//! The first provider to succeed wins. Providers that are still running when
//! the race is decided are aborted together with the race's task set, and
//! whatever they would have produced is dropped.

use std::{sync::Arc, time::Duration};

use tokio::{task::JoinSet, time::Instant};
use tracing::{debug, warn};

use crate::{
    error::{ProviderError, WeatherError},
    model::WeatherRecord,
    provider::{ProviderId, WeatherProvider},
};

/// Default bound on a whole race.
pub const DEFAULT_RACE_TIMEOUT: Duration = Duration::from_secs(10);

/// Roughly 30 years, the same cap tokio applies to oversized sleeps.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Point in time after which a lookup must stop waiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Deadline(Instant);

impl Deadline {
    /// Saturates to a far-future instant for timeouts too large to add.
    pub fn after(timeout: Duration) -> Self {
        let now = Instant::now();
        Self(now.checked_add(timeout).unwrap_or_else(|| now + FAR_FUTURE))
    }

    /// Deadline `timeout` from now, never later than `parent`.
    pub fn child_of(parent: Option<Deadline>, timeout: Duration) -> Self {
        let own = Self::after(timeout);
        parent.map_or(own, |parent| own.min(parent))
    }

    pub fn instant(&self) -> Instant {
        self.0
    }

    /// Time left, zero once elapsed.
    pub fn remaining(&self) -> Duration {
        self.0.saturating_duration_since(Instant::now())
    }
}

/// Races a fixed set of providers against each other.
#[derive(Debug, Clone)]
pub struct RaceCoordinator {
    providers: Vec<Arc<dyn WeatherProvider>>,
    timeout: Duration,
}

impl RaceCoordinator {
    pub fn new(providers: Vec<Arc<dyn WeatherProvider>>, timeout: Duration) -> Self {
        Self { providers, timeout }
    }

    /// Ask every provider for `city` and return the first success.
    ///
    /// Every provider is called, even though only one answer is used. Errors
    /// from individual providers are logged and only surface, as
    /// [`WeatherError::AllProvidersFailed`], once no provider is left running.
    pub async fn race(
        &self,
        city: &str,
        parent: Option<Deadline>,
    ) -> Result<WeatherRecord, WeatherError> {
        if self.providers.is_empty() {
            return Err(WeatherError::NoProviders);
        }

        let deadline = Deadline::child_of(parent, self.timeout);
        let budget = deadline.remaining();
        let mut tasks: JoinSet<(ProviderId, Result<WeatherRecord, ProviderError>)> =
            JoinSet::new();

        for provider in &self.providers {
            let provider = Arc::clone(provider);
            let city = city.to_owned();
            tasks.spawn(async move {
                let outcome = provider.fetch(&city, deadline).await;
                (provider.id(), outcome)
            });
        }

        let expired = tokio::time::sleep_until(deadline.instant());
        tokio::pin!(expired);

        let mut failures = 0;
        let mut last_error = None;

        loop {
            tokio::select! {
                joined = tasks.join_next() => {
                    let outcome = match joined {
                        Some(Ok((provider, outcome))) => outcome.map(|record| (provider, record)),
                        Some(Err(join_err)) => Err(ProviderError::from(join_err)),
                        None => break,
                    };

                    match outcome {
                        Ok((provider, record)) => {
                            debug!(%provider, city, "provider won the race");
                            return Ok(record);
                        }
                        Err(err) => {
                            warn!(error = %err, city, "provider fetch failed");
                            failures += 1;
                            last_error = Some(err);
                        }
                    }
                }
                () = &mut expired => {
                    warn!(city, outstanding = tasks.len(), "race deadline exceeded");
                    return Err(WeatherError::DeadlineExceeded { timeout: budget });
                }
            }
        }

        // Providers give up at the same instant; their timeouts count as ours.
        if deadline.remaining().is_zero() {
            warn!(city, "race deadline exceeded");
            return Err(WeatherError::DeadlineExceeded { timeout: budget });
        }

        match last_error {
            Some(last) => Err(WeatherError::AllProvidersFailed { failures, last }),
            // Unreachable with at least one provider: every task reports once.
            None => Err(WeatherError::NoProviders),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Provider double with a scripted delay and outcome.
    #[derive(Debug)]
    pub(crate) struct ScriptedProvider {
        pub id: ProviderId,
        pub delay: Duration,
        pub outcome: Scripted,
        pub calls: AtomicUsize,
    }

    #[derive(Debug, Clone)]
    pub(crate) enum Scripted {
        Succeed { temperature: f64, humidity: u8, condition: &'static str },
        /// Succeeds on the first call only, then answers 502.
        SucceedOnce { temperature: f64, humidity: u8, condition: &'static str },
        FailStatus(u16),
        Panic,
    }

    impl ScriptedProvider {
        pub fn new(id: ProviderId, delay: Duration, outcome: Scripted) -> Arc<Self> {
            Arc::new(Self { id, delay, outcome, calls: AtomicUsize::new(0) })
        }

        pub fn succeeding(id: ProviderId, delay: Duration) -> Arc<Self> {
            Self::new(
                id,
                delay,
                Scripted::Succeed { temperature: 20.0, humidity: 50, condition: "Cloudy" },
            )
        }

        pub fn failing(id: ProviderId, delay: Duration) -> Arc<Self> {
            Self::new(id, delay, Scripted::FailStatus(500))
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl WeatherProvider for ScriptedProvider {
        fn id(&self) -> ProviderId {
            self.id
        }

        async fn fetch(
            &self,
            city: &str,
            _deadline: Deadline,
        ) -> Result<WeatherRecord, ProviderError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;

            let outcome = match &self.outcome {
                Scripted::SucceedOnce { .. } if call > 0 => &Scripted::FailStatus(502),
                outcome => outcome,
            };

            match outcome {
                Scripted::Succeed { temperature, humidity, condition }
                | Scripted::SucceedOnce { temperature, humidity, condition } => Ok(WeatherRecord {
                    city: city.to_owned(),
                    temperature_celsius: *temperature,
                    humidity_percent: *humidity,
                    condition: condition.to_string(),
                    source: self.id,
                    cached: false,
                    observed_at: Utc::now(),
                }),
                Scripted::FailStatus(status) => Err(ProviderError::Status {
                    provider: self.id,
                    status: *status,
                    body: "upstream unavailable".into(),
                }),
                Scripted::Panic => panic!("scripted provider panic"),
            }
        }
    }

    /// Flags flipped by a [`TrackedProvider`] fetch as it runs.
    #[derive(Debug, Default)]
    struct FetchFlags {
        dropped: AtomicBool,
        finished: AtomicBool,
    }

    struct SetOnDrop(Arc<FetchFlags>);

    impl Drop for SetOnDrop {
        fn drop(&mut self) {
            self.0.dropped.store(true, Ordering::SeqCst);
        }
    }

    /// Slow failing provider that records whether its fetch ran to completion.
    #[derive(Debug)]
    struct TrackedProvider {
        delay: Duration,
        flags: Arc<FetchFlags>,
    }

    #[async_trait]
    impl WeatherProvider for TrackedProvider {
        fn id(&self) -> ProviderId {
            ProviderId::WeatherApi
        }

        async fn fetch(
            &self,
            _city: &str,
            _deadline: Deadline,
        ) -> Result<WeatherRecord, ProviderError> {
            let _guard = SetOnDrop(Arc::clone(&self.flags));
            tokio::time::sleep(self.delay).await;
            self.flags.finished.store(true, Ordering::SeqCst);

            Err(ProviderError::Status {
                provider: ProviderId::WeatherApi,
                status: 504,
                body: "too late".into(),
            })
        }
    }

    fn coordinator(providers: Vec<Arc<ScriptedProvider>>) -> RaceCoordinator {
        let providers = providers.into_iter().map(|p| p as Arc<dyn WeatherProvider>).collect();
        RaceCoordinator::new(providers, DEFAULT_RACE_TIMEOUT)
    }

    #[tokio::test(start_paused = true)]
    async fn fastest_success_wins() {
        let slow = ScriptedProvider::succeeding(ProviderId::OpenWeather, Duration::from_secs(3));
        let fast = ScriptedProvider::succeeding(ProviderId::WeatherApi, Duration::from_secs(1));

        let record = coordinator(vec![slow.clone(), fast.clone()])
            .race("Jakarta", None)
            .await
            .unwrap();

        assert_eq!(record.source, ProviderId::WeatherApi);
        assert_eq!(slow.calls(), 1);
        assert_eq!(fast.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn early_failure_does_not_abort_the_race() {
        let failing = ScriptedProvider::failing(ProviderId::OpenWeather, Duration::from_millis(10));
        let healthy = ScriptedProvider::succeeding(ProviderId::WeatherApi, Duration::from_secs(2));

        let record = coordinator(vec![failing, healthy]).race("Jakarta", None).await.unwrap();

        assert_eq!(record.source, ProviderId::WeatherApi);
    }

    #[tokio::test(start_paused = true)]
    async fn all_failures_report_the_last_error() {
        let first = ScriptedProvider::failing(ProviderId::OpenWeather, Duration::from_millis(10));
        let last = ScriptedProvider::new(
            ProviderId::WeatherApi,
            Duration::from_millis(20),
            Scripted::FailStatus(503),
        );

        let err = coordinator(vec![first, last]).race("Jakarta", None).await.unwrap_err();

        match err {
            WeatherError::AllProvidersFailed { failures, last } => {
                assert_eq!(failures, 2);
                assert!(matches!(
                    last,
                    ProviderError::Status { provider: ProviderId::WeatherApi, status: 503, .. }
                ));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn all_providers_failed_message() {
        let a = ScriptedProvider::failing(ProviderId::OpenWeather, Duration::ZERO);
        let b = ScriptedProvider::failing(ProviderId::WeatherApi, Duration::ZERO);

        let err = coordinator(vec![a, b]).race("Jakarta", None).await.unwrap_err();

        assert!(err.to_string().starts_with("all providers failed"));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_providers_hit_the_deadline() {
        let a = ScriptedProvider::succeeding(ProviderId::OpenWeather, Duration::from_secs(11));
        let b = ScriptedProvider::succeeding(ProviderId::WeatherApi, Duration::from_secs(12));

        let started = Instant::now();
        let err = coordinator(vec![a, b]).race("Jakarta", None).await.unwrap_err();

        assert!(matches!(err, WeatherError::DeadlineExceeded { .. }));
        assert_eq!(started.elapsed(), DEFAULT_RACE_TIMEOUT);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_wins_over_outstanding_failure() {
        let failing = ScriptedProvider::failing(ProviderId::OpenWeather, Duration::from_secs(1));
        let hung = ScriptedProvider::succeeding(ProviderId::WeatherApi, Duration::from_secs(60));

        let err = coordinator(vec![failing, hung]).race("Jakarta", None).await.unwrap_err();

        assert!(matches!(err, WeatherError::DeadlineExceeded { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn parent_deadline_shortens_the_race() {
        let slow = ScriptedProvider::succeeding(ProviderId::OpenWeather, Duration::from_secs(5));

        let started = Instant::now();
        let parent = Deadline::after(Duration::from_secs(2));
        let err = coordinator(vec![slow]).race("Jakarta", Some(parent)).await.unwrap_err();

        assert!(matches!(err, WeatherError::DeadlineExceeded { .. }));
        assert_eq!(started.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_provider_counts_as_failure() {
        let broken = ScriptedProvider::new(ProviderId::OpenWeather, Duration::ZERO, Scripted::Panic);
        let healthy = ScriptedProvider::succeeding(ProviderId::WeatherApi, Duration::from_secs(1));

        let record = coordinator(vec![broken, healthy]).race("Jakarta", None).await.unwrap();

        assert_eq!(record.source, ProviderId::WeatherApi);
    }

    #[tokio::test]
    async fn empty_provider_list_is_rejected() {
        let err = coordinator(vec![]).race("Jakarta", None).await.unwrap_err();
        assert!(matches!(err, WeatherError::NoProviders));
    }

    #[tokio::test(start_paused = true)]
    async fn losers_are_not_awaited() {
        let fast = ScriptedProvider::succeeding(ProviderId::OpenWeather, Duration::from_millis(5));
        let slow = ScriptedProvider::succeeding(ProviderId::WeatherApi, Duration::from_secs(9));

        let started = Instant::now();
        coordinator(vec![fast, slow]).race("Jakarta", None).await.unwrap();

        assert_eq!(started.elapsed(), Duration::from_millis(5));
    }

    #[tokio::test(start_paused = true)]
    async fn losing_fetch_is_cancelled_after_the_race() {
        let flags = Arc::new(FetchFlags::default());
        let winner: Arc<dyn WeatherProvider> =
            ScriptedProvider::succeeding(ProviderId::OpenWeather, Duration::from_millis(5));
        let loser: Arc<dyn WeatherProvider> = Arc::new(TrackedProvider {
            delay: Duration::from_secs(5),
            flags: Arc::clone(&flags),
        });

        let record = RaceCoordinator::new(vec![winner, loser], DEFAULT_RACE_TIMEOUT)
            .race("Jakarta", None)
            .await
            .unwrap();
        assert_eq!(record.source, ProviderId::OpenWeather);

        tokio::time::sleep(Duration::from_secs(6)).await;

        assert!(flags.dropped.load(Ordering::SeqCst));
        assert!(!flags.finished.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn oversized_timeout_does_not_overflow() {
        let deadline = Deadline::after(Duration::MAX);
        assert!(deadline.remaining() > Duration::from_secs(86_400 * 365));

        let fast = ScriptedProvider::succeeding(ProviderId::OpenWeather, Duration::from_millis(5));
        let record = RaceCoordinator::new(vec![fast as Arc<dyn WeatherProvider>], Duration::MAX)
            .race("Jakarta", None)
            .await
            .unwrap();

        assert_eq!(record.source, ProviderId::OpenWeather);
    }

    #[tokio::test(start_paused = true)]
    async fn child_deadline_never_outlives_parent() {
        let parent = Deadline::after(Duration::from_secs(1));
        let child = Deadline::child_of(Some(parent), Duration::from_secs(10));
        assert_eq!(child, parent);

        let parent = Deadline::after(Duration::from_secs(60));
        let child = Deadline::child_of(Some(parent), Duration::from_secs(10));
        assert!(child < parent);
        assert_eq!(child.remaining(), Duration::from_secs(10));
    }
}
