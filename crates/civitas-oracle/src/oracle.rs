//! The LLM-backed [`DecisionOracle`].
//!
//! Holds every piece of per-run oracle state: the provider pool, the rate
//! limiter, the decision cache, and call statistics. Lifecycle is
//! `init` -> calls -> `shutdown`.
//!
//! A call renders the prompt once, then makes up to `max_attempts`
//! attempts with the configured delays between them:
//!
//! - 401 disables the provider and the next attempt goes to the next one
//! - 429 backs the provider off for twice its cooldown
//! - any other failure counts toward the provider's consecutive failures
//!
//! The tick loop wraps each call in a hard deadline, which may cut the
//! retry schedule short.

use std::time::{Duration, Instant};

use civitas_core::config::OracleConfig;
use civitas_core::decision::{DecisionOracle, OracleError};
use civitas_types::{
    ConversationContext, ConversationPayload, DailySchedule, DecisionContext, DecisionPayload,
    Personality, PersonalitySeed, ScheduleRequest,
};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cache::{CacheKey, DecisionCache};
use crate::config::{ProviderConfig, resolve_providers};
use crate::error::LlmError;
use crate::parse::{parse_payload, parse_schedule};
use crate::prompt::{PromptEngine, PromptKind};
use crate::provider::ProviderPool;
use crate::rate_limit::RateLimiter;

/// Counters for one oracle run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OracleStats {
    /// HTTP requests sent.
    pub requests: u64,
    /// Calls that returned text.
    pub successes: u64,
    /// Calls that gave up.
    pub failures: u64,
    /// Decisions served from the cache.
    pub cache_hits: u64,
    /// Decisions refused by the minimum request interval.
    pub throttled: u64,
}

/// Decision oracle backed by remote LLM providers.
pub struct LlmOracle {
    pool: ProviderPool,
    prompts: PromptEngine,
    limiter: RateLimiter,
    cache: DecisionCache,
    retry_delays: Vec<Duration>,
    max_attempts: u32,
    min_request_interval: Duration,
    last_decision_at: Option<Instant>,
    stats: OracleStats,
}

impl LlmOracle {
    /// Build the oracle from config, reading provider keys from the
    /// environment.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::Template`] if a built-in template is broken.
    pub fn init(config: &OracleConfig) -> Result<Self, LlmError> {
        let providers = if config.enabled {
            resolve_providers(&config.providers, |name| std::env::var(name).ok())
        } else {
            Vec::new()
        };
        Self::with_providers(config, &providers)
    }

    /// Build the oracle with an explicit provider list.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::Template`] if a built-in template is broken.
    pub fn with_providers(
        config: &OracleConfig,
        providers: &[ProviderConfig],
    ) -> Result<Self, LlmError> {
        let oracle = Self {
            pool: ProviderPool::new(providers, config.max_consecutive_failures),
            prompts: PromptEngine::new()?,
            limiter: RateLimiter::new(config.rate_limits.clone()),
            cache: DecisionCache::new(
                Duration::from_millis(config.cache_ttl_ms),
                config.cache_max_entries,
            ),
            retry_delays: config
                .retry_delays_ms
                .iter()
                .map(|ms| Duration::from_millis(*ms))
                .collect(),
            max_attempts: config.max_attempts.max(1),
            min_request_interval: Duration::from_millis(config.min_request_interval_ms),
            last_decision_at: None,
            stats: OracleStats::default(),
        };

        match oracle.pool.current_kind() {
            Some(provider) => info!(
                provider = %provider,
                usable = oracle.pool.usable(),
                "Oracle initialized"
            ),
            None => warn!("No oracle provider configured, agents run on local fallbacks"),
        }
        Ok(oracle)
    }

    /// Whether any provider can be called.
    pub fn is_available(&self) -> bool {
        self.pool.current().is_some()
    }

    /// Counters so far.
    pub const fn stats(&self) -> OracleStats {
        self.stats
    }

    /// Delay before retry number `retry` (0-based). Reuses the last delay
    /// when the schedule is shorter than the attempts.
    fn retry_delay(&self, retry: u32) -> Duration {
        let index = usize::try_from(retry).unwrap_or(usize::MAX);
        self.retry_delays
            .get(index)
            .or_else(|| self.retry_delays.last())
            .copied()
            .unwrap_or(Duration::ZERO)
    }

    /// Render a prompt and send it, retrying and rotating providers.
    async fn call<C: Serialize + Sync>(
        &mut self,
        kind: PromptKind,
        context: &C,
    ) -> Result<String, LlmError> {
        let prompt = self.prompts.render(kind, context)?;
        let mut last_error = LlmError::NoProvider;

        for attempt in 0..self.max_attempts {
            if attempt > 0 {
                let delay = self.retry_delay(attempt.saturating_sub(1));
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            }

            let Some(backend) = self.pool.current() else {
                break;
            };
            let provider = backend.provider();

            let wait = self.limiter.wait_time(provider.name(), Instant::now());
            if !wait.is_zero() {
                if wait > self.limiter.cooldown(provider.name()) {
                    debug!(provider = %provider, wait_ms = millis(wait), "Provider rate limited");
                    self.stats.failures = self.stats.failures.saturating_add(1);
                    return Err(LlmError::RateLimited {
                        provider: provider.name().to_owned(),
                        retry_after_ms: millis(wait),
                    });
                }
                tokio::time::sleep(wait).await;
            }

            self.limiter.record(provider.name(), Instant::now());
            self.stats.requests = self.stats.requests.saturating_add(1);
            let result = backend.complete(&prompt).await;

            match result {
                Ok(text) => {
                    self.pool.record_success();
                    self.stats.successes = self.stats.successes.saturating_add(1);
                    debug!(provider = %provider, kind = ?kind, attempt, "Oracle call succeeded");
                    return Ok(text);
                }
                Err(LlmError::Unauthorized { provider: name }) => {
                    warn!(provider = %name, "API key rejected");
                    self.pool.disable_current();
                    last_error = LlmError::Unauthorized { provider: name };
                }
                Err(LlmError::RateLimited { provider: name, .. }) => {
                    let backoff = self.limiter.back_off(&name, Instant::now());
                    warn!(provider = %name, backoff_ms = millis(backoff), "Provider returned 429");
                    self.pool.record_failure();
                    last_error = LlmError::RateLimited {
                        provider: name,
                        retry_after_ms: millis(backoff),
                    };
                }
                Err(err) => {
                    warn!(provider = %provider, attempt, error = %err, "Oracle call failed");
                    self.pool.record_failure();
                    last_error = err;
                }
            }
        }

        self.stats.failures = self.stats.failures.saturating_add(1);
        Err(last_error)
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl DecisionOracle for LlmOracle {
    async fn get_decision(
        &mut self,
        context: &DecisionContext,
    ) -> Result<DecisionPayload, OracleError> {
        let now = Instant::now();
        let key = CacheKey::for_context(context);
        if let Some(hit) = self.cache.get(&key, now) {
            self.stats.cache_hits = self.stats.cache_hits.saturating_add(1);
            return Ok(hit);
        }

        if let Some(last) = self.last_decision_at {
            let since = now.saturating_duration_since(last);
            if since < self.min_request_interval {
                self.stats.throttled = self.stats.throttled.saturating_add(1);
                let wait = self.min_request_interval.saturating_sub(since);
                return Err(OracleError::RateLimited {
                    provider: "local".to_owned(),
                    retry_after_ms: millis(wait),
                });
            }
        }
        self.last_decision_at = Some(now);

        let text = self.call(PromptKind::Decision, context).await?;
        let payload: DecisionPayload = parse_payload(&text)?;
        self.cache.insert(key, payload.clone(), Instant::now());
        Ok(payload)
    }

    async fn generate_conversation(
        &mut self,
        context: &ConversationContext,
    ) -> Result<ConversationPayload, OracleError> {
        let text = self.call(PromptKind::Conversation, context).await?;
        Ok(parse_payload(&text)?)
    }

    async fn generate_personality(
        &mut self,
        seed: &PersonalitySeed,
    ) -> Result<Personality, OracleError> {
        let text = self.call(PromptKind::Personality, seed).await?;
        let personality: Personality = parse_payload(&text)?;
        if personality.traits.is_empty() {
            return Err(OracleError::Parse {
                reason: "personality has no traits".to_owned(),
            });
        }
        Ok(personality)
    }

    async fn generate_daily_schedule(
        &mut self,
        request: &ScheduleRequest,
    ) -> Result<DailySchedule, OracleError> {
        let text = self.call(PromptKind::Schedule, request).await?;
        Ok(parse_schedule(&text)?)
    }

    async fn shutdown(&mut self) {
        let stats = self.stats;
        info!(
            requests = stats.requests,
            successes = stats.successes,
            failures = stats.failures,
            cache_hits = stats.cache_hits,
            throttled = stats.throttled,
            cached = self.cache.len(),
            "Oracle shut down"
        );
        self.cache.clear();
        self.limiter.clear();
        self.last_decision_at = None;
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects
)]
mod tests {
    use std::collections::BTreeMap;

    use civitas_types::{AgentId, NeedSummary, TimeSlot, Weather};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use super::*;
    use crate::config::ProviderKind;

    // -----------------------------------------------------------------------
    // Canned HTTP provider
    // -----------------------------------------------------------------------

    async fn read_request(socket: &mut tokio::net::TcpStream) {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let read = socket.read(&mut chunk).await.unwrap();
            if read == 0 {
                return;
            }
            buf.extend_from_slice(&chunk[..read]);
            let text = String::from_utf8_lossy(&buf).to_string();
            if let Some(header_end) = text.find("\r\n\r\n") {
                let length = text[..header_end]
                    .lines()
                    .find_map(|line| {
                        let lower = line.to_lowercase();
                        lower
                            .strip_prefix("content-length:")
                            .map(|v| v.trim().parse::<usize>().unwrap())
                    })
                    .unwrap_or(0);
                if buf.len() >= header_end + 4 + length {
                    return;
                }
            }
        }
    }

    /// Serve one canned response per connection, in order. Returns the
    /// base URL.
    async fn serve(responses: Vec<(u16, String)>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            for (status, body) in responses {
                let (mut socket, _) = listener.accept().await.unwrap();
                read_request(&mut socket).await;
                let response = format!(
                    "HTTP/1.1 {status} Canned\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                );
                socket.write_all(response.as_bytes()).await.unwrap();
                let _ = socket.shutdown().await;
            }
        });
        format!("http://{addr}/v1")
    }

    fn chat_reply(content: &str) -> String {
        serde_json::json!({
            "choices": [{"message": {"content": content}}]
        })
        .to_string()
    }

    fn make_config() -> OracleConfig {
        OracleConfig {
            retry_delays_ms: vec![0, 0, 0],
            min_request_interval_ms: 0,
            rate_limits: BTreeMap::new(),
            ..OracleConfig::default()
        }
    }

    fn make_provider(kind: ProviderKind, api_url: &str) -> ProviderConfig {
        ProviderConfig {
            kind,
            api_url: api_url.to_owned(),
            api_key: "test".to_owned(),
            model: "test-model".to_owned(),
        }
    }

    fn make_context(agent_id: AgentId) -> DecisionContext {
        DecisionContext {
            agent_id,
            name: "Ada".to_owned(),
            occupation: "engineer".to_owned(),
            location: None,
            residence: None,
            game_time: "12:15".to_owned(),
            time_slot: TimeSlot::Afternoon,
            weather: Weather::Cloudy,
            needs: NeedSummary {
                energy: 70.0,
                hunger: 60.0,
                stress: 20.0,
                social_needs: 30.0,
                happiness: 80.0,
            },
            nearby_buildings: Vec::new(),
            planned_activities: Vec::new(),
            recent_memories: Vec::new(),
        }
    }

    const EAT: &str = r#"{"action": "eat", "target": "Corner Cafe", "reason": "lunch", "energyCost": 5, "stressImpact": -2}"#;

    // -----------------------------------------------------------------------
    // Tests
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn no_provider_is_unavailable() {
        let mut oracle = LlmOracle::with_providers(&make_config(), &[]).unwrap();
        assert!(!oracle.is_available());
        let result = oracle.get_decision(&make_context(AgentId::new())).await;
        assert!(matches!(result, Err(OracleError::Unavailable { .. })));
    }

    #[tokio::test]
    async fn decision_round_trip_and_cache() {
        let url = serve(vec![(200, chat_reply(EAT))]).await;
        let mut oracle =
            LlmOracle::with_providers(&make_config(), &[make_provider(ProviderKind::OpenAi, &url)])
                .unwrap();
        let context = make_context(AgentId::new());

        let first = oracle.get_decision(&context).await.unwrap();
        assert_eq!(first.action.as_deref(), Some("eat"));

        // The server only answers once; the second call must hit the cache.
        let second = oracle.get_decision(&context).await.unwrap();
        assert_eq!(second, first);
        assert_eq!(oracle.stats().requests, 1);
        assert_eq!(oracle.stats().cache_hits, 1);
    }

    #[tokio::test]
    async fn server_error_is_retried() {
        let url = serve(vec![
            (500, "{\"error\": \"overloaded\"}".to_owned()),
            (200, chat_reply(EAT)),
        ])
        .await;
        let mut oracle =
            LlmOracle::with_providers(&make_config(), &[make_provider(ProviderKind::DeepSeek, &url)])
                .unwrap();

        let payload = oracle.get_decision(&make_context(AgentId::new())).await.unwrap();
        assert_eq!(payload.target.as_deref(), Some("Corner Cafe"));
        assert_eq!(oracle.stats().requests, 2);
    }

    #[tokio::test]
    async fn rejected_key_fails_over() {
        let bad = serve(vec![(401, "{}".to_owned())]).await;
        let good = serve(vec![(200, chat_reply(EAT))]).await;
        let mut oracle = LlmOracle::with_providers(
            &make_config(),
            &[
                make_provider(ProviderKind::OpenAi, &bad),
                make_provider(ProviderKind::Step, &good),
            ],
        )
        .unwrap();

        let payload = oracle.get_decision(&make_context(AgentId::new())).await.unwrap();
        assert_eq!(payload.action.as_deref(), Some("eat"));
        assert_eq!(oracle.pool.current_kind(), Some(ProviderKind::Step));
        assert_eq!(oracle.pool.usable(), 1);
    }

    #[tokio::test]
    async fn persistent_failure_surfaces_last_error() {
        let url = serve(vec![
            (500, "a".to_owned()),
            (502, "b".to_owned()),
            (503, "c".to_owned()),
        ])
        .await;
        let mut oracle =
            LlmOracle::with_providers(&make_config(), &[make_provider(ProviderKind::OpenAi, &url)])
                .unwrap();

        match oracle.get_decision(&make_context(AgentId::new())).await {
            Err(OracleError::Provider { provider, message }) => {
                assert_eq!(provider, "openai");
                assert!(message.contains("503"));
            }
            other => panic!("Expected Provider, got {other:?}"),
        }
        assert_eq!(oracle.stats().failures, 1);
    }

    #[tokio::test]
    async fn min_interval_throttles_decisions() {
        let url = serve(vec![(200, chat_reply(EAT))]).await;
        let config = OracleConfig {
            min_request_interval_ms: 60_000,
            ..make_config()
        };
        let mut oracle =
            LlmOracle::with_providers(&config, &[make_provider(ProviderKind::OpenAi, &url)]).unwrap();

        oracle.get_decision(&make_context(AgentId::new())).await.unwrap();
        let second = oracle.get_decision(&make_context(AgentId::new())).await;
        match second {
            Err(OracleError::RateLimited { provider, .. }) => assert_eq!(provider, "local"),
            other => panic!("Expected RateLimited, got {other:?}"),
        }
        assert_eq!(oracle.stats().throttled, 1);
    }

    #[tokio::test]
    async fn garbage_reply_is_a_parse_error() {
        let url = serve(vec![(200, chat_reply("I would rather not say."))]).await;
        let mut oracle =
            LlmOracle::with_providers(&make_config(), &[make_provider(ProviderKind::OpenAi, &url)])
                .unwrap();
        let result = oracle.get_decision(&make_context(AgentId::new())).await;
        assert!(matches!(result, Err(OracleError::Parse { .. })));
    }

    #[tokio::test]
    async fn schedule_and_personality_are_parsed() {
        let schedule = r#"{"morning": [{"time": "08:00", "action": "work", "location": "office"}], "evening": ["dinner"]}"#;
        let personality = r#"{"traits": ["calm", "kind"], "interests": ["tea"], "values": [], "goals": []}"#;
        let url = serve(vec![(200, chat_reply(schedule)), (200, chat_reply(personality))]).await;
        let mut oracle =
            LlmOracle::with_providers(&make_config(), &[make_provider(ProviderKind::OpenAi, &url)])
                .unwrap();

        let request = ScheduleRequest {
            name: "Ada".to_owned(),
            occupation: "engineer".to_owned(),
            personality: Personality::default(),
        };
        let day = oracle.generate_daily_schedule(&request).await.unwrap();
        assert_eq!(day.activities(TimeSlot::Evening), ["dinner".to_owned()]);

        let seed = PersonalitySeed {
            name: "Ada".to_owned(),
            occupation: "engineer".to_owned(),
            traits: Vec::new(),
        };
        let profile = oracle.generate_personality(&seed).await.unwrap();
        assert_eq!(profile.traits.len(), 2);
    }

    #[tokio::test]
    async fn shutdown_clears_the_cache() {
        let url = serve(vec![(200, chat_reply(EAT))]).await;
        let mut oracle =
            LlmOracle::with_providers(&make_config(), &[make_provider(ProviderKind::OpenAi, &url)])
                .unwrap();
        oracle.get_decision(&make_context(AgentId::new())).await.unwrap();
        assert_eq!(oracle.cache.len(), 1);
        oracle.shutdown().await;
        assert!(oracle.cache.is_empty());
    }

    #[test]
    fn retry_delay_reuses_the_last_step() {
        let config = OracleConfig {
            retry_delays_ms: vec![2000, 5000],
            ..OracleConfig::default()
        };
        let oracle = LlmOracle::with_providers(&config, &[]).unwrap();
        assert_eq!(oracle.retry_delay(0), Duration::from_secs(2));
        assert_eq!(oracle.retry_delay(1), Duration::from_secs(5));
        assert_eq!(oracle.retry_delay(7), Duration::from_secs(5));
    }
}
