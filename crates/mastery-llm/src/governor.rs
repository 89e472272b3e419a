//! Usage Governor - routing, throttling and cost accounting in one place
//!
//! Every LLM call made by the pipeline goes through [`UsageGovernor`]:
//! the model is routed to a provider, the provider's token window is
//! charged with an estimate, the call runs, and its real usage is priced
//! into the ledger.

use crate::completion::{Completion, LlmInvoker};
use crate::cost::{SessionSummary, UsageLedger, UsageRecord};
use crate::error::{Error, Result};
use crate::rate_limiter::RateLimiter;
use crate::router::{ProviderConfig, ProviderRouter};
use std::collections::HashMap;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

/// Default token estimate charged before a call
pub const DEFAULT_ESTIMATED_TOKENS: u64 = 2000;

/// Rate limits plus cost ledger, shared by every agent in the process
#[derive(Debug)]
pub struct UsageGovernor {
    router: ProviderRouter,
    limiters: HashMap<String, RateLimiter>,
    ledger: UsageLedger,
    check_credentials: bool,
}

impl UsageGovernor {
    /// Create a governor with one limiter per provider
    ///
    /// Waits on any limiter end with [`Error::WaitInterrupted`] once
    /// `cancel` fires.
    #[must_use]
    pub fn new(
        providers: Vec<ProviderConfig>,
        ledger: UsageLedger,
        cancel: CancellationToken,
    ) -> Self {
        let limiters = providers
            .iter()
            .map(|p| {
                (
                    p.name.clone(),
                    RateLimiter::with_cancellation(p.tokens_per_minute, cancel.clone()),
                )
            })
            .collect();

        Self {
            router: ProviderRouter::new(providers),
            limiters,
            ledger,
            check_credentials: true,
        }
    }

    /// Skip API key checks (dry runs and tests)
    #[must_use]
    pub fn without_credential_check(mut self) -> Self {
        self.check_credentials = false;
        self
    }

    /// Provider router
    #[must_use]
    pub fn router(&self) -> &ProviderRouter {
        &self.router
    }

    /// Cost ledger
    #[must_use]
    pub fn ledger(&self) -> &UsageLedger {
        &self.ledger
    }

    /// Rate limiter of a provider
    #[must_use]
    pub fn limiter(&self, provider: &str) -> Option<&RateLimiter> {
        self.limiters.get(provider)
    }

    /// Totals for this process
    #[must_use]
    pub fn session_summary(&self) -> SessionSummary {
        self.ledger.session_summary()
    }

    /// Charge `estimated_tokens` against the provider serving `model`
    ///
    /// Unknown models fail before any budget is touched. Returns how long
    /// the caller had to wait.
    #[instrument(skip(self))]
    pub async fn reserve(&self, model: &str, estimated_tokens: u64) -> Result<Duration> {
        let provider = self.router.resolve(model)?;
        if self.check_credentials {
            provider.check_credentials()?;
        }

        let limiter = self
            .limiters
            .get(&provider.name)
            .ok_or_else(|| Error::UnknownProvider(model.to_string()))?;

        if !self.ledger.pricing().is_known(model) {
            debug!("No pricing entry for {model}, fallback rate applies");
        }

        let waited = limiter.acquire(estimated_tokens).await?;
        if !waited.is_zero() {
            debug!(provider = %provider.name, "Waited {:?} for token budget", waited);
        }
        Ok(waited)
    }

    /// Run one governed LLM call
    #[instrument(skip(self, invoker, prompt))]
    pub async fn call<I>(
        &self,
        invoker: &I,
        agent_name: &str,
        model: &str,
        prompt: &str,
        estimated_tokens: u64,
    ) -> Result<Completion>
    where
        I: LlmInvoker + ?Sized,
    {
        self.reserve(model, estimated_tokens).await?;

        let completion = invoker
            .complete(model, prompt)
            .await
            .inspect_err(|e| warn!("LLM call by {agent_name} on {model} failed: {e}"))?;

        self.ledger.log_call(
            agent_name,
            model,
            completion.usage.input_tokens,
            completion.usage.output_tokens,
            prompt,
            &completion.text,
        )?;
        Ok(completion)
    }

    /// Record usage reported by a call made outside the governor
    pub fn record_usage(
        &self,
        agent_name: &str,
        model: &str,
        input_tokens: u64,
        output_tokens: u64,
        prompt_preview: &str,
        response_preview: &str,
    ) -> Result<UsageRecord> {
        self.ledger.log_call(
            agent_name,
            model,
            input_tokens,
            output_tokens,
            prompt_preview,
            response_preview,
        )
    }
}
