//! Mastery LLM - usage governance for LLM calls
//!
//! This crate keeps LLM spending and throughput in check:
//! - RateLimiter: sliding 60 second token window per provider
//! - Cost: pricing table, append-only JSONL ledger and cost report
//! - Router: maps model names to providers and their limits
//! - Governor: routes, throttles, invokes and records a call
//! - Completion: the contract an LLM backend implements

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod completion;
pub mod cost;
pub mod error;
pub mod governor;
pub mod rate_limiter;
pub mod router;

pub use completion::{Completion, LlmInvoker, TokenUsage};
pub use cost::{
    aggregate, calculate_cost, format_report, round_cost, CallCost, GroupStats, LedgerSummary,
    ModelRate, PricingEntry, PricingTable, SessionSummary, UsageLedger, UsageRecord, UsageTotals,
    NO_CALLS_MESSAGE,
};
pub use error::{Error, Result};
pub use governor::{UsageGovernor, DEFAULT_ESTIMATED_TOKENS};
pub use rate_limiter::RateLimiter;
pub use router::{default_providers, ProviderConfig, ProviderRouter};
