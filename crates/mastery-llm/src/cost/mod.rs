//! Cost Tracking - LLM usage ledger and cost reporting
//!
//! Every call is priced and appended to a JSONL ledger that survives
//! restarts. Reports are always rebuilt from the full ledger.
//!
//! # Module Structure
//!
//! - `pricing`: per-model rates and cost arithmetic
//! - `record`: ledger line type and aggregation
//! - `ledger`: the append-only ledger and in-memory session totals
//! - `report`: fixed-width text rendering

mod ledger;
mod pricing;
mod record;
mod report;


pub use ledger::UsageLedger;
pub use pricing::{calculate_cost, round_cost, CallCost, ModelRate, PricingEntry, PricingTable};
pub use record::{aggregate, GroupStats, LedgerSummary, SessionSummary, UsageRecord, UsageTotals};
pub use report::{format_report, NO_CALLS_MESSAGE};
