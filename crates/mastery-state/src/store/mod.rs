//! Store - pipeline state persistence using SQLite
//!
//! Three tables back the store: `tasks`, `crew_runs` and `phases`.
//! Every write is a single statement, so a crash between calls never
//! leaves a half-written row behind.

mod helpers;
mod state_store;

#[cfg(test)]
mod tests;

pub use state_store::StateStore;
