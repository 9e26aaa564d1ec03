//! Quota-aware enrichment of media sources with influence scores.
//!
//! The heart of the crate is [`crate::core::quota`]: a per-provider persistent
//! cache plus a durable quota ledger that tracks either an hourly call rate
//! or a daily quota-unit budget. Provider clients reach it only through the
//! [`crate::core::client::ProviderClient`] contract.

pub mod core;
