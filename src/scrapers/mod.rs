//! Ingestion pipeline stages.
//!
//! Every source runs through the same stages; only its [`Source`] adapter
//! differs.
//!
//! | Stage | Module | Notes |
//! |-------|--------|-------|
//! | HTTP session | [`fetch`] | Per-source headers and timeout |
//! | Discovery | [`sitemap`] | Sitemap XML or listing page |
//! | Recency filter | [`recency`] | Pure; window and language checks |
//! | Page extraction | [`extract`] | Selector rules, exclusions, cleanup |
//! | Assembly | [`assemble`] | Canonical `Article` record |
//! | Orchestration | [`pipeline`] | Bounded fan-out, fan-in, counters |
//! | Aggregation | [`aggregate`] | All sources, registration order |
//!
//! [`Source`]: crate::config::Source

pub mod aggregate;
pub mod assemble;
pub mod extract;
pub mod fetch;
pub mod pipeline;
pub mod recency;
pub mod sitemap;
