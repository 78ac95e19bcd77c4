//! Tracking provider gateway.
//!
//! Thin request/response mapping to the external tracking provider's `/v4`
//! REST contract. The [`TrackingApi`] trait is the seam the orchestrator
//! depends on; [`TrackingMoreClient`] is the real implementation. Every call
//! is synchronous from the caller's point of view and single-attempt - retry
//! policy, if any, belongs behind this seam, not in front of it.

pub mod client;

pub use client::{TrackingApi, TrackingError, TrackingMoreClient};
