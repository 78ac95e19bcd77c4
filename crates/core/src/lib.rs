//! Deterministic core of the shipment assistant.
//!
//! Everything in this crate is pure and network-free:
//! - **Extraction** (`extract`) - ordered pattern rules that spot a tracking
//!   number inside free-form chat text
//! - **Courier resolution** (`directory`) - two-tier lookup over a static
//!   well-known courier table plus a provider-fetched extension list
//! - **Formatting** (`format`) - fixed-template rendering of a provider
//!   tracking record
//! - **Conversation** (`domain::conversation`) - the append-only chat
//!   history with its system-message-first invariant
//!
//! Gateways to the tracking provider and the LLM live in their own crates
//! (`shipmate-tracking`, `shipmate-agent`); this crate only defines the data
//! they exchange.

pub mod config;
pub mod directory;
pub mod domain;
pub mod errors;
pub mod extract;
pub mod format;

pub use directory::{CourierDirectory, CourierResolution, AUTO_DETECT};
pub use domain::conversation::{ChatMessage, Conversation, Role, SYSTEM_INSTRUCTION};
pub use domain::tracking::{CourierEntry, TrackingEvent, TrackingQuery, TrackingRecord};
pub use errors::{ApplicationError, InterfaceError};
pub use extract::{TrackingNumberExtractor, TrackingNumberMatch};
pub use format::{format_tracking_summary, NO_TRACKING_INFO};
