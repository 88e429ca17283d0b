//! Test infrastructure for the audit relay.
//!
//! Provides a mock collector that records delivered batches and builders for
//! provider payloads and canonical events.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod fixtures;
pub mod http;

pub use fixtures::{event, PayloadBuilder};
pub use http::{CollectorResponse, MockCollector};
