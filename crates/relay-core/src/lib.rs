//! Core domain + application logic for the Telegram → Zendesk support relay.
//!
//! This crate is framework-agnostic. Telegram, Zendesk and Slack live behind
//! ports (traits) implemented in adapter crates.

pub mod classify;
pub mod config;
pub mod domain;
pub mod errors;
pub mod formatting;
pub mod intake;
pub mod logging;
pub mod messaging;
pub mod monitor;
pub mod ports;
pub mod registry;
pub mod retry;
pub mod security;

pub use errors::{Error, Result};
