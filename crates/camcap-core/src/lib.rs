//! Core domain + application logic for the camera-capture Telegram bot.
//!
//! This crate is intentionally transport-agnostic. Telegram and the camera
//! live behind ports (traits) implemented in adapter crates.

pub mod commands;
pub mod config;
pub mod dispatch;
pub mod domain;
pub mod errors;
pub mod logging;
pub mod motion;
pub mod offset;
pub mod poller;
pub mod ports;

#[cfg(test)]
pub(crate) mod testutil;

pub use errors::{Error, Result};
