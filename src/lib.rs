//! Tollgate - Per-Key Admission Control
//!
//! This crate decides, for each incoming request, whether a key may proceed
//! under a sliding-window request limit, a replenishable credit budget, or
//! both combined with the window taking precedence. State is kept per key
//! in-process behind per-key locks.

pub mod clock;
pub mod config;
pub mod console;
pub mod error;
pub mod ranking;
pub mod ratelimit;
