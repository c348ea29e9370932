#![forbid(unsafe_code)]

//! Domain logic for adaptive mini-tests and per-topic mastery tracking.
//!
//! Everything in this crate is pure and synchronous. Persistence, question
//! delivery and AI analysis live in the `storage` and `services` crates.

pub mod difficulty;
pub mod error;
pub mod mastery;
pub mod model;
pub mod time;

pub use error::Error;
pub use time::Clock;
