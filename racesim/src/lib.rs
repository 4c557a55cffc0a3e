//! A time-discrete race simulator.
//!
//! A single `RaceEngine` steps one vehicle around a segment-based track, applying a simple
//! longitudinal physics model and a seeded stochastic incident model. The lobby coordinator
//! runs one engine per participant concurrently behind a rendezvous barrier and aggregates
//! the results into standings.

pub mod core;
pub mod error;
pub mod interfaces;
pub mod post;
pub mod pre;

pub use crate::error::{RaceError, SinkError, ValidationError};
