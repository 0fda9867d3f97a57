//! Meterflow - declarative meters over evaluated metric expressions.
//!
//! Meterflow turns named meter definitions into values for a meter system.
//! Each definition pairs a scope with an expression and an aggregation
//! operation; every incoming event is evaluated against it, validated and
//! forwarded as a value stamped with its minute time bucket.
//!
//! # Features
//!
//! - **Scoped entities**: service, service instance and endpoint meters
//! - **Histogram support**: averaged histograms and percentile arguments
//! - **Single registration**: each meter is created exactly once, even under contention
//! - **Per-event drops**: bad evaluations are logged and counted, never fatal
//!
//! # Architecture
//!
//! - `core`: Domain types, configuration and errors
//! - `meter`: Entity resolution, dispatch and the meter system seam
//! - `cli`: Command-line interface
//!
//! # Example
//!
//! ```no_run
//! use meterflow_lib::core::{ConfigBuilder, MeterDefinition, Scope};
//! use meterflow_lib::meter::{InMemoryMeterSystem, MeterProcessService, MeterSystem};
//! use std::sync::Arc;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConfigBuilder::new()
//!         .meter(MeterDefinition::new("requests", Scope::service(), "avg", "requests"))
//!         .build()?;
//!     let system: Arc<dyn MeterSystem> = Arc::new(InMemoryMeterSystem::new());
//!     let service = MeterProcessService::new(&config, system)?;
//!     service.init_meters()?;
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod cli;
pub mod core;
pub mod meter;

// Re-export core types for convenience
pub use crate::core::{Config, Result};
