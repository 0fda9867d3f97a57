//! Core domain types, configuration and errors for meterflow.

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod time;
pub mod types;

// Re-export commonly used types
pub use config::{Config, ConfigBuilder, LogLevel, MeterDefinition, MeterFunction};
pub use error::{EvalError, MeterError, Result};
pub use time::TimeBucket;
pub use types::{MeterContext, MeterEntity, MeterOperation, Scope, ScopeType};
