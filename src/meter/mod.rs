//! Meter building: from evaluated expressions to meter system values.
//!
//! Flow per event:
//! - `entity` resolves the scope into a [`MeterEntity`](crate::core::MeterEntity)
//! - `dispatch` evaluates the expression and validates its shape
//! - `histogram` reshapes distributions into bucket arrays
//! - `system` receives the stamped value
//!
//! `gate` keeps registration with the meter system to a single call per meter.

pub mod builder;
pub mod dispatch;
pub mod entity;
pub mod eval;
pub mod event;
pub mod gate;
pub mod histogram;
pub mod processor;
pub mod stats;
pub mod system;

pub use builder::{format_meter_name, MeterBuilder};
pub use dispatch::{OperationDispatcher, OperationHandler};
pub use entity::build_entity;
pub use eval::{Distribution, EvalData, EvalMultipleData, Evaluator, SampleEvaluator};
pub use event::{MeterEvent, Sample, SampleValue};
pub use gate::InitGate;
pub use histogram::{AvgPercentileArgument, BucketedValues};
pub use processor::MeterProcessService;
pub use stats::{DispatchOutcome, DispatchStats, DropReason, StatsSnapshot};
pub use system::{AcceptableValue, InMemoryMeterSystem, MeterSystem, MeterValue, RecordedValue, ValueKind};
