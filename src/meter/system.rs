//! Boundary to the meter system (streaming aggregation engine).
//!
//! The meter system owns windowed computation and persistence. This crate
//! only registers meters with it and hands it fully built values.

use crate::core::time::TimeBucket;
use crate::core::types::{MeterEntity, MeterOperation, ScopeType};
use crate::core::{MeterError, Result};
use crate::meter::histogram::{AvgPercentileArgument, BucketedValues};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Value types accepted by the meter system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ValueKind {
    Long,
    Bucketed,
    Percentile,
}

impl ValueKind {
    /// Value type an operation consumes
    pub fn for_operation(operation: MeterOperation) -> Self {
        match operation {
            MeterOperation::Avg => ValueKind::Long,
            MeterOperation::AvgHistogram => ValueKind::Bucketed,
            MeterOperation::AvgHistogramPercentile => ValueKind::Percentile,
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueKind::Long => f.write_str("long"),
            ValueKind::Bucketed => f.write_str("bucketed"),
            ValueKind::Percentile => f.write_str("percentile"),
        }
    }
}

/// Typed meter value
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum MeterValue {
    Long(i64),
    Bucketed(BucketedValues),
    Percentile(AvgPercentileArgument),
}

impl MeterValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            MeterValue::Long(_) => ValueKind::Long,
            MeterValue::Bucketed(_) => ValueKind::Bucketed,
            MeterValue::Percentile(_) => ValueKind::Percentile,
        }
    }
}

/// A value being assembled for one streaming calculation
#[derive(Debug, Clone, PartialEq)]
pub struct AcceptableValue {
    metrics_name: String,
    kind: ValueKind,
    entity: Option<MeterEntity>,
    value: Option<MeterValue>,
    time_bucket: Option<TimeBucket>,
}

impl AcceptableValue {
    pub fn new<S: Into<String>>(metrics_name: S, kind: ValueKind) -> Self {
        Self {
            metrics_name: metrics_name.into(),
            kind,
            entity: None,
            value: None,
            time_bucket: None,
        }
    }

    /// Binds the entity and value, rejecting values of another kind
    pub fn accept(&mut self, entity: MeterEntity, value: MeterValue) -> Result<()> {
        if value.kind() != self.kind {
            return Err(MeterError::engine(format!(
                "{} accepts {} values, got {}",
                self.metrics_name,
                self.kind,
                value.kind()
            )));
        }
        self.entity = Some(entity);
        self.value = Some(value);
        Ok(())
    }

    pub fn set_time_bucket(&mut self, time_bucket: TimeBucket) {
        self.time_bucket = Some(time_bucket);
    }

    pub fn metrics_name(&self) -> &str {
        &self.metrics_name
    }

    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    pub fn entity(&self) -> Option<&MeterEntity> {
        self.entity.as_ref()
    }

    pub fn value(&self) -> Option<&MeterValue> {
        self.value.as_ref()
    }

    pub fn time_bucket(&self) -> Option<TimeBucket> {
        self.time_bucket
    }
}

/// Streaming aggregation engine consumed by meter builders
pub trait MeterSystem: Send + Sync {
    /// Registers a meter
    fn create(&self, metrics_name: &str, operation: MeterOperation, scope_type: ScopeType) -> Result<()>;

    /// Starts a value for a registered meter
    fn build_metrics(&self, metrics_name: &str, kind: ValueKind) -> Result<AcceptableValue>;

    /// Hands a completed value to the streaming calculation
    fn do_streaming_calculation(&self, value: AcceptableValue) -> Result<()>;
}

/// Registration held by [`InMemoryMeterSystem`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeterRegistration {
    pub operation: MeterOperation,
    pub scope_type: ScopeType,
}

/// A value that reached the streaming calculation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordedValue {
    pub metrics_name: String,
    pub entity: MeterEntity,
    pub value: MeterValue,
    pub time_bucket: TimeBucket,
}

/// Meter system that records what it is handed.
///
/// Used by the CLI to report forwarded values and by tests to observe
/// exactly which calls reached the engine. It performs no window math.
#[derive(Debug, Default)]
pub struct InMemoryMeterSystem {
    meters: DashMap<String, MeterRegistration>,
    recorded: Mutex<Vec<RecordedValue>>,
    create_calls: AtomicUsize,
    build_calls: AtomicUsize,
}

impl InMemoryMeterSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `create` calls received, including idempotent ones
    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::Acquire)
    }

    /// Number of `build_metrics` calls received
    pub fn build_calls(&self) -> usize {
        self.build_calls.load(Ordering::Acquire)
    }

    pub fn registration(&self, metrics_name: &str) -> Option<MeterRegistration> {
        self.meters.get(metrics_name).map(|entry| *entry.value())
    }

    /// Values recorded for one meter, in arrival order
    pub fn recorded(&self, metrics_name: &str) -> Vec<RecordedValue> {
        self.recorded
            .lock()
            .iter()
            .filter(|value| value.metrics_name == metrics_name)
            .cloned()
            .collect()
    }

    /// Every recorded value, in arrival order
    pub fn all_recorded(&self) -> Vec<RecordedValue> {
        self.recorded.lock().clone()
    }

    pub fn recorded_count(&self) -> usize {
        self.recorded.lock().len()
    }
}

impl MeterSystem for InMemoryMeterSystem {
    fn create(&self, metrics_name: &str, operation: MeterOperation, scope_type: ScopeType) -> Result<()> {
        self.create_calls.fetch_add(1, Ordering::AcqRel);

        let registration = MeterRegistration {
            operation,
            scope_type,
        };
        match self.meters.entry(metrics_name.to_string()) {
            Entry::Occupied(existing) if *existing.get() == registration => Ok(()),
            Entry::Occupied(existing) => Err(MeterError::engine(format!(
                "Meter {} already registered as {} on {}",
                metrics_name,
                existing.get().operation,
                existing.get().scope_type
            ))),
            Entry::Vacant(slot) => {
                slot.insert(registration);
                tracing::info!(meter = metrics_name, %operation, scope = %scope_type, "Meter registered");
                Ok(())
            },
        }
    }

    fn build_metrics(&self, metrics_name: &str, kind: ValueKind) -> Result<AcceptableValue> {
        self.build_calls.fetch_add(1, Ordering::AcqRel);

        let registration = self
            .registration(metrics_name)
            .ok_or_else(|| MeterError::engine(format!("Meter {} is not registered", metrics_name)))?;

        let expected = ValueKind::for_operation(registration.operation);
        if expected != kind {
            return Err(MeterError::engine(format!(
                "Meter {} expects {} values, requested {}",
                metrics_name, expected, kind
            )));
        }

        Ok(AcceptableValue::new(metrics_name, kind))
    }

    fn do_streaming_calculation(&self, value: AcceptableValue) -> Result<()> {
        let AcceptableValue {
            metrics_name,
            entity,
            value,
            time_bucket,
            ..
        } = value;

        match (entity, value, time_bucket) {
            (Some(entity), Some(value), Some(time_bucket)) => {
                self.recorded.lock().push(RecordedValue {
                    metrics_name,
                    entity,
                    value,
                    time_bucket,
                });
                Ok(())
            },
            _ => Err(MeterError::engine(format!(
                "Value for {} is incomplete: entity, value and time bucket are required",
                metrics_name
            ))),
        }
    }
}
