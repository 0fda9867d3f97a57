//! Turns evaluated expressions into typed meter values.
//!
//! Each supported operation has a handler in the dispatcher's table. The
//! dispatcher evaluates, collapses and stamps; the handler only decides
//! whether the evaluated shape fits and builds the value.

use crate::core::config::MeterDefinition;
use crate::core::time::TimeBucket;
use crate::core::types::{MeterEntity, MeterOperation};
use crate::meter::eval::{CombineError, EvalData, Evaluator};
use crate::meter::histogram::{AvgPercentileArgument, BucketedValues};
use crate::meter::stats::{DispatchOutcome, DropReason};
use crate::meter::system::{MeterSystem, MeterValue, ValueKind};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Builds the value of one operation from a collapsed evaluation result
pub trait OperationHandler: Send + Sync {
    /// Value type the meter system expects for this operation
    fn value_kind(&self) -> ValueKind;

    /// Builds the value, or names why the data does not fit
    fn build_value(&self, data: EvalData, percentiles: &[i32]) -> Result<MeterValue, DropReason>;
}

/// `avg`: single values, truncated toward zero
pub struct AvgHandler;

impl OperationHandler for AvgHandler {
    fn value_kind(&self) -> ValueKind {
        ValueKind::Long
    }

    fn build_value(&self, data: EvalData, _percentiles: &[i32]) -> Result<MeterValue, DropReason> {
        match data {
            EvalData::Single(single) => Ok(MeterValue::Long(single.value as i64)),
            EvalData::Histogram(_) => Err(DropReason::ShapeMismatch),
        }
    }
}

/// `avgHistogram`: distributions as bucketed values
pub struct AvgHistogramHandler;

impl OperationHandler for AvgHistogramHandler {
    fn value_kind(&self) -> ValueKind {
        ValueKind::Bucketed
    }

    fn build_value(&self, data: EvalData, _percentiles: &[i32]) -> Result<MeterValue, DropReason> {
        match data {
            EvalData::Histogram(histogram) => Ok(MeterValue::Bucketed(
                BucketedValues::from_distribution(&histogram.buckets),
            )),
            EvalData::Single(_) => Err(DropReason::ShapeMismatch),
        }
    }
}

/// `avgHistogramPercentile`: bucketed values plus percentile ranks
pub struct AvgHistogramPercentileHandler;

impl OperationHandler for AvgHistogramPercentileHandler {
    fn value_kind(&self) -> ValueKind {
        ValueKind::Percentile
    }

    fn build_value(&self, data: EvalData, percentiles: &[i32]) -> Result<MeterValue, DropReason> {
        if percentiles.is_empty() {
            return Err(DropReason::ShapeMismatch);
        }
        match data {
            EvalData::Histogram(histogram) => Ok(MeterValue::Percentile(AvgPercentileArgument::new(
                BucketedValues::from_distribution(&histogram.buckets),
                percentiles.to_vec(),
            ))),
            EvalData::Single(_) => Err(DropReason::ShapeMismatch),
        }
    }
}

/// Dispatch table from operation to handler
pub struct OperationDispatcher {
    handlers: HashMap<MeterOperation, Box<dyn OperationHandler>>,
}

impl OperationDispatcher {
    /// Dispatcher without any handlers
    pub fn empty() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Dispatcher with the handlers of every supported operation
    pub fn new() -> Self {
        Self::empty()
            .with_handler(MeterOperation::Avg, AvgHandler)
            .with_handler(MeterOperation::AvgHistogram, AvgHistogramHandler)
            .with_handler(MeterOperation::AvgHistogramPercentile, AvgHistogramPercentileHandler)
    }

    /// Registers (or replaces) the handler of an operation
    pub fn with_handler<H: OperationHandler + 'static>(mut self, operation: MeterOperation, handler: H) -> Self {
        self.handlers.insert(operation, Box::new(handler));
        self
    }

    fn handler(&self, operation: &str) -> Option<&dyn OperationHandler> {
        let operation: MeterOperation = operation.parse().ok()?;
        self.handlers.get(&operation).map(|handler| handler.as_ref())
    }

    /// Evaluates the meter's expression and forwards the built value.
    ///
    /// Makes at most one `build_metrics` and one `do_streaming_calculation`
    /// call on `system`. Every drop is logged at warn level under
    /// `metrics_name`.
    pub fn dispatch<E: Evaluator + ?Sized>(
        &self,
        system: &dyn MeterSystem,
        definition: &MeterDefinition,
        metrics_name: &str,
        entity: MeterEntity,
        evaluator: &E,
        timestamp: i64,
    ) -> DispatchOutcome {
        let operation = definition.meter.operation.as_str();
        let Some(handler) = self.handler(operation) else {
            warn!(meter = metrics_name, operation, "Cannot support function {}", operation);
            return DispatchOutcome::Dropped(DropReason::UnsupportedOperation);
        };

        let values = match evaluator.evaluate(&definition.meter.value) {
            Ok(values) => values,
            Err(e) => {
                warn!(meter = metrics_name, error = %e, "Building meter value failure");
                return DispatchOutcome::Dropped(DropReason::EvaluationError);
            },
        };

        let data = match values.combine_as_single_data() {
            Ok(data) => data,
            Err(CombineError::Empty) => {
                warn!(meter = metrics_name, "Expression produced no data");
                return DispatchOutcome::Dropped(DropReason::EmptyResult);
            },
            Err(CombineError::MixedKinds) => {
                warn!(meter = metrics_name, "Expression mixed single and histogram values");
                return DispatchOutcome::Dropped(DropReason::ShapeMismatch);
            },
        };

        let kind = data.kind();
        let value = match handler.build_value(data, &definition.meter.percentile) {
            Ok(value) => value,
            Err(reason) => {
                warn!(
                    meter = metrics_name,
                    operation,
                    reason = %reason,
                    "{} function does not support {} value",
                    operation,
                    kind
                );
                return DispatchOutcome::Dropped(reason);
            },
        };

        let time_bucket = match TimeBucket::minute(timestamp) {
            Ok(bucket) => bucket,
            Err(e) => {
                warn!(meter = metrics_name, error = %e, "Event timestamp out of range");
                return DispatchOutcome::Dropped(DropReason::InvalidTimestamp);
            },
        };

        let forwarded = system
            .build_metrics(metrics_name, handler.value_kind())
            .and_then(|mut acceptable| {
                acceptable.accept(entity, value)?;
                acceptable.set_time_bucket(time_bucket);
                system.do_streaming_calculation(acceptable)
            });

        match forwarded {
            Ok(()) => {
                debug!(meter = metrics_name, operation, %time_bucket, "Meter value forwarded");
                DispatchOutcome::Forwarded
            },
            Err(e) => {
                warn!(meter = metrics_name, error = %e, "Meter system rejected value");
                DispatchOutcome::Dropped(DropReason::EngineRejected)
            },
        }
    }
}

impl Default for OperationDispatcher {
    fn default() -> Self {
        Self::new()
    }
}
