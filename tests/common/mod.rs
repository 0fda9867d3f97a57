//! Common test utilities and fixtures.

#![allow(dead_code)]

use meterflow_lib::core::{MeterContext, MeterDefinition, Scope};
use meterflow_lib::meter::{InMemoryMeterSystem, MeterBuilder, MeterEvent, MeterSystem, Sample};
use std::sync::Arc;

/// 2024-03-15 10:42:37.512 UTC
pub const EVENT_TIMESTAMP: i64 = 1_710_499_357_512;

/// Minute bucket of [`EVENT_TIMESTAMP`]
pub const EVENT_BUCKET: i64 = 202_403_151_042;

/// Fresh recording meter system
pub fn recording_system() -> Arc<InMemoryMeterSystem> {
    Arc::new(InMemoryMeterSystem::new())
}

/// Builder over a recording system, returning both
pub fn builder(definition: MeterDefinition) -> (MeterBuilder, Arc<InMemoryMeterSystem>) {
    let system = recording_system();
    let builder = MeterBuilder::new(definition, Arc::clone(&system) as Arc<dyn MeterSystem>);
    (builder, system)
}

pub fn context() -> MeterContext {
    MeterContext::new("checkout", "checkout-pod-1", EVENT_TIMESTAMP)
}

/// `{1.0: 3, 5.0: 2, 10.0: 1}` split over two series so the evaluator has to merge
pub fn latency_samples() -> Vec<Sample> {
    vec![
        Sample::histogram("latency", vec![(10.0, 1), (1.0, 2)]).with_label("region", "eu"),
        Sample::histogram("latency", vec![(5.0, 2), (1.0, 1)]).with_label("region", "us"),
    ]
}

pub fn definition(name: &str, operation: &str, value: &str) -> MeterDefinition {
    MeterDefinition::new(name, Scope::service(), operation, value)
}

/// Event builder with sensible defaults
pub struct TestEventBuilder {
    service: String,
    instance: String,
    timestamp: i64,
    samples: Vec<Sample>,
}

impl TestEventBuilder {
    pub fn new() -> Self {
        Self {
            service: "checkout".to_string(),
            instance: "checkout-pod-1".to_string(),
            timestamp: EVENT_TIMESTAMP,
            samples: Vec::new(),
        }
    }

    pub fn instance(mut self, instance: &str) -> Self {
        self.instance = instance.to_string();
        self
    }

    pub fn timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn sample(mut self, sample: Sample) -> Self {
        self.samples.push(sample);
        self
    }

    pub fn build(self) -> MeterEvent {
        MeterEvent {
            service: self.service,
            service_instance: self.instance,
            timestamp: self.timestamp,
            samples: self.samples,
        }
    }
}
