//! Meter events as reported by agents.

use crate::core::types::MeterContext;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Value of a reported sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SampleValue {
    /// Single numeric reading
    Single { value: f64 },
    /// `[boundary, count]` pairs
    Histogram { buckets: Vec<(f64, i64)> },
}

/// One labeled series reported with an event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(flatten)]
    pub value: SampleValue,
}

impl Sample {
    /// Creates an unlabeled single-value sample
    pub fn single<S: Into<String>>(name: S, value: f64) -> Self {
        Self {
            name: name.into(),
            labels: BTreeMap::new(),
            value: SampleValue::Single { value },
        }
    }

    /// Creates an unlabeled histogram sample
    pub fn histogram<S: Into<String>>(name: S, buckets: Vec<(f64, i64)>) -> Self {
        Self {
            name: name.into(),
            labels: BTreeMap::new(),
            value: SampleValue::Histogram { buckets },
        }
    }

    /// Adds a label
    pub fn with_label<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }
}

/// A batch of samples reported by one service instance at one instant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeterEvent {
    pub service: String,
    pub service_instance: String,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
    #[serde(default)]
    pub samples: Vec<Sample>,
}

impl MeterEvent {
    /// Context used for entity resolution and time bucketing
    pub fn context(&self) -> MeterContext {
        MeterContext::new(self.service.as_str(), self.service_instance.as_str(), self.timestamp)
    }
}
