use crate::core::error::{MeterError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Granularity at which a meter's entity is resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ScopeType {
    /// Keyed by service name
    Service,
    /// Keyed by service and instance name
    ServiceInstance,
    /// Keyed by service and the endpoint named in the scope definition
    Endpoint,
}

impl ScopeType {
    /// Returns the configuration spelling of the scope type
    pub fn as_str(&self) -> &'static str {
        match self {
            ScopeType::Service => "SERVICE",
            ScopeType::ServiceInstance => "SERVICE_INSTANCE",
            ScopeType::Endpoint => "ENDPOINT",
        }
    }
}

impl FromStr for ScopeType {
    type Err = MeterError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "SERVICE" => Ok(ScopeType::Service),
            "SERVICE_INSTANCE" => Ok(ScopeType::ServiceInstance),
            "ENDPOINT" => Ok(ScopeType::Endpoint),
            other => Err(MeterError::UnsupportedScope(other.to_string())),
        }
    }
}

impl TryFrom<String> for ScopeType {
    type Error = MeterError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<ScopeType> for String {
    fn from(value: ScopeType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for ScopeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scope definition of a meter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scope {
    /// Scope type
    #[serde(rename = "type")]
    pub scope_type: ScopeType,
    /// Endpoint name, only meaningful for [`ScopeType::Endpoint`]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

impl Scope {
    /// Service scope
    pub fn service() -> Self {
        Self {
            scope_type: ScopeType::Service,
            endpoint: None,
        }
    }

    /// Service instance scope
    pub fn service_instance() -> Self {
        Self {
            scope_type: ScopeType::ServiceInstance,
            endpoint: None,
        }
    }

    /// Endpoint scope bound to a fixed endpoint name
    pub fn endpoint<S: Into<String>>(endpoint: S) -> Self {
        Self {
            scope_type: ScopeType::Endpoint,
            endpoint: Some(endpoint.into()),
        }
    }
}

/// Aggregation operations understood by the meter system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MeterOperation {
    /// Average of single values
    Avg,
    /// Average of bucketed distributions
    AvgHistogram,
    /// Average of bucketed distributions with percentile calculation
    AvgHistogramPercentile,
}

impl MeterOperation {
    /// All supported operations
    pub const ALL: [MeterOperation; 3] = [
        MeterOperation::Avg,
        MeterOperation::AvgHistogram,
        MeterOperation::AvgHistogramPercentile,
    ];

    /// Returns the configuration spelling of the operation
    pub fn as_str(&self) -> &'static str {
        match self {
            MeterOperation::Avg => "avg",
            MeterOperation::AvgHistogram => "avgHistogram",
            MeterOperation::AvgHistogramPercentile => "avgHistogramPercentile",
        }
    }

    /// Returns true if the operation consumes distributions
    pub fn is_histogram(&self) -> bool {
        !matches!(self, MeterOperation::Avg)
    }

    /// Returns true if the operation needs a percentile list
    pub fn requires_percentiles(&self) -> bool {
        matches!(self, MeterOperation::AvgHistogramPercentile)
    }
}

impl FromStr for MeterOperation {
    type Err = MeterError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| MeterError::config(format!("Unsupported meter operation: {}", s)))
    }
}

impl fmt::Display for MeterOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity a meter value is keyed by
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum MeterEntity {
    /// Service entity
    Service { service_name: String },
    /// Service instance entity
    ServiceInstance {
        service_name: String,
        instance_name: String,
    },
    /// Endpoint entity
    Endpoint {
        service_name: String,
        endpoint_name: String,
    },
}

impl MeterEntity {
    /// Creates a service entity
    pub fn new_service<S: Into<String>>(service_name: S) -> Self {
        MeterEntity::Service {
            service_name: service_name.into(),
        }
    }

    /// Creates a service instance entity
    pub fn new_service_instance<S: Into<String>, I: Into<String>>(
        service_name: S,
        instance_name: I,
    ) -> Self {
        MeterEntity::ServiceInstance {
            service_name: service_name.into(),
            instance_name: instance_name.into(),
        }
    }

    /// Creates an endpoint entity
    pub fn new_endpoint<S: Into<String>, E: Into<String>>(service_name: S, endpoint_name: E) -> Self {
        MeterEntity::Endpoint {
            service_name: service_name.into(),
            endpoint_name: endpoint_name.into(),
        }
    }

    /// Scope type this entity was built for
    pub fn scope_type(&self) -> ScopeType {
        match self {
            MeterEntity::Service { .. } => ScopeType::Service,
            MeterEntity::ServiceInstance { .. } => ScopeType::ServiceInstance,
            MeterEntity::Endpoint { .. } => ScopeType::Endpoint,
        }
    }

    /// Service the entity belongs to
    pub fn service_name(&self) -> &str {
        match self {
            MeterEntity::Service { service_name }
            | MeterEntity::ServiceInstance { service_name, .. }
            | MeterEntity::Endpoint { service_name, .. } => service_name,
        }
    }
}

impl fmt::Display for MeterEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MeterEntity::Service { service_name } => write!(f, "{}", service_name),
            MeterEntity::ServiceInstance {
                service_name,
                instance_name,
            } => write!(f, "{}[{}]", service_name, instance_name),
            MeterEntity::Endpoint {
                service_name,
                endpoint_name,
            } => write!(f, "{}:{}", service_name, endpoint_name),
        }
    }
}

/// Runtime context of the event a meter value is built from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeterContext {
    /// Reporting service
    pub service: String,
    /// Reporting service instance
    pub service_instance: String,
    /// Event timestamp in milliseconds since the Unix epoch
    pub timestamp: i64,
}

impl MeterContext {
    /// Creates a new context
    pub fn new<S: Into<String>, I: Into<String>>(service: S, service_instance: I, timestamp: i64) -> Self {
        Self {
            service: service.into(),
            service_instance: service_instance.into(),
            timestamp,
        }
    }
}
