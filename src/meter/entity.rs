//! Resolves the entity a meter value is keyed by.

use crate::core::types::{MeterContext, MeterEntity, Scope, ScopeType};
use crate::core::{MeterError, Result};

/// Builds the entity for `scope` from the event context.
///
/// Endpoint entities take the endpoint name from the scope definition, not
/// from the event. A missing or blank endpoint name is a configuration
/// defect and fails rather than producing an empty identity.
pub fn build_entity(metrics_name: &str, scope: &Scope, context: &MeterContext) -> Result<MeterEntity> {
    match scope.scope_type {
        ScopeType::Service => Ok(MeterEntity::new_service(context.service.as_str())),
        ScopeType::ServiceInstance => Ok(MeterEntity::new_service_instance(
            context.service.as_str(),
            context.service_instance.as_str(),
        )),
        ScopeType::Endpoint => {
            let endpoint = endpoint_name(metrics_name, scope)?;
            Ok(MeterEntity::new_endpoint(context.service.as_str(), endpoint))
        },
    }
}

/// Checks that an entity can be built for `scope` at all
pub fn validate_scope(metrics_name: &str, scope: &Scope) -> Result<()> {
    match scope.scope_type {
        ScopeType::Endpoint => endpoint_name(metrics_name, scope).map(|_| ()),
        ScopeType::Service | ScopeType::ServiceInstance => Ok(()),
    }
}

fn endpoint_name<'a>(metrics_name: &str, scope: &'a Scope) -> Result<&'a str> {
    scope
        .endpoint
        .as_deref()
        .filter(|endpoint| !endpoint.trim().is_empty())
        .ok_or_else(|| MeterError::MissingEndpoint {
            meter: metrics_name.to_string(),
        })
}
