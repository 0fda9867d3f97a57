//! Builds one configured meter into the meter system.

use crate::core::config::MeterDefinition;
use crate::core::types::{MeterContext, MeterEntity};
use crate::core::Result;
use crate::meter::dispatch::OperationDispatcher;
use crate::meter::entity::{build_entity, validate_scope};
use crate::meter::eval::Evaluator;
use crate::meter::gate::InitGate;
use crate::meter::stats::DispatchOutcome;
use crate::meter::system::MeterSystem;
use std::sync::Arc;

/// Name a configured meter is registered under in the meter system
pub fn format_meter_name(meter_name: &str) -> String {
    format!("meter_{}", meter_name)
}

/// Registers one meter and sends its values to the meter system
pub struct MeterBuilder {
    definition: MeterDefinition,
    metrics_name: String,
    meter_system: Arc<dyn MeterSystem>,
    dispatcher: Arc<OperationDispatcher>,
    init: InitGate,
}

impl MeterBuilder {
    pub fn new(definition: MeterDefinition, meter_system: Arc<dyn MeterSystem>) -> Self {
        Self::with_dispatcher(definition, meter_system, Arc::new(OperationDispatcher::new()))
    }

    /// Builder sharing a dispatch table with other builders
    pub fn with_dispatcher(
        definition: MeterDefinition,
        meter_system: Arc<dyn MeterSystem>,
        dispatcher: Arc<OperationDispatcher>,
    ) -> Self {
        let metrics_name = format_meter_name(&definition.name);
        Self {
            definition,
            metrics_name,
            meter_system,
            dispatcher,
            init: InitGate::new(),
        }
    }

    /// Registers the meter with the meter system.
    ///
    /// Returns `Ok(true)` if this call registered it and `Ok(false)` if it
    /// already was. Scope and operation defects are returned as errors and
    /// leave the meter unregistered.
    pub fn init_meter(&self) -> Result<bool> {
        validate_scope(&self.metrics_name, &self.definition.scope)?;
        let operation = self.definition.operation()?;
        let scope_type = self.definition.scope.scope_type;

        self.init.register_once(|| {
            self.meter_system
                .create(&self.metrics_name, operation, scope_type)
        })
    }

    /// Returns true once the meter is registered
    pub fn has_init(&self) -> bool {
        self.init.is_registered()
    }

    /// Builds the entity this meter's values are keyed by
    pub fn build_entity(&self, context: &MeterContext) -> Result<MeterEntity> {
        build_entity(&self.metrics_name, &self.definition.scope, context)
    }

    /// Evaluates the meter for one event and forwards the value.
    ///
    /// Only scope defects surface as errors; everything else is a logged
    /// per-event drop reported through the outcome.
    pub fn build_and_send<E: Evaluator + ?Sized>(
        &self,
        context: &MeterContext,
        evaluator: &E,
    ) -> Result<DispatchOutcome> {
        let entity = self.build_entity(context)?;
        Ok(self.dispatcher.dispatch(
            self.meter_system.as_ref(),
            &self.definition,
            &self.metrics_name,
            entity,
            evaluator,
            context.timestamp,
        ))
    }

    /// Registered meter name
    pub fn metrics_name(&self) -> &str {
        &self.metrics_name
    }

    pub fn definition(&self) -> &MeterDefinition {
        &self.definition
    }
}
