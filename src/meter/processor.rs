//! Fans meter events out to every configured meter.

use crate::core::config::Config;
use crate::core::Result;
use crate::meter::builder::MeterBuilder;
use crate::meter::dispatch::OperationDispatcher;
use crate::meter::eval::SampleEvaluator;
use crate::meter::event::MeterEvent;
use crate::meter::stats::{DispatchStats, StatsSnapshot};
use crate::meter::system::MeterSystem;
use rayon::prelude::*;
use std::sync::Arc;

/// Processes meter events against all configured meters
pub struct MeterProcessService {
    builders: Vec<MeterBuilder>,
    stats: DispatchStats,
}

impl MeterProcessService {
    /// Creates one builder per configured meter, sharing one dispatch table
    pub fn new(config: &Config, meter_system: Arc<dyn MeterSystem>) -> Result<Self> {
        config.validate()?;

        let dispatcher = Arc::new(OperationDispatcher::new());
        let builders = config
            .meters
            .iter()
            .map(|definition| {
                MeterBuilder::with_dispatcher(
                    definition.clone(),
                    Arc::clone(&meter_system),
                    Arc::clone(&dispatcher),
                )
            })
            .collect();

        Ok(Self {
            builders,
            stats: DispatchStats::new(),
        })
    }

    /// Registers every meter that is not registered yet
    pub fn init_meters(&self) -> Result<()> {
        for builder in &self.builders {
            if !builder.has_init() && builder.init_meter()? {
                tracing::debug!(meter = builder.metrics_name(), "Meter initialized");
            }
        }
        Ok(())
    }

    /// Runs every meter over one event.
    ///
    /// Safe to call from many threads; a caller hitting a meter whose
    /// registration is in flight waits for it before dispatching.
    pub fn process(&self, event: &MeterEvent) -> Result<()> {
        self.process_into(event, &self.stats)
    }

    /// Runs every meter over a batch of events on the rayon pool.
    ///
    /// Meters are registered up front. Returns the outcome counts of this
    /// batch only; they are added to the service totals once the whole
    /// batch succeeded.
    pub fn process_batch(&self, events: &[MeterEvent]) -> Result<StatsSnapshot> {
        self.init_meters()?;

        let batch = DispatchStats::new();
        events
            .par_iter()
            .try_for_each(|event| self.process_into(event, &batch))?;

        let snapshot = batch.snapshot();
        self.stats.absorb(&snapshot);
        Ok(snapshot)
    }

    fn process_into(&self, event: &MeterEvent, stats: &DispatchStats) -> Result<()> {
        let context = event.context();
        let evaluator = SampleEvaluator::new(&event.samples);

        for builder in &self.builders {
            if !builder.has_init() {
                builder.init_meter()?;
            }
            stats.record(builder.build_and_send(&context, &evaluator)?);
        }
        Ok(())
    }

    /// Outcome counts since the service was created
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn builders(&self) -> &[MeterBuilder] {
        &self.builders
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{ConfigBuilder, MeterDefinition};
    use crate::core::types::{MeterOperation, Scope, ScopeType};
    use crate::meter::event::Sample;
    use crate::meter::stats::DropReason;
    use crate::meter::system::{AcceptableValue, InMemoryMeterSystem, ValueKind};
    use std::sync::Barrier;
    use std::thread;
    use std::time::Duration;

    /// Meter system whose registrations take a while to complete
    struct SlowCreateSystem {
        inner: InMemoryMeterSystem,
        delay: Duration,
    }

    impl MeterSystem for SlowCreateSystem {
        fn create(&self, metrics_name: &str, operation: MeterOperation, scope_type: ScopeType) -> Result<()> {
            thread::sleep(self.delay);
            self.inner.create(metrics_name, operation, scope_type)
        }

        fn build_metrics(&self, metrics_name: &str, kind: ValueKind) -> Result<AcceptableValue> {
            self.inner.build_metrics(metrics_name, kind)
        }

        fn do_streaming_calculation(&self, value: AcceptableValue) -> Result<()> {
            self.inner.do_streaming_calculation(value)
        }
    }

    fn event(timestamp: i64, samples: Vec<Sample>) -> MeterEvent {
        MeterEvent {
            service: "checkout".to_string(),
            service_instance: "pod-1".to_string(),
            timestamp,
            samples,
        }
    }

    fn service(config: &Config) -> (MeterProcessService, Arc<InMemoryMeterSystem>) {
        let system = Arc::new(InMemoryMeterSystem::new());
        let service =
            MeterProcessService::new(config, Arc::clone(&system) as Arc<dyn MeterSystem>).unwrap();
        (service, system)
    }

    #[test]
    fn test_process_initializes_lazily() {
        let config = ConfigBuilder::new()
            .meter(MeterDefinition::new("requests", Scope::service(), "avg", "requests"))
            .build()
            .unwrap();
        let (service, system) = service(&config);

        service.process(&event(0, vec![Sample::single("requests", 5.0)])).unwrap();
        service.process(&event(60_000, vec![Sample::single("requests", 6.0)])).unwrap();

        assert_eq!(system.create_calls(), 1);
        assert_eq!(system.recorded("meter_requests").len(), 2);
        assert_eq!(service.stats().forwarded, 2);
    }

    #[test]
    fn test_process_counts_drops() {
        let config = ConfigBuilder::new()
            .meter(MeterDefinition::new("requests", Scope::service(), "avg", "requests"))
            .meter(MeterDefinition::new("latency", Scope::service(), "avgHistogram", "latency"))
            .build()
            .unwrap();
        let (service, _system) = service(&config);

        service.process(&event(0, vec![Sample::single("requests", 5.0)])).unwrap();

        let stats = service.stats();
        assert_eq!(stats.forwarded, 1);
        assert_eq!(stats.dropped(DropReason::EvaluationError), 1);
    }

    #[test]
    fn test_concurrent_first_events_wait_for_registration() {
        let config = ConfigBuilder::new()
            .meter(MeterDefinition::new("requests", Scope::service(), "avg", "requests"))
            .build()
            .unwrap();
        let system = Arc::new(SlowCreateSystem {
            inner: InMemoryMeterSystem::new(),
            delay: Duration::from_millis(200),
        });
        let service = Arc::new(
            MeterProcessService::new(&config, Arc::clone(&system) as Arc<dyn MeterSystem>).unwrap(),
        );
        let barrier = Arc::new(Barrier::new(2));

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let service = Arc::clone(&service);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    service
                        .process(&event(0, vec![Sample::single("requests", 5.0)]))
                        .unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let stats = service.stats();
        assert_eq!(stats.forwarded, 2);
        assert_eq!(stats.dropped(DropReason::EngineRejected), 0);
        assert_eq!(system.inner.create_calls(), 1);
        assert_eq!(system.inner.recorded_count(), 2);
    }

    #[test]
    fn test_batch_counts_join_service_totals() {
        let config = ConfigBuilder::new()
            .meter(MeterDefinition::new("requests", Scope::service(), "avg", "requests"))
            .build()
            .unwrap();
        let (service, _system) = service(&config);
        service.process(&event(0, vec![Sample::single("requests", 1.0)])).unwrap();

        let events = vec![event(0, vec![Sample::single("requests", 1.0)])];
        let batch = service.process_batch(&events).unwrap();

        assert_eq!(batch.forwarded, 1);
        assert_eq!(service.stats().forwarded, 2);
    }

    #[test]
    fn test_process_batch_in_parallel() {
        let config = ConfigBuilder::new()
            .meter(MeterDefinition::new("requests", Scope::service_instance(), "avg", "requests"))
            .build()
            .unwrap();
        let (service, system) = service(&config);

        let events: Vec<MeterEvent> = (0..200)
            .map(|i| event(i * 1_000, vec![Sample::single("requests", 1.0)]))
            .collect();

        let batch = service.process_batch(&events).unwrap();
        assert_eq!(batch.forwarded, 200);
        assert_eq!(batch.total_dropped(), 0);
        assert_eq!(service.stats().forwarded, 200);
        assert_eq!(system.create_calls(), 1);
        assert_eq!(system.recorded_count(), 200);
    }
}
