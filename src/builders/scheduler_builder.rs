//! Builders to assemble a scheduler from configuration.

use std::sync::Arc;

use crate::config::QueueConfig;
use crate::core::{
    AdmissionQueue, AnalysisClient, EventSink, ReportStore, Scheduler, SchedulerError,
};
use crate::util::ReportPayload;

/// Assembles an [`AdmissionQueue`] or a running [`Scheduler`].
pub struct SchedulerBuilder {
    config: QueueConfig,
    events: Option<Arc<dyn EventSink>>,
}

impl SchedulerBuilder {
    /// Start from a queue configuration.
    #[must_use]
    pub const fn new(config: QueueConfig) -> Self {
        Self {
            config,
            events: None,
        }
    }

    /// Start from the process environment (see [`QueueConfig::from_env`]).
    ///
    /// # Errors
    ///
    /// [`SchedulerError::InvalidConfig`] for unparsable or invalid values.
    pub fn from_env() -> Result<Self, SchedulerError> {
        QueueConfig::from_env()
            .map(Self::new)
            .map_err(SchedulerError::InvalidConfig)
    }

    /// Publish report transitions to `events`.
    #[must_use]
    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = Some(events);
        self
    }

    /// Build a queue without a sweeper. Useful when sweeps are driven
    /// externally.
    ///
    /// # Errors
    ///
    /// [`SchedulerError::InvalidConfig`] when the configuration is invalid.
    pub fn build<P, S, C>(
        self,
        store: Arc<S>,
        client: Arc<C>,
    ) -> Result<AdmissionQueue<P, S, C>, SchedulerError>
    where
        P: ReportPayload,
        S: ReportStore<P>,
        C: AnalysisClient<P>,
    {
        let mut queue = AdmissionQueue::new(self.config, store, client)?;
        if let Some(events) = self.events {
            queue = queue.with_events(events);
        }
        let cfg = queue.config();
        tracing::info!(
            max_active = cfg.max_active,
            max_size = cfg.max_size,
            timeout = ?cfg.timeout,
            sweep_interval = ?cfg.sweep_interval,
            "admission queue configured"
        );
        Ok(queue)
    }

    /// Build the queue and start its sweeper.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// [`SchedulerError::InvalidConfig`] when the configuration is invalid.
    pub fn start<P, S, C>(
        self,
        store: Arc<S>,
        client: Arc<C>,
    ) -> Result<Scheduler<P, S, C>, SchedulerError>
    where
        P: ReportPayload,
        S: ReportStore<P>,
        C: AnalysisClient<P>,
    {
        self.build(store, client).map(Scheduler::start)
    }
}
