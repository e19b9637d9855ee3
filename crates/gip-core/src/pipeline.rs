//! Pipeline coordinator
//!
//! One request runs these stages in order:
//!
//! 1. resolve the contract (and the action, when one is named)
//! 2. build context text
//! 3. regenerate until the producer's response validates or attempts run out
//! 4. dispatch the validated document, when an action is named
//!
//! Setup problems (unknown contract or action) fail before the producer is
//! called. An invalid document is never dispatched.

use gip_dispatch::{ActionDispatcher, ActionOutcome, ExecutionContext};
use gip_schema::{DocumentParser, SchemaRegistry, ValidationOutcome};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use crate::config::{check_temperature, PipelineConfig};
use crate::context::{ContextSource, StaticContextSources};
use crate::error::{ConfigError, PipelineError};
use crate::producer::{Producer, ProducerRequest, ProducerResponse, ResponseFormat};
use crate::regeneration::{AttemptRecord, RegenerationLoop};

/// Per-request options
#[derive(Debug, Clone, Default)]
pub struct ProcessOptions {
    /// Context sources, in the order their sections should appear
    pub context_sources: Vec<String>,
    /// Contract the response must satisfy
    pub contract_id: String,
    /// Action to run with the validated document
    pub action_id: Option<String>,
    /// Caller identity for the action
    pub execution_context: Option<ExecutionContext>,
    /// Override of the configured attempt limit
    pub max_attempts: Option<u32>,
    /// Override of the configured temperature
    pub temperature: Option<f32>,
}

impl ProcessOptions {
    /// Options for a contract
    #[must_use]
    pub fn new(contract_id: impl Into<String>) -> Self {
        Self {
            contract_id: contract_id.into(),
            ..Self::default()
        }
    }

    /// With context sources
    #[must_use]
    pub fn with_context_sources<I, S>(mut self, sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.context_sources = sources.into_iter().map(Into::into).collect();
        self
    }

    /// With action
    #[inline]
    #[must_use]
    pub fn with_action(mut self, action_id: impl Into<String>) -> Self {
        self.action_id = Some(action_id.into());
        self
    }

    /// With execution context
    #[inline]
    #[must_use]
    pub fn with_execution_context(mut self, context: ExecutionContext) -> Self {
        self.execution_context = Some(context);
        self
    }

    /// With attempt limit
    #[inline]
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// With temperature
    #[inline]
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// Result of one pipeline cycle
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessResult {
    /// Last producer response
    pub response: ProducerResponse,
    /// Validation of that response
    pub outcome: ValidationOutcome,
    /// Dispatch result, when an action was named and the document validated
    pub action_outcome: Option<ActionOutcome>,
    /// Producer calls made
    pub attempts: u32,
    /// Per-attempt records
    pub history: Vec<AttemptRecord>,
}

impl ProcessResult {
    /// Did the cycle end with a valid document?
    #[inline]
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.outcome.is_valid()
    }
}

/// Coordinates producer, validator and dispatcher for each request
pub struct Pipeline {
    producer: Arc<dyn Producer>,
    context: Arc<dyn ContextSource>,
    schemas: Arc<SchemaRegistry>,
    dispatcher: Arc<ActionDispatcher>,
    parser: DocumentParser,
    config: PipelineConfig,
}

impl Pipeline {
    /// Start building a pipeline
    #[inline]
    #[must_use]
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    /// Schema registry (shared)
    #[inline]
    #[must_use]
    pub fn schemas(&self) -> &Arc<SchemaRegistry> {
        &self.schemas
    }

    /// Action dispatcher (shared)
    #[inline]
    #[must_use]
    pub fn dispatcher(&self) -> &Arc<ActionDispatcher> {
        &self.dispatcher
    }

    /// Configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run one request
    ///
    /// Applies the configured request timeout, if any.
    ///
    /// # Errors
    /// - `UnknownContract` / `UnknownAction` before any producer call
    /// - `Context` if context text cannot be built
    /// - `Producer` if a producer call fails
    /// - `Config` for an out-of-range per-request override
    /// - `Timeout` if the request exceeds `request_timeout_secs`
    pub async fn process(
        &self,
        query: &str,
        options: ProcessOptions,
    ) -> Result<ProcessResult, PipelineError> {
        tracing::info!(
            contract = %options.contract_id,
            action = options.action_id.as_deref().unwrap_or("-"),
            "pipeline cycle started"
        );
        let cycle = self.run(query, options);

        match self.config.request_timeout() {
            Some(limit) => tokio::time::timeout(limit, cycle).await.map_err(|_| {
                tracing::warn!(timeout_secs = limit.as_secs(), "pipeline cycle timed out");
                PipelineError::Timeout {
                    duration_secs: limit.as_secs(),
                }
            })?,
            None => cycle.await,
        }
    }

    /// Run one request, abandoning it when `cancel` completes first
    ///
    /// The in-flight stage is dropped on cancellation; no later stage runs.
    ///
    /// # Errors
    /// As [`Pipeline::process`], plus `Cancelled`.
    pub async fn process_with_cancel<C>(
        &self,
        query: &str,
        options: ProcessOptions,
        cancel: C,
    ) -> Result<ProcessResult, PipelineError>
    where
        C: Future<Output = ()>,
    {
        tokio::select! {
            biased;
            () = cancel => {
                tracing::info!("pipeline cycle cancelled");
                Err(PipelineError::Cancelled)
            }
            result = self.process(query, options) => result,
        }
    }

    async fn run(&self, query: &str, options: ProcessOptions) -> Result<ProcessResult, PipelineError> {
        let ProcessOptions {
            context_sources,
            contract_id,
            action_id,
            execution_context,
            max_attempts,
            temperature,
        } = options;

        let contract = self.schemas.get(&contract_id)?;
        if let Some(action) = &action_id {
            if !self.dispatcher.contains(action) {
                return Err(PipelineError::UnknownAction(action.clone()));
            }
        }
        if let Some(t) = temperature {
            check_temperature(t)?;
        }
        let regeneration = RegenerationLoop::new(Arc::clone(&self.producer))
            .with_parser(self.parser)
            .with_max_attempts(max_attempts.unwrap_or(self.config.max_attempts))?;

        let context_text = if context_sources.is_empty() {
            String::new()
        } else {
            self.context.build_context(&context_sources, query).await?
        };

        let mut request = ProducerRequest::new(query)
            .with_temperature(temperature.or(self.config.temperature))
            .with_format(ResponseFormat::json_with_schema(contract.to_json_schema()));
        if !context_text.is_empty() {
            request = request.with_system_preamble(format!(
                "{}\n\n{context_text}",
                self.config.context_preamble
            ));
        }

        let resolution = regeneration.resolve(&request, &contract).await?;

        let action_outcome = match (&action_id, resolution.outcome.value()) {
            (Some(action), Some(document)) => Some(
                self.dispatcher
                    .dispatch(action, document.clone(), execution_context)
                    .await,
            ),
            (Some(action), None) => {
                tracing::info!(action = %action, "document invalid, action not dispatched");
                None
            }
            (None, _) => None,
        };

        tracing::info!(
            attempts = resolution.attempts,
            valid = resolution.outcome.is_valid(),
            dispatched = action_outcome.is_some(),
            "pipeline cycle finished"
        );

        Ok(ProcessResult {
            response: resolution.response,
            outcome: resolution.outcome,
            action_outcome,
            attempts: resolution.attempts,
            history: resolution.history,
        })
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("schemas", &self.schemas)
            .field("dispatcher", &self.dispatcher)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Builder for [`Pipeline`]
///
/// Only the producer is mandatory. Missing registries are created empty,
/// and a missing context source serves no sources.
#[derive(Default)]
pub struct PipelineBuilder {
    producer: Option<Arc<dyn Producer>>,
    context: Option<Arc<dyn ContextSource>>,
    schemas: Option<Arc<SchemaRegistry>>,
    dispatcher: Option<Arc<ActionDispatcher>>,
    config: PipelineConfig,
}

impl PipelineBuilder {
    /// With producer
    #[must_use]
    pub fn producer(mut self, producer: Arc<dyn Producer>) -> Self {
        self.producer = Some(producer);
        self
    }

    /// With context source
    #[must_use]
    pub fn context_source(mut self, context: Arc<dyn ContextSource>) -> Self {
        self.context = Some(context);
        self
    }

    /// With shared schema registry
    #[must_use]
    pub fn schemas(mut self, schemas: Arc<SchemaRegistry>) -> Self {
        self.schemas = Some(schemas);
        self
    }

    /// With shared dispatcher
    #[must_use]
    pub fn dispatcher(mut self, dispatcher: Arc<ActionDispatcher>) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    /// With configuration
    #[must_use]
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the pipeline
    ///
    /// Contracts from the configuration are registered into the schema
    /// registry, replacing same-named entries.
    ///
    /// # Errors
    /// - `PipelineError::Config` if no producer was given or the
    ///   configuration is out of range
    /// - `PipelineError::InvalidContract` if a configured contract is rejected
    pub fn build(self) -> Result<Pipeline, PipelineError> {
        let producer = self
            .producer
            .ok_or_else(|| ConfigError::invalid("producer", "a producer is required"))?;
        self.config.validate()?;

        let schemas = self.schemas.unwrap_or_default();
        schemas.register_config(&self.config.contracts)?;

        Ok(Pipeline {
            producer,
            context: self
                .context
                .unwrap_or_else(|| Arc::new(StaticContextSources::new())),
            schemas,
            dispatcher: self.dispatcher.unwrap_or_default(),
            parser: self.config.document_parser(),
            config: self.config,
        })
    }
}

impl fmt::Debug for PipelineBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineBuilder")
            .field("producer", &self.producer.is_some())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
