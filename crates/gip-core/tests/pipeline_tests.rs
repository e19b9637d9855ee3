//! Pipeline coordinator tests
//!
//! End-to-end cycles with scripted producers: contract resolution, context
//! framing, regeneration, dispatch gating, cancellation and timeouts.

use async_trait::async_trait;
use gip_core::{
    ConfigError, ContextError, ContextSource, Pipeline, PipelineConfig, PipelineError,
    ProcessOptions, Producer, ResponseFormat, StaticContextSources, DEFAULT_CONTEXT_PREAMBLE,
};
use gip_dispatch::{
    handler_fn, ActionDefinition, ActionDispatcher, ErrorCode, HandlerError, PermissionPredicate,
};
use gip_schema::{ContractConfig, SchemaRegistry};
use gip_test_utils::{
    file_op_contract, file_op_schema, reader_context, ScriptedProducer, SlowProducer,
    BAD_ENUM_FILE_OP, VALID_FILE_OP,
};
use mockall::mock;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

mock! {
    pub Sources {}

    #[async_trait]
    impl ContextSource for Sources {
        async fn build_context(&self, source_ids: &[String], query: &str) -> Result<String, ContextError>;
    }
}

const QUERY: &str = "Read the deploy log";

// ============================================================================
// Helpers
// ============================================================================

struct Fixture {
    schemas: Arc<SchemaRegistry>,
    dispatcher: Arc<ActionDispatcher>,
    reads: Arc<AtomicUsize>,
}

/// Registries with the `file_op` contract and a `read_file` action
fn fixture() -> Fixture {
    let schemas = Arc::new(SchemaRegistry::new());
    schemas.register(file_op_contract());

    let reads = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&reads);
    let dispatcher = Arc::new(ActionDispatcher::new());
    dispatcher.register(ActionDefinition::new(
        "read_file",
        file_op_contract(),
        PermissionPredicate::require_all(["read"]),
        handler_fn(move |params, _| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<_, HandlerError>(json!({"read": params["path"]}))
            }
        }),
    ));

    Fixture {
        schemas,
        dispatcher,
        reads,
    }
}

fn pipeline(fixture: &Fixture, producer: Arc<dyn Producer>, config: PipelineConfig) -> Pipeline {
    Pipeline::builder()
        .producer(producer)
        .schemas(Arc::clone(&fixture.schemas))
        .dispatcher(Arc::clone(&fixture.dispatcher))
        .context_source(Arc::new(
            StaticContextSources::new().with_source("policy", "Only read under /var/log."),
        ))
        .config(config)
        .build()
        .unwrap()
}

fn read_options() -> ProcessOptions {
    ProcessOptions::new("file_op")
        .with_action("read_file")
        .with_execution_context(reader_context())
}

// ============================================================================
// Full cycles
// ============================================================================

#[tokio::test]
async fn valid_document_is_dispatched() {
    let fx = fixture();
    let producer = Arc::new(ScriptedProducer::new([VALID_FILE_OP]));
    let pipeline = pipeline(&fx, producer.clone(), PipelineConfig::default());

    let result = pipeline.process(QUERY, read_options()).await.unwrap();

    assert!(result.is_valid());
    assert_eq!(result.attempts, 1);
    let action = result.action_outcome.unwrap();
    assert_eq!(action.data(), Some(&json!({"read": "/var/log/deploy.log"})));
    assert_eq!(fx.reads.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn regenerated_document_is_dispatched_once() {
    let fx = fixture();
    let producer = Arc::new(ScriptedProducer::new([BAD_ENUM_FILE_OP, VALID_FILE_OP]));
    let pipeline = pipeline(&fx, producer.clone(), PipelineConfig::default());

    let result = pipeline.process(QUERY, read_options()).await.unwrap();

    assert_eq!(result.attempts, 2);
    assert!(result.action_outcome.unwrap().is_success());
    assert_eq!(fx.reads.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn invalid_document_is_never_dispatched() {
    let fx = fixture();
    let producer = Arc::new(ScriptedProducer::repeating(BAD_ENUM_FILE_OP, 10));
    let pipeline = pipeline(&fx, producer.clone(), PipelineConfig::default());

    let result = pipeline.process(QUERY, read_options()).await.unwrap();

    assert!(!result.is_valid());
    assert_eq!(result.attempts, 3);
    assert!(result.action_outcome.is_none());
    assert_eq!(fx.reads.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn validation_only_cycle() {
    let fx = fixture();
    let producer = Arc::new(ScriptedProducer::new([VALID_FILE_OP]));
    let pipeline = pipeline(&fx, producer, PipelineConfig::default());

    let result = pipeline.process(QUERY, ProcessOptions::new("file_op")).await.unwrap();

    assert!(result.is_valid());
    assert!(result.action_outcome.is_none());
}

#[tokio::test]
async fn denied_action_is_reported_as_outcome() {
    let fx = fixture();
    let producer = Arc::new(ScriptedProducer::new([VALID_FILE_OP]));
    let pipeline = pipeline(&fx, producer, PipelineConfig::default());

    let options = ProcessOptions::new("file_op")
        .with_action("read_file")
        .with_execution_context(gip_dispatch::ExecutionContext::new("guest"));
    let result = pipeline.process(QUERY, options).await.unwrap();

    assert_eq!(
        result.action_outcome.unwrap().code(),
        Some(ErrorCode::PermissionDenied)
    );
    assert_eq!(fx.reads.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn missing_execution_context_is_reported_as_outcome() {
    let fx = fixture();
    let producer = Arc::new(ScriptedProducer::new([VALID_FILE_OP]));
    let pipeline = pipeline(&fx, producer, PipelineConfig::default());

    let result = pipeline
        .process(QUERY, ProcessOptions::new("file_op").with_action("read_file"))
        .await
        .unwrap();

    assert_eq!(
        result.action_outcome.unwrap().code(),
        Some(ErrorCode::ContextMissing)
    );
}

// ============================================================================
// Setup errors fail before the producer is called
// ============================================================================

#[tokio::test]
async fn unknown_contract_fails_fast() {
    let fx = fixture();
    let producer = Arc::new(ScriptedProducer::new([VALID_FILE_OP]));
    let pipeline = pipeline(&fx, producer.clone(), PipelineConfig::default());

    let err = pipeline
        .process(QUERY, ProcessOptions::new("email"))
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::UnknownContract(ref name) if name == "email"));
    assert!(err.is_configuration());
    assert_eq!(producer.calls(), 0);
}

#[tokio::test]
async fn unknown_action_fails_fast() {
    let fx = fixture();
    let producer = Arc::new(ScriptedProducer::new([VALID_FILE_OP]));
    let pipeline = pipeline(&fx, producer.clone(), PipelineConfig::default());

    let err = pipeline
        .process(QUERY, ProcessOptions::new("file_op").with_action("delete_file"))
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::UnknownAction(ref id) if id == "delete_file"));
    assert_eq!(producer.calls(), 0);
}

#[tokio::test]
async fn unknown_context_source_fails_fast() {
    let fx = fixture();
    let producer = Arc::new(ScriptedProducer::new([VALID_FILE_OP]));
    let pipeline = pipeline(&fx, producer.clone(), PipelineConfig::default());

    let err = pipeline
        .process(
            QUERY,
            ProcessOptions::new("file_op").with_context_sources(["policy", "faq"]),
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        PipelineError::Context(ContextError::UnknownSource(ref id)) if id == "faq"
    ));
    assert_eq!(producer.calls(), 0);
}

#[tokio::test]
async fn out_of_range_temperature_override_is_rejected() {
    let fx = fixture();
    let producer = Arc::new(ScriptedProducer::new([VALID_FILE_OP]));
    let pipeline = pipeline(&fx, producer.clone(), PipelineConfig::default());

    let err = pipeline
        .process(QUERY, ProcessOptions::new("file_op").with_temperature(3.0))
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Config(ConfigError::Invalid { field: "temperature", .. })));
    assert_eq!(producer.calls(), 0);
}

// ============================================================================
// Producer request shape
// ============================================================================

#[tokio::test]
async fn request_carries_context_hint_and_temperature() {
    let fx = fixture();
    let producer = Arc::new(ScriptedProducer::new([VALID_FILE_OP]));
    let pipeline = pipeline(
        &fx,
        producer.clone(),
        PipelineConfig::default().with_temperature(0.2),
    );

    pipeline
        .process(
            QUERY,
            ProcessOptions::new("file_op").with_context_sources(["policy"]),
        )
        .await
        .unwrap();

    let request = &producer.requests()[0];
    assert_eq!(request.prompt, QUERY);
    assert_eq!(
        request.system_preamble.as_deref(),
        Some(format!("{DEFAULT_CONTEXT_PREAMBLE}\n\n## policy\nOnly read under /var/log.").as_str())
    );
    assert_eq!(request.temperature, Some(0.2));
    assert_eq!(
        request.format,
        ResponseFormat::json_with_schema(file_op_contract().to_json_schema())
    );
}

#[tokio::test]
async fn per_request_overrides_win() {
    let fx = fixture();
    let producer = Arc::new(ScriptedProducer::repeating(BAD_ENUM_FILE_OP, 10));
    let pipeline = pipeline(
        &fx,
        producer.clone(),
        PipelineConfig::default().with_temperature(0.2),
    );

    let result = pipeline
        .process(
            QUERY,
            ProcessOptions::new("file_op")
                .with_max_attempts(2)
                .with_temperature(0.9),
        )
        .await
        .unwrap();

    assert_eq!(result.attempts, 2);
    assert!(producer.requests().iter().all(|r| r.temperature == Some(0.9)));
}

// ============================================================================
// Context collaborator
// ============================================================================

#[tokio::test]
async fn context_source_receives_ids_and_query() {
    let fx = fixture();
    let mut sources = MockSources::new();
    sources
        .expect_build_context()
        .withf(|ids, query| ids.len() == 1 && ids[0] == "runbook" && query.to_string() == QUERY)
        .times(1)
        .returning(|_, _| Ok("Deploys run at 02:00.".to_string()));

    let producer = Arc::new(ScriptedProducer::new([VALID_FILE_OP]));
    let pipeline = Pipeline::builder()
        .producer(producer.clone())
        .schemas(Arc::clone(&fx.schemas))
        .context_source(Arc::new(sources))
        .build()
        .unwrap();

    pipeline
        .process(
            QUERY,
            ProcessOptions::new("file_op").with_context_sources(["runbook"]),
        )
        .await
        .unwrap();

    let preamble = producer.requests()[0].system_preamble.clone().unwrap();
    assert!(preamble.ends_with("Deploys run at 02:00."));
}

#[tokio::test]
async fn context_source_skipped_without_ids() {
    let fx = fixture();
    let mut sources = MockSources::new();
    sources.expect_build_context().times(0);

    let producer = Arc::new(ScriptedProducer::new([VALID_FILE_OP]));
    let pipeline = Pipeline::builder()
        .producer(producer.clone())
        .schemas(Arc::clone(&fx.schemas))
        .context_source(Arc::new(sources))
        .build()
        .unwrap();

    pipeline
        .process(QUERY, ProcessOptions::new("file_op"))
        .await
        .unwrap();
    assert!(producer.requests()[0].system_preamble.is_none());
}

#[tokio::test]
async fn context_failure_stops_cycle() {
    let fx = fixture();
    let mut sources = MockSources::new();
    sources.expect_build_context().returning(|_, _| {
        Err(ContextError::Unavailable {
            source_id: "runbook".into(),
            reason: "index offline".into(),
        })
    });

    let producer = Arc::new(ScriptedProducer::new([VALID_FILE_OP]));
    let pipeline = Pipeline::builder()
        .producer(producer.clone())
        .schemas(Arc::clone(&fx.schemas))
        .context_source(Arc::new(sources))
        .build()
        .unwrap();

    let err = pipeline
        .process(
            QUERY,
            ProcessOptions::new("file_op").with_context_sources(["runbook"]),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Context(ContextError::Unavailable { .. })));
    assert_eq!(producer.calls(), 0);
}

// ============================================================================
// Cancellation and timeouts
// ============================================================================

#[tokio::test(start_paused = true)]
async fn timeout_skips_dispatch() {
    let fx = fixture();
    let producer = Arc::new(SlowProducer::new(Duration::from_secs(60), VALID_FILE_OP));
    let pipeline = pipeline(
        &fx,
        producer.clone(),
        PipelineConfig::default().with_request_timeout_secs(5),
    );

    let err = pipeline.process(QUERY, read_options()).await.unwrap_err();

    assert!(matches!(err, PipelineError::Timeout { duration_secs: 5 }));
    assert!(err.is_retryable());
    assert_eq!(producer.calls(), 1);
    assert_eq!(fx.reads.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn cancellation_skips_dispatch() {
    let fx = fixture();
    let producer = Arc::new(SlowProducer::new(Duration::from_secs(60), VALID_FILE_OP));
    let pipeline = pipeline(&fx, producer.clone(), PipelineConfig::default());

    let cancel = tokio::time::sleep(Duration::from_secs(1));
    let err = pipeline
        .process_with_cancel(QUERY, read_options(), cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Cancelled));
    assert_eq!(producer.calls(), 1);
    assert_eq!(fx.reads.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn uncancelled_cycle_completes() {
    let fx = fixture();
    let producer = Arc::new(SlowProducer::new(Duration::from_secs(1), VALID_FILE_OP));
    let pipeline = pipeline(&fx, producer, PipelineConfig::default());

    let result = pipeline
        .process_with_cancel(QUERY, read_options(), std::future::pending())
        .await
        .unwrap();

    assert!(result.action_outcome.unwrap().is_success());
    assert_eq!(fx.reads.load(Ordering::SeqCst), 1);
}

// ============================================================================
// Sharing
// ============================================================================

#[test]
fn shared_types_are_send_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Pipeline>();
    assert_send_sync::<ActionDispatcher>();
    assert_send_sync::<SchemaRegistry>();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_cycles_share_one_pipeline() {
    let fx = fixture();
    let producer = Arc::new(ScriptedProducer::repeating(VALID_FILE_OP, 8));
    let pipeline = Arc::new(pipeline(&fx, producer.clone(), PipelineConfig::default()));

    let cycles: Vec<_> = (0..8)
        .map(|_| {
            let pipeline = Arc::clone(&pipeline);
            tokio::spawn(async move { pipeline.process(QUERY, read_options()).await })
        })
        .collect();

    // re-registering the contract mid-flight never tears a lookup
    fx.schemas.register(file_op_contract());

    for cycle in cycles {
        let result = cycle.await.unwrap().unwrap();
        assert!(result.action_outcome.unwrap().is_success());
    }
    assert_eq!(producer.calls(), 8);
    assert_eq!(fx.reads.load(Ordering::SeqCst), 8);
}

// ============================================================================
// Builder
// ============================================================================

#[test]
fn builder_requires_producer() {
    let err = Pipeline::builder().build().unwrap_err();
    assert!(matches!(err, PipelineError::Config(ConfigError::Invalid { field: "producer", .. })));
}

#[test]
fn builder_rejects_invalid_config() {
    let err = Pipeline::builder()
        .producer(Arc::new(ScriptedProducer::default()))
        .config(PipelineConfig::default().with_max_attempts(0))
        .build()
        .unwrap_err();
    assert!(err.is_configuration());
}

#[test]
fn builder_registers_configured_contracts_into_shared_registry() {
    let schemas = Arc::new(SchemaRegistry::new());
    let config = PipelineConfig::default().with_contract(ContractConfig {
        name: "file_op".into(),
        description: None,
        schema: file_op_schema(),
    });

    let pipeline = Pipeline::builder()
        .producer(Arc::new(ScriptedProducer::default()))
        .schemas(Arc::clone(&schemas))
        .config(config)
        .build()
        .unwrap();

    assert!(schemas.contains("file_op"));
    assert!(Arc::ptr_eq(pipeline.schemas(), &schemas));
    assert_eq!(*schemas.get("file_op").unwrap(), file_op_contract());
}
