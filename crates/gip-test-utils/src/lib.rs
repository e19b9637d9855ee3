//! Testing utilities for the GIP workspace
//!
//! Scripted producers, contract fixtures and execution contexts shared by
//! the integration tests of every crate.

#![allow(missing_docs)]

use async_trait::async_trait;
use gip_core::{Producer, ProducerError, ProducerRequest, ProducerResponse};
use gip_dispatch::{handler_fn, ActionDefinition, ExecutionContext, HandlerError, PermissionPredicate};
use gip_schema::{Contract, ObjectBuilder, SchemaNode};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Producer that replays a fixed script and records every request
///
/// Once the script is used up every call fails with `ProducerError::Other`.
#[derive(Debug, Default)]
pub struct ScriptedProducer {
    script: Mutex<VecDeque<Result<ProducerResponse, ProducerError>>>,
    requests: Mutex<Vec<ProducerRequest>>,
}

impl ScriptedProducer {
    /// Script of JSON responses
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from_results(responses.into_iter().map(|r| Ok(ProducerResponse::json(r))))
    }

    /// Script mixing responses and faults
    pub fn from_results<I>(results: I) -> Self
    where
        I: IntoIterator<Item = Result<ProducerResponse, ProducerError>>,
    {
        Self {
            script: Mutex::new(results.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Same response for every call, `times` times
    pub fn repeating(response: &str, times: usize) -> Self {
        Self::new(std::iter::repeat(response).take(times))
    }

    /// Calls made so far
    pub fn calls(&self) -> usize {
        self.requests.lock().len()
    }

    /// Requests received, in order
    pub fn requests(&self) -> Vec<ProducerRequest> {
        self.requests.lock().clone()
    }

    /// Prompts received, in order
    pub fn prompts(&self) -> Vec<String> {
        self.requests.lock().iter().map(|r| r.prompt.clone()).collect()
    }
}

#[async_trait]
impl Producer for ScriptedProducer {
    async fn call(&self, request: &ProducerRequest) -> Result<ProducerResponse, ProducerError> {
        self.requests.lock().push(request.clone());
        self.script
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(ProducerError::Other("script exhausted".into())))
    }
}

/// Producer that waits before answering
#[derive(Debug)]
pub struct SlowProducer {
    delay: Duration,
    content: String,
    calls: AtomicUsize,
}

impl SlowProducer {
    pub fn new(delay: Duration, content: impl Into<String>) -> Self {
        Self {
            delay,
            content: content.into(),
            calls: AtomicUsize::new(0),
        }
    }

    /// Calls started so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Producer for SlowProducer {
    async fn call(&self, _request: &ProducerRequest) -> Result<ProducerResponse, ProducerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        Ok(ProducerResponse::json(self.content.clone()))
    }
}

/// `{operation: "read" | "write", path: string}`, both required
pub fn file_op_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "operation": {"type": "string", "enum": ["read", "write"]},
            "path": {"type": "string"}
        },
        "required": ["operation", "path"]
    })
}

pub fn file_op_contract() -> Contract {
    Contract::new(
        "file_op",
        ObjectBuilder::new()
            .required("operation", SchemaNode::enumeration(["read", "write"]))
            .required("path", SchemaNode::string())
            .build(),
    )
    .unwrap()
}

/// `{to: string, subject: string, body?: string}`
pub fn email_contract() -> Contract {
    Contract::new(
        "email",
        ObjectBuilder::new()
            .required("to", SchemaNode::string())
            .required("subject", SchemaNode::string())
            .optional("body", SchemaNode::string())
            .build(),
    )
    .unwrap()
}

/// `send_email` action requiring the `send_email` permission
///
/// `sent` counts handler invocations.
pub fn send_email_action(sent: Arc<AtomicUsize>) -> ActionDefinition {
    ActionDefinition::new(
        "send_email",
        email_contract(),
        PermissionPredicate::require_all(["send_email"]),
        handler_fn(move |params: Value, ctx: ExecutionContext| {
            let sent = Arc::clone(&sent);
            async move {
                sent.fetch_add(1, Ordering::SeqCst);
                Ok::<_, HandlerError>(json!({
                    "sent": true,
                    "to": params["to"],
                    "by": ctx.actor_id(),
                }))
            }
        }),
    )
    .with_description("send an email")
}

/// Actor holding only `read`
pub fn reader_context() -> ExecutionContext {
    ExecutionContext::new("u1")
        .with_permissions(["read"])
        .with_request_id("req-reader")
}

/// Actor holding `send_email`
pub fn mailer_context() -> ExecutionContext {
    ExecutionContext::new("mailer")
        .with_permissions(["read", "send_email"])
        .with_request_id("req-mailer")
}

pub const VALID_FILE_OP: &str = r#"{"operation": "read", "path": "/var/log/deploy.log"}"#;
pub const BAD_ENUM_FILE_OP: &str = r#"{"operation": "delete", "path": "/var/log/deploy.log"}"#;
pub const MISSING_PATH_FILE_OP: &str = r#"{"operation": "read"}"#;
