//! GIP Core - regeneration and pipeline coordination
//!
//! Ties the pieces together for one request: build context, ask the
//! [`Producer`] for a document, validate it against a contract, ask again with
//! a correction notice while attempts remain, and dispatch the validated
//! document to a permission-gated action.
//!
//! # Example
//!
//! ```rust,no_run
//! use gip_core::{Pipeline, PipelineConfig, ProcessOptions, Producer};
//! use std::sync::Arc;
//!
//! # async fn run(producer: Arc<dyn Producer>) -> Result<(), gip_core::PipelineError> {
//! let config = PipelineConfig::from_path("gip.toml")?;
//! let pipeline = Pipeline::builder().producer(producer).config(config).build()?;
//!
//! let result = pipeline
//!     .process("Read the deploy log", ProcessOptions::new("file_op"))
//!     .await?;
//! if let Some(document) = result.outcome.value() {
//!     println!("{document}");
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod config;
pub mod context;
pub mod error;
pub mod pipeline;
pub mod producer;
pub mod regeneration;

pub use config::{PipelineConfig, DEFAULT_CONTEXT_PREAMBLE, MAX_TEMPERATURE};
pub use context::{ContextSource, StaticContextSources};
pub use error::{ConfigError, ContextError, PipelineError, ProducerError};
pub use pipeline::{Pipeline, PipelineBuilder, ProcessOptions, ProcessResult};
pub use producer::{FormatKind, Producer, ProducerRequest, ProducerResponse, ResponseFormat};
pub use regeneration::{
    correction_notice, AttemptRecord, RegenerationLoop, Resolution, DEFAULT_MAX_ATTEMPTS,
};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
