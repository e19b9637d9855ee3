//! Regeneration loop
//!
//! Calls the producer, validates what comes back and, while attempts remain,
//! asks again with a correction notice listing every violation. Each
//! follow-up is built from the original request, so notices never pile up.
//!
//! Exhaustion is not an error: the last invalid outcome is returned as is.

use chrono::{DateTime, Utc};
use gip_schema::{Contract, DocumentParser, ValidationOutcome, Violation};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::sync::Arc;

use crate::error::{ConfigError, PipelineError};
use crate::producer::{FormatKind, Producer, ProducerRequest, ProducerResponse};

/// Producer calls per request when nothing else is configured
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Record of one producer call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptRecord {
    /// 1-based attempt number
    pub attempt: u32,
    /// When the producer was called
    pub started_at: DateTime<Utc>,
    /// Did the response validate?
    pub valid: bool,
    /// Violations found
    pub violation_count: usize,
}

/// Final state of one regeneration run
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    /// Last producer response
    pub response: ProducerResponse,
    /// Validation of the last response
    pub outcome: ValidationOutcome,
    /// Producer calls made
    pub attempts: u32,
    /// One record per call, in order
    pub history: Vec<AttemptRecord>,
}

impl Resolution {
    /// Did the run end with a valid document?
    #[inline]
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.outcome.is_valid()
    }
}

/// Bounded produce-validate-correct loop
#[derive(Clone)]
pub struct RegenerationLoop {
    producer: Arc<dyn Producer>,
    parser: DocumentParser,
    max_attempts: u32,
}

impl RegenerationLoop {
    /// Create loop with the default attempt limit
    #[must_use]
    pub fn new(producer: Arc<dyn Producer>) -> Self {
        Self {
            producer,
            parser: DocumentParser::new(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// With attempt limit
    ///
    /// # Errors
    /// - `ConfigError::Invalid` if `max_attempts` is 0
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Result<Self, ConfigError> {
        if max_attempts == 0 {
            return Err(ConfigError::invalid("max_attempts", "must be at least 1"));
        }
        self.max_attempts = max_attempts;
        Ok(self)
    }

    /// With document parser
    #[inline]
    #[must_use]
    pub fn with_parser(mut self, parser: DocumentParser) -> Self {
        self.parser = parser;
        self
    }

    /// Attempt limit
    #[inline]
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Run until the response satisfies `contract` or attempts run out
    ///
    /// # Errors
    /// - `PipelineError::Producer` if a producer call fails; the loop stops
    ///   at once and does not retry
    pub async fn resolve(
        &self,
        initial: &ProducerRequest,
        contract: &Contract,
    ) -> Result<Resolution, PipelineError> {
        let mut history = Vec::new();
        let mut follow_up: Option<ProducerRequest> = None;
        let mut attempt = 0;

        loop {
            attempt += 1;
            let request = follow_up.as_ref().unwrap_or(initial);
            let started_at = Utc::now();

            let response = self.producer.call(request).await.map_err(|err| {
                tracing::warn!(attempt, contract = %contract.name(), error = %err, "producer call failed");
                PipelineError::Producer(err)
            })?;

            let outcome = self.parser.validate(&response.content, contract);
            tracing::debug!(
                attempt,
                contract = %contract.name(),
                valid = outcome.is_valid(),
                violations = outcome.violations().len(),
                "attempt validated"
            );
            history.push(AttemptRecord {
                attempt,
                started_at,
                valid: outcome.is_valid(),
                violation_count: outcome.violations().len(),
            });

            if outcome.is_valid() || attempt >= self.max_attempts {
                if !outcome.is_valid() {
                    tracing::warn!(
                        attempts = attempt,
                        contract = %contract.name(),
                        violations = outcome.violations().len(),
                        "regeneration exhausted"
                    );
                }
                return Ok(Resolution {
                    response,
                    outcome,
                    attempts: attempt,
                    history,
                });
            }

            let notice = correction_notice(outcome.violations(), initial.format.kind());
            follow_up = Some(initial.follow_up(&notice));
        }
    }
}

impl std::fmt::Debug for RegenerationLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegenerationLoop")
            .field("parser", &self.parser)
            .field("max_attempts", &self.max_attempts)
            .finish_non_exhaustive()
    }
}

/// Text appended to the original prompt when a response fails validation
///
/// Lists every violation with its path, message and expected shape, then asks
/// for the complete document again in `format`.
#[must_use]
pub fn correction_notice(violations: &[Violation], format: FormatKind) -> String {
    let mut notice = String::from(
        "Your previous response did not match the required structure. Problems found:\n",
    );
    for violation in violations {
        let _ = writeln!(
            notice,
            "- {}: {} (expected {})",
            violation.path, violation.message, violation.expected
        );
    }
    let _ = write!(
        notice,
        "Respond again with the complete corrected document in {format}, with no other text."
    );
    notice
}
