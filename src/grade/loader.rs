#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Builds the isolated execution context of one submission.

use std::{collections::BTreeMap, sync::Arc, time::Duration};

use serde::Serialize;
use tracing::debug;

use super::harness::{Harness, HarnessRun, MODULE_NAME, Reply, Request};
use crate::error::GradingError;

/// Whether a required name could be bound from the submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolState {
    /// Defined and callable.
    Present,
    /// Absent, or bound to something that is not callable.
    Missing,
}

/// The disposable namespace of one submission: its source, which required
/// names it binds, and the load-time fault, if any. Built once per submission
/// and dropped once the submission's report exists.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionContext {
    /// Student the context belongs to.
    identity:    String,
    /// Raw submission bytes, shared by every invocation.
    #[serde(skip)]
    source:      Arc<[u8]>,
    /// State of each required name.
    symbols:     BTreeMap<String, SymbolState>,
    /// Syntax or top-level error that makes every test an error.
    fault:       Option<String>,
    /// Output printed by the module body while loading.
    load_output: String,
    /// Interpreter start-up plus module body, as measured while loading.
    #[serde(skip)]
    load_time:   Duration,
}

impl ExecutionContext {
    /// Returns the student identity.
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Returns the raw submission bytes.
    pub fn source(&self) -> &[u8] {
        &self.source
    }

    /// Returns the state of every required name.
    pub fn symbols(&self) -> &BTreeMap<String, SymbolState> {
        &self.symbols
    }

    /// Returns the load-time fault, if loading failed.
    pub fn fault(&self) -> Option<&str> {
        self.fault.as_deref()
    }

    /// Returns what the module body printed while loading.
    pub fn load_output(&self) -> &str {
        &self.load_output
    }

    /// Returns how long starting the interpreter and running the module body
    /// took. Every test invocation repeats that work before the call itself.
    pub fn load_time(&self) -> Duration {
        self.load_time
    }

    /// Whether `name` was required and found missing.
    pub fn is_missing(&self, name: &str) -> bool {
        self.symbols.get(name) == Some(&SymbolState::Missing)
    }

    /// Required names that are missing, in name order.
    pub fn missing(&self) -> impl Iterator<Item = &str> {
        self.symbols
            .iter()
            .filter(|(_, state)| **state == SymbolState::Missing)
            .map(|(name, _)| name.as_str())
    }

    /// A context whose module failed to load. Nothing is bound, so no symbol
    /// state is recorded.
    fn faulted(identity: &str, source: Arc<[u8]>, fault: String) -> Self {
        Self {
            identity: identity.to_string(),
            source,
            symbols: BTreeMap::new(),
            fault: Some(fault),
            load_output: String::new(),
            load_time: Duration::ZERO,
        }
    }
}

/// Loads submissions into fresh execution contexts.
#[derive(Debug, Clone)]
pub struct SubmissionLoader {
    /// Interpreter driver.
    harness: Harness,
    /// Budget for executing the module body.
    budget:  Duration,
}

impl SubmissionLoader {
    /// Creates a loader with the given load budget.
    pub fn new(harness: Harness, budget: Duration) -> Self {
        Self { harness, budget }
    }

    /// Executes the submission's module body in a fresh namespace and records
    /// which of `required` it binds. `source` is the file's raw bytes; the
    /// interpreter decodes them the way it would decode a module on disk.
    ///
    /// Missing names and load-time faults are graded outcomes recorded in the
    /// returned context; only a harness that cannot run at all is an error.
    pub async fn load(
        &self,
        identity: &str,
        source: impl AsRef<[u8]>,
        required: &[String],
    ) -> Result<ExecutionContext, GradingError> {
        let source: Arc<[u8]> = Arc::from(source.as_ref());
        let request = Request::Probe {
            module: MODULE_NAME,
            source: &*source,
            required,
        };

        let run = self
            .harness
            .execute(&request, self.budget)
            .await
            .map_err(|err| GradingError::Harness {
                identity: identity.to_string(),
                message:  format!("{err:#}"),
            })?;

        let context = match run {
            HarnessRun::Replied {
                reply: Reply::Loaded { missing, output },
                duration,
            } => ExecutionContext {
                identity: identity.to_string(),
                source,
                symbols: required
                    .iter()
                    .map(|name| {
                        let state = if missing.contains(name) {
                            SymbolState::Missing
                        } else {
                            SymbolState::Present
                        };
                        (name.clone(), state)
                    })
                    .collect(),
                fault: None,
                load_output: output,
                load_time: duration,
            },
            HarnessRun::Replied {
                reply: Reply::LoadError { error },
                ..
            } => ExecutionContext::faulted(identity, source, error),
            HarnessRun::Replied { reply, .. } => {
                return Err(GradingError::Harness {
                    identity: identity.to_string(),
                    message:  format!("unexpected reply to a probe: {reply:?}"),
                });
            }
            HarnessRun::TimedOut { limit } => ExecutionContext::faulted(
                identity,
                source,
                format!(
                    "timed out while loading the module after {} ms",
                    limit.as_millis()
                ),
            ),
            HarnessRun::NoReply { status, stderr, .. } => ExecutionContext::faulted(
                identity,
                source,
                format!("the module stopped the interpreter while loading ({status}): {stderr}"),
            ),
        };

        debug!(
            student = identity,
            fault = context.fault(),
            missing = ?context.missing().collect::<Vec<_>>(),
            load_ms = context.load_time().as_millis() as u64,
            "Loaded submission"
        );
        Ok(context)
    }
}
