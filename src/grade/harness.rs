#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Wire protocol between the grader and the embedded Python harness.
//!
//! Every request runs in a fresh interpreter process: the submission's module
//! body is executed into a brand new module object, so no state survives from
//! one invocation to the next.

use std::{ffi::OsString, path::PathBuf, time::Duration};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

use crate::process::{self, Finished};

/// Source of the harness script, passed to the interpreter with `-c`.
pub const HARNESS_SOURCE: &str = include_str!("harness.py");

/// Prefix of the single reply line the harness writes to stdout.
pub const REPLY_MARKER: &str = "\u{1e}@@exam-grader-reply@@";

/// Module name submissions are loaded under.
pub const MODULE_NAME: &str = "exam";

/// What the harness should do with the submission.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Request<'a> {
    /// Load the module and report which required names are missing.
    Probe {
        /// Name the module is registered under.
        module:   &'a str,
        /// Submission source, as the raw bytes of the file.
        #[serde(rename = "source_hex", serialize_with = "hex_bytes")]
        source:   &'a [u8],
        /// Names that must be present and callable.
        required: &'a [String],
    },
    /// Load the module and call one function.
    Call {
        /// Name the module is registered under.
        module:   &'a str,
        /// Submission source, as the raw bytes of the file.
        #[serde(rename = "source_hex", serialize_with = "hex_bytes")]
        source:   &'a [u8],
        /// Function to call.
        function: &'a str,
        /// Positional arguments.
        args:     &'a [Value],
        /// Scripted `input()` responses.
        inputs:   &'a [String],
    },
}

/// Sends source bytes hex encoded; the harness compiles the decoded bytes, so
/// Python applies its own source encoding rules (coding cookies, UTF-8).
fn hex_bytes<S: Serializer>(bytes: &&[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&hex::encode(bytes))
}

/// The harness's answer to a [`Request`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Reply {
    /// Compiling or executing the module body raised.
    LoadError {
        /// `<ExceptionType>: <message>`.
        error: String,
    },
    /// Probe result.
    Loaded {
        /// Required names that are absent or not callable.
        missing: Vec<String>,
        /// Anything the module body printed.
        #[serde(default)]
        output:  String,
    },
    /// The target function does not exist in the module.
    Missing,
    /// The call raised.
    Raised {
        /// `<ExceptionType>: <message>`.
        error:  String,
        /// Output printed before the exception.
        #[serde(default)]
        output: String,
    },
    /// The call returned normally.
    Returned {
        /// Return value.
        value:  Value,
        /// Arguments as they look after the call.
        args:   Vec<Value>,
        /// Captured stdout.
        #[serde(default)]
        output: String,
    },
}

/// How a harness run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum HarnessRun {
    /// The harness produced a reply.
    Replied {
        /// The decoded reply.
        reply:    Reply,
        /// Time the interpreter ran for.
        duration: Duration,
    },
    /// The budget elapsed and the interpreter was killed.
    TimedOut {
        /// The budget that was exceeded.
        limit: Duration,
    },
    /// The interpreter exited without writing a reply (hard exit, crash).
    NoReply {
        /// Exit status description.
        status:   String,
        /// Last part of stderr.
        stderr:   String,
        /// Time the interpreter ran for.
        duration: Duration,
    },
}

/// A Python interpreter able to run the harness.
#[derive(Debug, Clone)]
pub struct Harness {
    /// Interpreter binary.
    python: PathBuf,
}

impl Harness {
    /// Creates a harness driving the given interpreter.
    pub fn new(python: impl Into<PathBuf>) -> Self {
        Self {
            python: python.into(),
        }
    }

    /// Returns the interpreter path.
    pub fn python(&self) -> &PathBuf {
        &self.python
    }

    /// Sends one request to a fresh interpreter and waits at most `budget`.
    ///
    /// Errors only when the interpreter cannot be run at all; everything the
    /// submission does is reported through [`HarnessRun`].
    pub async fn execute(&self, request: &Request<'_>, budget: Duration) -> Result<HarnessRun> {
        let payload = serde_json::to_vec(request).context("Could not encode harness request")?;
        let args: Vec<OsString> = ["-I", "-X", "utf8", "-c", HARNESS_SOURCE]
            .into_iter()
            .map(OsString::from)
            .collect();

        let finished = process::run_collect(&self.python, &args, payload, budget)
            .await
            .with_context(|| format!("Could not run `{}`", self.python.display()))?;

        let collected = match finished {
            Finished::TimedOut { limit } => return Ok(HarnessRun::TimedOut { limit }),
            Finished::Exited(collected) => collected,
        };

        let stdout = String::from_utf8_lossy(&collected.stdout);
        match parse_reply(&stdout) {
            Some(Ok(reply)) => Ok(HarnessRun::Replied {
                reply,
                duration: collected.elapsed,
            }),
            Some(Err(err)) => Ok(HarnessRun::NoReply {
                status:   collected.status.to_string(),
                stderr:   format!("harness reply could not be decoded: {err}"),
                duration: collected.elapsed,
            }),
            None => {
                let stderr = String::from_utf8_lossy(&collected.stderr);
                Ok(HarnessRun::NoReply {
                    status:   collected.status.to_string(),
                    stderr:   tail(&stderr, 12),
                    duration: collected.elapsed,
                })
            }
        }
    }
}

/// Finds the last reply line in the harness's stdout and decodes it.
fn parse_reply(stdout: &str) -> Option<serde_json::Result<Reply>> {
    stdout
        .lines()
        .rev()
        .find_map(|line| line.strip_prefix(REPLY_MARKER))
        .map(serde_json::from_str)
}

/// Keeps the last `lines` lines of `text`.
fn tail(text: &str, lines: usize) -> String {
    let all: Vec<&str> = text.lines().collect();
    all[all.len().saturating_sub(lines)..].join("\n")
}
