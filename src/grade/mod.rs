#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Loading submissions and running test cases against them.

/// Declarative assertions over a call's observable effects.
pub mod checks;
/// The interpreter-side driver and its wire protocol.
pub mod harness;
/// Per-submission execution contexts.
pub mod loader;
/// Per-test outcomes.
pub mod results;
/// Isolated execution of test cases.
pub mod runner;
/// Test specification files.
pub mod suite;

pub use self::{
    harness::Harness,
    loader::{ExecutionContext, SubmissionLoader, SymbolState},
    results::{Outcome, TestResult},
    runner::TestRunner,
    suite::{Check, TestCase, TestSpecification},
};
