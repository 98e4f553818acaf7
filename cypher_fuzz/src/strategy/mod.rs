//! Fuzzing strategies.
//!
//! A strategy decides what the next statement of a query is, how the results
//! of the statements are judged and how a bug-triggering query is reduced.
//! The query loop drives it:
//!
//! 1. [Strategy::root_clause] hands out the tree of the next statement, which
//!    the caller renders in place.
//! 2. The rendered statement runs, [Strategy::query_result_type] classifies
//!    the result.
//! 3. [Strategy::discard_query] decides whether the query is complete.
//!
//! Reduction calls [Strategy::reduce_step] repeatedly with the trees of the
//! best query found so far, re-runs what it returns and keeps it if
//! [Strategy::validate_reduction_result] says the bug still shows.

use cypher_generation::{Capturer, Implementation, Schema, Seed};
use serde::{Deserialize, Serialize};

use crate::dbms::{DbError, Driver, QueryResult, QueryResultType};

mod equivalence;
mod none;
mod partitioning;

pub use equivalence::EquivalenceTransformation;
pub use none::NoStrategy;
pub use partitioning::PredicatePartitioning;

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    schemars::JsonSchema,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(ascii_case_insensitive)]
pub enum FuzzingStrategy {
    #[strum(to_string = "NONE", serialize = "none")]
    None,
    #[default]
    #[strum(to_string = "EQUIVALENCE TRANSFORM", serialize = "equivalence")]
    EquivalenceTransformation,
    #[strum(to_string = "PREDICATE PARTITIONING", serialize = "partitioning")]
    PredicatePartitioning,
}

impl FuzzingStrategy {
    pub fn into_strategy(self) -> Box<dyn Strategy> {
        match self {
            FuzzingStrategy::None => Box::new(NoStrategy::default()),
            FuzzingStrategy::EquivalenceTransformation => Box::new(EquivalenceTransformation::default()),
            FuzzingStrategy::PredicatePartitioning => Box::new(PredicatePartitioning::default()),
        }
    }
}

/// Where a reduction is at. Owned by the caller, only interpreted by the
/// strategy that produced it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReductionProgress {
    stage: ProgressStage,
}

#[derive(Debug, Clone, Default, PartialEq)]
enum ProgressStage {
    #[default]
    NotStarted,
    Plain(none::PlainProgress),
    Equivalence(equivalence::EquivalenceProgress),
}

/// Runs one statement on behalf of [Strategy::rerun_query], returning the
/// result as classified by the driver.
pub type RunNext<'a> = dyn FnMut(&mut dyn Driver, &str) -> QueryResult + 'a;

pub trait Strategy {
    fn kind(&self) -> FuzzingStrategy;

    /// Forgets everything about the previous query.
    fn reset(&mut self);

    /// The tree of the next statement. The caller renders it in place.
    fn root_clause(&mut self, imp: &Implementation, s: &mut Schema, seed: &mut Seed) -> &mut Capturer;

    /// Classifies a result the driver classified as `result.ty`.
    fn query_result_type(&mut self, _db: &dyn Driver, result: &QueryResult) -> QueryResultType {
        result.ty
    }

    /// Whether the query is complete after `result`.
    fn discard_query(
        &mut self,
        result: &QueryResult,
        db: &mut dyn Driver,
        seed: &mut Seed,
    ) -> Result<bool, DbError>;

    /// Shrinks `trees` by one step. Returns the updated progress, the
    /// candidate and whether the reduction is finished.
    fn reduce_step(
        &mut self,
        progress: ReductionProgress,
        trees: Vec<Capturer>,
    ) -> (ReductionProgress, Vec<Capturer>, bool);

    /// Whether `reduced` still shows the bug `original` showed.
    fn validate_reduction_result(&self, db: &dyn Driver, original: &[QueryResult], reduced: &[QueryResult]) -> bool;

    /// The statements worth keeping in a bug report.
    fn prepare_query_for_bugreport(&self, statements: Vec<String>) -> Vec<String> {
        statements
    }

    /// Runs persisted statements again and judges the outcome.
    fn rerun_query(
        &mut self,
        statements: &[String],
        db: &mut dyn Driver,
        run_next: &mut RunNext<'_>,
    ) -> Result<QueryResultType, DbError>;

    /// Whether the database is reset before the second half of the
    /// statements is replayed.
    fn resets_between_halves(&self) -> bool {
        false
    }

    /// Called before `statements` finished trees are replayed. Results of
    /// the replay are judged among themselves, not against the query the
    /// trees came from.
    fn start_replay(&mut self, _statements: usize) {}
}

/// Runs statements in order, stopping at the first result that is not valid.
fn run_until_invalid(
    statements: &[String],
    db: &mut dyn Driver,
    run_next: &mut RunNext<'_>,
) -> (QueryResultType, Vec<QueryResult>) {
    let mut results = Vec::with_capacity(statements.len());
    for statement in statements {
        let result = run_next(&mut *db, statement);
        if result.ty != QueryResultType::Valid {
            return (result.ty, results);
        }
        results.push(result);
    }
    (QueryResultType::Valid, results)
}

/// Compares error presence and messages of the last results.
fn same_last_error(original: &[QueryResult], reduced: &[QueryResult]) -> bool {
    let (Some(original), Some(reduced)) = (original.last(), reduced.last()) else {
        return false;
    };
    original.error_message() == reduced.error_message()
}
