//! The boundary to the database under test.

use cypher_generation::{Schema, Seed};
use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DbError {
    /// The database rejected or failed to execute a statement.
    #[error("{0}")]
    Query(String),
    #[error("connection lost: {0}")]
    Connection(String),
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum QueryResultType {
    #[default]
    None,
    Valid,
    Invalid,
    Bug,
    Crash,
    ReportedBug,
    Timeout,
}

impl QueryResultType {
    /// Whether the result is worth a bug report. Known bugs are not.
    pub fn is_bug(self) -> bool {
        matches!(self, Self::Bug | Self::Crash)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    pub ty: QueryResultType,
    pub rows: Vec<Vec<String>>,
    pub produced_error: Option<DbError>,
    /// What the driver compares results by.
    pub fingerprint: String,
}

impl QueryResult {
    pub fn rows(rows: Vec<Vec<String>>) -> Self {
        let fingerprint = rows
            .iter()
            .map(|row| row.join(","))
            .collect::<Vec<_>>()
            .join(";");
        Self {
            rows,
            fingerprint,
            ..Self::default()
        }
    }

    pub fn error(error: DbError) -> Self {
        Self {
            produced_error: Some(error),
            ..Self::default()
        }
    }

    pub fn error_message(&self) -> Option<String> {
        self.produced_error.as_ref().map(ToString::to_string)
    }
}

/// Error messages that are expected, and ones that belong to known bugs.
#[derive(Debug, Clone, Default)]
pub struct ErrorMessageRegex {
    pub ignored: Option<Regex>,
    pub reported: Option<Regex>,
}

impl ErrorMessageRegex {
    /// Joins each list of patterns into one alternation.
    pub fn new<S: AsRef<str>>(ignored: &[S], reported: &[S]) -> Result<Self, regex::Error> {
        Ok(Self {
            ignored: alternation(ignored)?,
            reported: alternation(reported)?,
        })
    }

    /// Classifies a result by its error message alone.
    pub fn classify(&self, result: &QueryResult) -> QueryResultType {
        let Some(message) = result.error_message() else {
            return QueryResultType::Valid;
        };
        if self.ignored.as_ref().is_some_and(|r| r.is_match(&message)) {
            return QueryResultType::Invalid;
        }
        if self.reported.as_ref().is_some_and(|r| r.is_match(&message)) {
            return QueryResultType::ReportedBug;
        }
        QueryResultType::Bug
    }
}

fn alternation<S: AsRef<str>>(patterns: &[S]) -> Result<Option<Regex>, regex::Error> {
    if patterns.is_empty() {
        return Ok(None);
    }
    let joined = patterns
        .iter()
        .map(|p| format!("(?:{})", p.as_ref()))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&joined).map(Some)
}

/// A database the fuzzer can run statements against.
pub trait Driver {
    fn init(&mut self) -> Result<(), DbError>;

    /// Brings the database back to its initial, empty state.
    fn reset(&mut self) -> Result<(), DbError>;

    /// The schema the next statement is generated with.
    fn schema(&mut self) -> Result<Schema, DbError>;

    fn run_query(&mut self, statement: &str) -> QueryResult;

    fn verify_connectivity(&mut self) -> Result<(), DbError>;

    fn query_result_type(&self, result: &QueryResult, regex: &ErrorMessageRegex) -> QueryResultType {
        regex.classify(result)
    }

    /// Whether to stop adding statements to the current query.
    fn discard_query(&mut self, result: &QueryResult, seed: &mut Seed) -> bool {
        result.produced_error.is_some() || seed.get_byte() % 3 == 0
    }

    fn is_equal_result(&self, a: &QueryResult, b: &QueryResult) -> bool {
        a.fingerprint == b.fingerprint
    }
}
