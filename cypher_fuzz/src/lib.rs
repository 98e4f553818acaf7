//! Fuzzing OpenCypher databases with generated queries.
//!
//! A [Session] drives a [Strategy] against a [Driver]: the strategy hands out
//! statement trees, the session renders them with `cypher_generation` and runs
//! them, and the strategy judges the results. Queries that trigger a bug are
//! persisted as a [BugReport] holding the byte string they were generated
//! from, which [reduce] replays and shrinks.

pub mod bugreport;
pub mod dbms;
pub mod mock;
pub mod profile;
pub mod reduce;
pub mod runner;
pub mod strategy;

pub use bugreport::{BugReport, ReportStatus};
pub use dbms::{DbError, Driver, ErrorMessageRegex, QueryResult, QueryResultType};
pub use mock::{MockDriver, MockOutcome};
pub use profile::{FuzzProfile, MockProfile};
pub use reduce::{reduce, Reduction};
pub use runner::{Execution, Session, SessionConfig};
pub use strategy::{FuzzingStrategy, ReductionProgress, Strategy};
