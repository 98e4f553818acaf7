//! An in-process stand-in for a graph database.
//!
//! Every statement succeeds with an empty result unless a scripted rule
//! matches it. Echoing mode answers each statement with its own text, which
//! makes any transformation that changes the rendered statement look like a
//! logic bug.

use cypher_generation::{Schema, Seed};
use regex::Regex;

use crate::dbms::{DbError, Driver, QueryResult};

#[derive(Debug, Clone)]
pub enum MockOutcome {
    Error(String),
    Rows(Vec<Vec<String>>),
    /// The connection drops after the statement.
    Crash,
}

#[derive(Debug, Clone)]
struct MockRule {
    pattern: Regex,
    outcome: MockOutcome,
}

#[derive(Debug, Clone)]
pub struct MockDriver {
    statements_per_query: usize,
    echo: bool,
    rules: Vec<MockRule>,
    /// Statements run since the last reset.
    executed: Vec<String>,
    connected: bool,
    resets: usize,
}

impl Default for MockDriver {
    fn default() -> Self {
        Self::new(4)
    }
}

impl MockDriver {
    pub fn new(statements_per_query: usize) -> Self {
        Self {
            statements_per_query: statements_per_query.max(1),
            echo: false,
            rules: Vec::new(),
            executed: Vec::new(),
            connected: true,
            resets: 0,
        }
    }

    pub fn echoing(mut self) -> Self {
        self.echo = true;
        self
    }

    /// Statements matching `pattern` produce `outcome`. The first matching
    /// rule wins.
    pub fn with_rule(mut self, pattern: &str, outcome: MockOutcome) -> Result<Self, regex::Error> {
        self.rules.push(MockRule {
            pattern: Regex::new(pattern)?,
            outcome,
        });
        Ok(self)
    }

    pub fn executed(&self) -> &[String] {
        &self.executed
    }

    pub fn resets(&self) -> usize {
        self.resets
    }
}

impl Driver for MockDriver {
    fn init(&mut self) -> Result<(), DbError> {
        self.connected = true;
        Ok(())
    }

    fn reset(&mut self) -> Result<(), DbError> {
        self.executed.clear();
        self.connected = true;
        self.resets += 1;
        Ok(())
    }

    fn schema(&mut self) -> Result<Schema, DbError> {
        Ok(Schema::new())
    }

    fn run_query(&mut self, statement: &str) -> QueryResult {
        tracing::trace!(statement, "mock executing");
        self.executed.push(statement.to_string());
        let rule = self.rules.iter().find(|r| r.pattern.is_match(statement));
        match rule.map(|r| &r.outcome) {
            Some(MockOutcome::Error(message)) => QueryResult::error(DbError::Query(message.clone())),
            Some(MockOutcome::Rows(rows)) => QueryResult::rows(rows.clone()),
            Some(MockOutcome::Crash) => {
                self.connected = false;
                QueryResult::error(DbError::Connection("server closed the connection".into()))
            }
            None if self.echo => QueryResult::rows(vec![vec![statement.to_string()]]),
            None => QueryResult::rows(Vec::new()),
        }
    }

    fn verify_connectivity(&mut self) -> Result<(), DbError> {
        if self.connected {
            Ok(())
        } else {
            Err(DbError::Connection("mock is down".into()))
        }
    }

    fn discard_query(&mut self, result: &QueryResult, _: &mut Seed) -> bool {
        result.produced_error.is_some() || self.executed.len() >= self.statements_per_query
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dbms::{ErrorMessageRegex, QueryResultType};

    #[test]
    fn rules_script_results() {
        let mut db = MockDriver::default()
            .with_rule("DELETE", MockOutcome::Error("boom".into()))
            .unwrap()
            .with_rule("RETURN", MockOutcome::Rows(vec![vec!["1".into()]]))
            .unwrap();
        let regex = ErrorMessageRegex::default();

        let deleted = db.run_query("MATCH (n) DELETE n RETURN n");
        assert_eq!(deleted.error_message().as_deref(), Some("boom"));
        assert_eq!(db.query_result_type(&deleted, &regex), QueryResultType::Bug);

        let returned = db.run_query("RETURN 1");
        assert_eq!(returned.rows, vec![vec!["1".to_string()]]);
        assert_eq!(db.query_result_type(&returned, &regex), QueryResultType::Valid);
    }

    #[test]
    fn discards_after_the_configured_statement_count() {
        let mut db = MockDriver::new(2);
        let mut seed = Seed::replay(Vec::new());
        let first = db.run_query("RETURN 1");
        assert!(!db.discard_query(&first, &mut seed));
        let second = db.run_query("RETURN 2");
        assert!(db.discard_query(&second, &mut seed));

        db.reset().unwrap();
        assert!(db.executed().is_empty());
        let third = db.run_query("RETURN 3");
        assert!(!db.discard_query(&third, &mut seed));
        assert_eq!(seed.consumed(), 0);
    }

    #[test]
    fn echoing_compares_by_statement() {
        let mut db = MockDriver::default().echoing();
        let a = db.run_query("RETURN 1");
        let b = db.run_query("RETURN 1");
        let c = db.run_query("RETURN (1)");
        assert!(db.is_equal_result(&a, &b));
        assert!(!db.is_equal_result(&a, &c));
    }

    #[test]
    fn crashes_lose_the_connection() {
        let mut db = MockDriver::default()
            .with_rule("CRASH", MockOutcome::Crash)
            .unwrap();
        db.run_query("RETURN 'CRASH'");
        assert!(db.verify_connectivity().is_err());
        db.init().unwrap();
        assert!(db.verify_connectivity().is_ok());
    }
}
