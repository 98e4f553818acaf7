//! Query execution.
//!
//! A [Session] ties a strategy to a driver and a target dialect. It runs whole
//! queries from a seed the way the fuzzing loop does, replays captured trees
//! for the reducer and reruns persisted statements.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use cypher_generation::{generate_captured_statement, Capturer, Implementation, Seed, Target};

use crate::dbms::{Driver, ErrorMessageRegex, QueryResult, QueryResultType};
use crate::strategy::{FuzzingStrategy, Strategy};

const CONNECTION_RETRIES: usize = 3;
const CONNECTION_RETRY_INTERVAL: Duration = Duration::from_millis(500);

/// Configuration for a [Session].
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub target: Target,
    pub strategy: FuzzingStrategy,
    /// Node budget per statement, unlimited if not positive.
    pub max_ast_nodes: i64,
    /// Hard limit on statements per query, on top of the driver's own.
    pub max_statements: usize,
    pub regex: ErrorMessageRegex,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            target: Target::Mock,
            strategy: FuzzingStrategy::default(),
            max_ast_nodes: 0,
            max_statements: 64,
            regex: ErrorMessageRegex::default(),
        }
    }
}

/// One query as it ran: the captured tree, the rendered statement and the
/// classified result of every statement.
#[derive(Debug, Clone, Default)]
pub struct Execution {
    pub trees: Vec<Capturer>,
    pub statements: Vec<String>,
    pub results: Vec<QueryResult>,
}

impl Execution {
    /// Index of the first statement whose result is a bug.
    pub fn first_bug(&self) -> Option<usize> {
        self.results.iter().position(|r| r.ty.is_bug())
    }

    pub fn last_result(&self) -> Option<&QueryResult> {
        self.results.last()
    }

    fn push(&mut self, tree: Capturer, statement: String, result: QueryResult) {
        self.trees.push(tree);
        self.statements.push(statement);
        self.results.push(result);
    }
}

pub struct Session {
    config: SessionConfig,
    imp: Implementation,
    strategy: Box<dyn Strategy>,
    db: Box<dyn Driver>,
}

impl Session {
    pub fn new(config: SessionConfig, db: Box<dyn Driver>) -> Self {
        Self {
            imp: config.target.implementation(),
            strategy: config.strategy.into_strategy(),
            config,
            db,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn strategy(&self) -> &dyn Strategy {
        self.strategy.as_ref()
    }

    pub(crate) fn strategy_mut(&mut self) -> &mut dyn Strategy {
        self.strategy.as_mut()
    }

    pub fn driver(&self) -> &dyn Driver {
        self.db.as_ref()
    }

    /// Connects to the database, retrying a few times.
    pub fn connect(&mut self) -> Result<()> {
        let mut last_error = None;
        for attempt in 0..=CONNECTION_RETRIES {
            if attempt > 0 {
                tracing::info!(attempt, "couldn't establish a connection, retrying");
                std::thread::sleep(CONNECTION_RETRY_INTERVAL);
            }
            match self.db.init().and_then(|()| self.db.verify_connectivity()) {
                Ok(()) => {
                    tracing::debug!("connection established");
                    return Ok(());
                }
                Err(e) => last_error = Some(e),
            }
        }
        match last_error {
            Some(e) => Err(e).context("couldn't connect to the database"),
            None => bail!("couldn't connect to the database"),
        }
    }

    /// Runs a single statement and classifies the result, first by the
    /// driver, then by the strategy.
    pub fn run_query(&mut self, statement: &str) -> QueryResult {
        let mut result = run_classified(self.db.as_mut(), &self.config.regex, statement);
        if result.ty != QueryResultType::Crash {
            result.ty = self.strategy.query_result_type(self.db.as_ref(), &result);
        }
        result
    }

    /// Generates and runs one query from `seed`.
    ///
    /// The query ends when the strategy discards it, a statement times out or
    /// crashes the database, a statement exceeds the node budget, or the
    /// statement limit is reached. A statement exceeding the node budget is
    /// not run.
    pub fn execute_query(&mut self, seed: &mut Seed) -> Result<Execution> {
        self.strategy.reset();
        self.db.reset().context("couldn't reset the database")?;

        let mut execution = Execution::default();
        while execution.statements.len() < self.config.max_statements {
            let mut s = self.db.schema()?;
            let root = self.strategy.root_clause(&self.imp, &mut s, seed);
            let statement =
                match generate_captured_statement(seed, &mut s, root, &self.imp, self.config.max_ast_nodes) {
                    Ok(statement) => statement,
                    Err(e) => {
                        tracing::warn!("{e}, continuing with a new query");
                        break;
                    }
                };
            let tree = root.clone();
            tracing::debug!(statement_index = execution.statements.len(), "generated:\n{statement}");

            let result = self.run_query(&statement);
            let ty = result.ty;
            let discard = match ty {
                QueryResultType::Timeout => true,
                QueryResultType::Crash => {
                    tracing::info!("trying to recover the connection after a crash");
                    self.connect()?;
                    true
                }
                _ => self.strategy.discard_query(&result, self.db.as_mut(), seed)?,
            };
            execution.push(tree, statement, result);
            if discard {
                break;
            }
        }
        Ok(execution)
    }

    /// Renders `trees` in place with a fresh replay of `bytes` and runs them on
    /// a reset database.
    pub fn replay(&mut self, trees: &mut [Capturer], bytes: &[u8]) -> Result<(Vec<String>, Vec<QueryResult>)> {
        let mut seed = Seed::replay(bytes.to_vec());
        self.db.reset()?;
        self.strategy.start_replay(trees.len());

        let half = trees.len() / 2;
        let mut statements = Vec::with_capacity(trees.len());
        let mut results = Vec::with_capacity(trees.len());
        for (i, tree) in trees.iter_mut().enumerate() {
            tracing::trace!(statement_index = i, "replaying");
            if i == half && self.strategy.resets_between_halves() {
                self.db.reset()?;
            }
            let mut s = self.db.schema()?;
            let statement = generate_captured_statement(&mut seed, &mut s, tree, &self.imp, 0)?;
            let result = self.run_query(&statement);
            if result.ty == QueryResultType::Crash {
                self.connect()?;
            }
            statements.push(statement);
            results.push(result);
        }
        Ok((statements, results))
    }

    /// Runs persisted statements again and lets the strategy judge them.
    pub fn rerun(&mut self, statements: &[String]) -> Result<QueryResultType> {
        self.strategy.reset();
        self.db.reset()?;
        let regex = &self.config.regex;
        let mut run = |db: &mut dyn Driver, statement: &str| run_classified(db, regex, statement);
        let ty = self.strategy.rerun_query(statements, self.db.as_mut(), &mut run)?;
        Ok(ty)
    }
}

/// Runs `statement` and classifies the result on the driver's terms. A
/// statement after which the database is unreachable crashed it.
fn run_classified(db: &mut dyn Driver, regex: &ErrorMessageRegex, statement: &str) -> QueryResult {
    let mut result = db.run_query(statement);
    match db.verify_connectivity() {
        Ok(()) => result.ty = db.query_result_type(&result, regex),
        Err(e) => {
            tracing::error!("statement crashed the database");
            result.ty = QueryResultType::Crash;
            result.produced_error.get_or_insert(e);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockDriver, MockOutcome};

    fn session(strategy: FuzzingStrategy, db: MockDriver) -> Session {
        let config = SessionConfig {
            strategy,
            ..SessionConfig::default()
        };
        Session::new(config, Box::new(db))
    }

    #[test]
    fn queries_replay_from_their_byte_string() {
        for strategy in <FuzzingStrategy as strum::IntoEnumIterator>::iter() {
            let mut fuzzer = session(strategy, MockDriver::new(4));
            let mut seed = Seed::from_rng_seed(21);
            let original = fuzzer.execute_query(&mut seed).unwrap();
            assert!(!original.statements.is_empty());

            let replayed = fuzzer.execute_query(&mut Seed::replay(seed.byte_string().to_vec())).unwrap();
            assert_eq!(replayed.statements, original.statements, "{strategy}");
            assert_eq!(replayed.trees, original.trees, "{strategy}");
        }
    }

    #[test]
    fn replaying_trees_renders_the_same_statements() {
        let mut fuzzer = session(FuzzingStrategy::None, MockDriver::new(5));
        let mut seed = Seed::from_rng_seed(4);
        let original = fuzzer.execute_query(&mut seed).unwrap();

        let mut trees = original.trees.clone();
        let (statements, results) = fuzzer.replay(&mut trees, seed.byte_string()).unwrap();
        assert_eq!(statements, original.statements);
        assert_eq!(results.len(), original.results.len());
        assert_eq!(trees, original.trees);
    }

    #[test]
    fn crashes_end_the_query_and_reconnect() {
        let db = MockDriver::new(64).with_rule(".", MockOutcome::Crash).unwrap();
        let mut fuzzer = session(FuzzingStrategy::None, db);
        let execution = fuzzer.execute_query(&mut Seed::from_rng_seed(0)).unwrap();
        assert_eq!(execution.statements.len(), 1);
        assert_eq!(execution.first_bug(), Some(0));
        assert_eq!(execution.results[0].ty, QueryResultType::Crash);
        assert!(fuzzer.db.verify_connectivity().is_ok());
    }

    #[test]
    fn statement_limit_caps_queries() {
        let config = SessionConfig {
            strategy: FuzzingStrategy::None,
            max_statements: 2,
            ..SessionConfig::default()
        };
        let mut fuzzer = Session::new(config, Box::new(MockDriver::new(64)));
        let execution = fuzzer.execute_query(&mut Seed::from_rng_seed(9)).unwrap();
        assert!(execution.statements.len() <= 2);
    }

    #[test]
    fn node_budget_ends_the_query_early() {
        let config = SessionConfig {
            strategy: FuzzingStrategy::None,
            max_ast_nodes: 2,
            ..SessionConfig::default()
        };
        let mut fuzzer = Session::new(config, Box::new(MockDriver::new(64)));
        let execution = fuzzer.execute_query(&mut Seed::from_rng_seed(9)).unwrap();
        assert!(execution.statements.is_empty());
    }

    #[test]
    fn errors_are_classified_by_the_configured_patterns() {
        let db = MockDriver::new(64)
            .with_rule("MATCH", MockOutcome::Error("known issue #12".into()))
            .unwrap()
            .with_rule("CREATE", MockOutcome::Error("syntax error".into()))
            .unwrap();
        let config = SessionConfig {
            strategy: FuzzingStrategy::None,
            regex: ErrorMessageRegex::new(&["^syntax"], &["known issue"]).unwrap(),
            ..SessionConfig::default()
        };
        let mut fuzzer = Session::new(config, Box::new(db));
        assert_eq!(fuzzer.run_query("MATCH (n) RETURN n").ty, QueryResultType::ReportedBug);
        assert_eq!(fuzzer.run_query("CREATE ()").ty, QueryResultType::Invalid);
        assert_eq!(fuzzer.run_query("RETURN 1").ty, QueryResultType::Valid);
    }

    #[test]
    fn reruns_use_the_strategy() {
        let db = MockDriver::default().with_rule("boom", MockOutcome::Error("boom".into())).unwrap();
        let mut fuzzer = session(FuzzingStrategy::None, db);
        let statements = ["RETURN 1", "RETURN 'boom'"].map(String::from);
        assert_eq!(fuzzer.rerun(&statements).unwrap(), QueryResultType::Bug);
        assert_eq!(fuzzer.rerun(&statements[..1]).unwrap(), QueryResultType::Valid);
    }
}
