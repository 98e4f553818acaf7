//! Plain fuzzing: independent statements, bugs are errors the driver does not
//! expect.
//!
//! Reduction removes whole statements first, then shrinks each remaining
//! statement by replacing expressions with literals and finally nodes with
//! their reduction hint or nothing.

use cypher_generation::clauses::{PropertyLiteral, RootClause};
use cypher_generation::{Capturer, Clause, Implementation, Schema, Seed};

use super::{
    run_until_invalid, same_last_error, FuzzingStrategy, ProgressStage, ReductionProgress,
    RunNext, Strategy,
};
use crate::dbms::{DbError, Driver, QueryResult, QueryResultType};

#[derive(Debug)]
pub struct NoStrategy {
    current: Capturer,
}

impl Default for NoStrategy {
    fn default() -> Self {
        Self {
            current: Capturer::new(RootClause),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum Removal {
    #[default]
    NotStarted,
    /// Index of the statement to remove next, counting down.
    Next(usize),
    Done,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub(super) struct PlainProgress {
    removal: Removal,
    /// The statement being shrunk.
    statement: usize,
    /// Preorder index of the next expression to replace with a literal.
    expression: usize,
    expressions_done: bool,
    /// Preorder index of the next node to replace, counting down.
    node: Option<usize>,
}

impl From<PlainProgress> for ReductionProgress {
    fn from(progress: PlainProgress) -> Self {
        ReductionProgress {
            stage: ProgressStage::Plain(progress),
        }
    }
}

impl Strategy for NoStrategy {
    fn kind(&self) -> FuzzingStrategy {
        FuzzingStrategy::None
    }

    fn reset(&mut self) {
        *self = Self::default();
    }

    fn root_clause(&mut self, _: &Implementation, _: &mut Schema, _: &mut Seed) -> &mut Capturer {
        self.current = Capturer::new(RootClause);
        &mut self.current
    }

    fn discard_query(
        &mut self,
        result: &QueryResult,
        db: &mut dyn Driver,
        seed: &mut Seed,
    ) -> Result<bool, DbError> {
        Ok(db.discard_query(result, seed))
    }

    fn reduce_step(
        &mut self,
        progress: ReductionProgress,
        mut trees: Vec<Capturer>,
    ) -> (ReductionProgress, Vec<Capturer>, bool) {
        let mut progress = match progress.stage {
            ProgressStage::Plain(progress) => progress,
            _ => PlainProgress::default(),
        };

        if progress.removal == Removal::NotStarted {
            progress.removal = trees.len().checked_sub(2).map_or(Removal::Done, Removal::Next);
        }
        if let Removal::Next(index) = progress.removal {
            progress.removal = index.checked_sub(1).map_or(Removal::Done, Removal::Next);
            if index < trees.len() {
                trees.remove(index);
            }
            return (progress.into(), trees, false);
        }

        let index = progress.statement;
        if let Some(tree) = trees.get_mut(index) {
            if reduce_statement(&mut progress, tree) {
                tracing::info!(statement = index + 1, of = trees.len(), "finished reducing statement");
                progress = PlainProgress {
                    removal: Removal::Done,
                    statement: index + 1,
                    ..PlainProgress::default()
                };
            }
            return (progress.into(), trees, false);
        }

        (progress.into(), trees, true)
    }

    fn validate_reduction_result(&self, _: &dyn Driver, original: &[QueryResult], reduced: &[QueryResult]) -> bool {
        same_last_error(original, reduced)
    }

    fn rerun_query(
        &mut self,
        statements: &[String],
        db: &mut dyn Driver,
        run_next: &mut RunNext<'_>,
    ) -> Result<QueryResultType, DbError> {
        Ok(run_until_invalid(statements, db, run_next).0)
    }
}

/// One step on a single statement. Returns true once the root was replaced.
fn reduce_statement(progress: &mut PlainProgress, tree: &mut Capturer) -> bool {
    if !progress.expressions_done {
        if replace_expression(tree, progress.expression).is_err() {
            tracing::info!("done replacing expressions");
            progress.expressions_done = true;
        }
        progress.expression += 1;
        return false;
    }

    let target = *progress.node.get_or_insert_with(|| tree.node_count());
    replace_node(tree, target);
    progress.node = target.checked_sub(1);
    target == 0
}

/// Replaces the `index`-th expression in preorder with a literal of its type.
/// Returns the number of expressions in the tree if there is no such expression.
pub(super) fn replace_expression(capturer: &mut Capturer, index: usize) -> Result<(), usize> {
    let mut count = 0;
    if let Clause::Expression(expression) = capturer.clause() {
        if index == 0 {
            let literal = PropertyLiteral::new(expression.conf);
            capturer.update_clause(literal.into());
            return Ok(());
        }
        count += 1;
    }
    for child in capturer.children_mut() {
        match replace_expression(child, index - count) {
            Ok(()) => return Ok(()),
            Err(expressions) => count += expressions,
        }
    }
    Err(count)
}

/// Replaces the `index`-th node in preorder with its reduction hint, or an
/// empty clause if it has none.
pub(super) fn replace_node(capturer: &mut Capturer, mut index: usize) {
    if index == 0 {
        let reduced = capturer.no_strategy_reduce().unwrap_or_else(Clause::empty);
        capturer.update_clause(reduced);
        return;
    }
    index -= 1;
    for child in capturer.children_mut() {
        let size = child.node_count();
        if size > index {
            replace_node(child, index);
            return;
        }
        index -= size;
    }
}

#[cfg(test)]
mod tests {
    use cypher_generation::{generate_captured_statement, ClauseKind};

    use super::*;
    use crate::mock::{MockDriver, MockOutcome};

    fn generated(rng_seed: u64) -> Capturer {
        let imp = Implementation::opencypher();
        let mut root = Capturer::new(RootClause);
        generate_captured_statement(&mut Seed::from_rng_seed(rng_seed), &mut Schema::new(), &mut root, &imp, 0)
            .unwrap();
        root
    }

    fn count_kind(capturer: &Capturer, kind: ClauseKind) -> usize {
        let own = usize::from(capturer.clause().kind() == kind);
        own + capturer.children().iter().map(|c| count_kind(c, kind)).sum::<usize>()
    }

    fn labelled(names: &[&str]) -> Vec<Capturer> {
        names.iter().map(|n| Capturer::new(Clause::stringer(n))).collect()
    }

    fn names(trees: &[Capturer]) -> Vec<Clause> {
        trees.iter().map(|t| t.clause().clone()).collect()
    }

    #[test]
    fn statements_are_removed_from_the_second_to_last_backwards() {
        let mut strategy = NoStrategy::default();
        let trees = labelled(&["a", "b", "c"]);

        let (progress, first, done) = strategy.reduce_step(ReductionProgress::default(), trees.clone());
        assert!(!done);
        assert_eq!(names(&first), names(&labelled(&["a", "c"])));

        // The removal was rejected, the next step starts from the same trees.
        let (progress, second, done) = strategy.reduce_step(progress, trees.clone());
        assert!(!done);
        assert_eq!(names(&second), names(&labelled(&["b", "c"])));

        let (_, third, _) = strategy.reduce_step(progress, trees.clone());
        assert_eq!(third.len(), 3);
    }

    #[test]
    fn single_statement_reduction_terminates() {
        let mut strategy = NoStrategy::default();
        let tree = generated(11);
        let mut progress = ReductionProgress::default();
        let limit = 4 * tree.node_count() + 16;
        for _ in 0..limit {
            let (next, trees, done) = strategy.reduce_step(progress, vec![tree.clone()]);
            assert_eq!(trees.len(), 1);
            if done {
                return;
            }
            progress = next;
        }
        panic!("reduction did not finish within {limit} steps");
    }

    #[test]
    fn expressions_become_literals_in_preorder() {
        for rng_seed in 0..20 {
            let tree = generated(rng_seed);
            let expressions = count_kind(&tree, ClauseKind::Expression);

            let mut reduced = tree.clone();
            assert_eq!(replace_expression(&mut reduced, expressions), Err(expressions));
            assert_eq!(reduced, tree);

            if expressions == 0 {
                continue;
            }
            replace_expression(&mut reduced, 0).unwrap();
            assert_ne!(reduced, tree);
            assert!(count_kind(&reduced, ClauseKind::Expression) < expressions);
        }
    }

    #[test]
    fn replacing_the_root_shrinks_the_tree() {
        let tree = generated(3);
        let mut reduced = tree.clone();
        replace_node(&mut reduced, 0);
        assert!(reduced.node_count() < tree.node_count());

        let mut untouched = tree.clone();
        replace_node(&mut untouched, tree.node_count());
        assert_eq!(untouched, tree);
    }

    #[test]
    fn errors_are_the_symptom() {
        let strategy = NoStrategy::default();
        let db = MockDriver::default();
        let failed = |m: &str| QueryResult::error(DbError::Query(m.into()));
        assert!(strategy.validate_reduction_result(&db, &[failed("x")], &[failed("x")]));
        assert!(!strategy.validate_reduction_result(&db, &[failed("x")], &[QueryResult::default()]));
    }

    #[test]
    fn rerun_stops_at_the_first_failure() {
        let mut strategy = NoStrategy::default();
        let mut db = MockDriver::default()
            .with_rule("^B", MockOutcome::Error("bad".into()))
            .unwrap();
        let regex = crate::dbms::ErrorMessageRegex::default();
        let statements: Vec<String> = ["A", "B", "C"].map(String::from).to_vec();
        let mut run = |db: &mut dyn Driver, statement: &str| {
            let mut result = db.run_query(statement);
            result.ty = db.query_result_type(&result, &regex);
            result
        };
        assert_eq!(
            strategy.rerun_query(&statements, &mut db, &mut run).unwrap(),
            QueryResultType::Bug
        );
        assert_eq!(db.executed(), ["A", "B"]);
    }

    #[test]
    fn queries_end_when_the_driver_says_so() {
        let mut strategy = NoStrategy::default();
        let mut db = MockDriver::new(3);
        let (trees, statements, results) =
            super::super::tests::run_query(&mut strategy, &mut db, &mut Seed::from_rng_seed(1));
        assert!(statements.len() <= 3);
        assert_eq!(trees.len(), statements.len());
        if results.iter().all(|r| r.produced_error.is_none()) {
            assert_eq!(statements.len(), 3);
        }
    }
}
