//! Equivalence transformation.
//!
//! A query is generated statement by statement until the driver has enough of
//! them. The database is then reset and every statement runs again, this time
//! with some of its nodes replaced by semantically equivalent ones. A
//! transformed statement whose result differs from its original's is a logic
//! bug.
//!
//! Transformed nodes are wrapped in a [TransformedClause] that keeps both
//! branches, so reduction can flip single transformations back and shrink the
//! original and the transformed statement in lockstep.

use cypher_generation::clause::TransformedClause;
use cypher_generation::clauses::RootClause;
use cypher_generation::{Capturer, Clause, Implementation, Production, Schema, Seed};

use super::{FuzzingStrategy, ProgressStage, ReductionProgress, RunNext, Strategy};
use crate::dbms::{DbError, Driver, QueryResult, QueryResultType};

const TRANSFORM_PROBABILITY: f64 = 0.25;

#[derive(Debug, Default)]
pub struct EquivalenceTransformation {
    statements_to_generate: usize,
    generated: Vec<Capturer>,
    /// Results of the original statements, followed by the transformed ones.
    previous_results: Vec<QueryResult>,
    is_transforming: bool,
    /// The statement being generated or transformed.
    statement_index: usize,
    replay: Option<Replay>,
}

/// Results of replaying finished trees: originals followed by their
/// transformed twins.
#[derive(Debug, Default)]
struct Replay {
    half: usize,
    results: Vec<QueryResult>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub(super) enum EquivalenceProgress {
    /// Drop the original statements that have no transformed counterpart.
    #[default]
    Untransformed,
    /// Drop pairs of leading statements, counting down from the second to last.
    Starting { next: Option<usize> },
    /// Flip transformations back to their original, one at a time.
    Transformations { statement: usize, flip: usize },
    /// Shrink an original statement and its transformed twin together.
    Clauses { statement: usize, clause: usize },
    Finished,
}

impl From<EquivalenceProgress> for ReductionProgress {
    fn from(progress: EquivalenceProgress) -> Self {
        ReductionProgress {
            stage: ProgressStage::Equivalence(progress),
        }
    }
}

impl Strategy for EquivalenceTransformation {
    fn kind(&self) -> FuzzingStrategy {
        FuzzingStrategy::EquivalenceTransformation
    }

    fn reset(&mut self) {
        *self = Self::default();
    }

    fn root_clause(&mut self, imp: &Implementation, s: &mut Schema, seed: &mut Seed) -> &mut Capturer {
        s.disallow_return_all = true;
        if self.is_transforming {
            // The caller keeps its own copy of the original tree.
            equivalence_transform(imp, &mut self.generated[self.statement_index], seed);
        } else {
            self.statements_to_generate += 1;
            self.generated.push(Capturer::new(RootClause));
        }
        &mut self.generated[self.statement_index]
    }

    fn query_result_type(&mut self, db: &dyn Driver, result: &QueryResult) -> QueryResultType {
        if let Some(replay) = &mut self.replay {
            let index = replay.results.len();
            replay.results.push(result.clone());
            if result.ty != QueryResultType::Valid || index < replay.half {
                return result.ty;
            }
            return match replay.results.get(index - replay.half) {
                Some(original) if !db.is_equal_result(original, result) => QueryResultType::Bug,
                _ => QueryResultType::Valid,
            };
        }
        self.previous_results.push(result.clone());
        if !self.is_transforming || result.ty != QueryResultType::Valid {
            return result.ty;
        }
        match self.previous_results.get(self.statement_index) {
            Some(original) if !db.is_equal_result(original, result) => {
                tracing::debug!(statement = self.statement_index, "transformed result differs");
                QueryResultType::Bug
            }
            _ => QueryResultType::Valid,
        }
    }

    fn discard_query(
        &mut self,
        result: &QueryResult,
        db: &mut dyn Driver,
        seed: &mut Seed,
    ) -> Result<bool, DbError> {
        if result.ty == QueryResultType::Invalid && !self.is_transforming && self.statement_index != 0 {
            tracing::debug!(
                statements = self.statement_index,
                "invalid statement, transforming the ones before it"
            );
            self.is_transforming = true;
            self.statements_to_generate = self.statement_index;
            self.generated.pop();
            self.previous_results.pop();
            self.statement_index = 0;
            db.reset()?;
            return Ok(false);
        }
        if result.ty != QueryResultType::Valid {
            return Ok(true);
        }

        self.statement_index += 1;
        if !self.is_transforming && db.discard_query(result, seed) {
            tracing::debug!(statements = self.statement_index, "transforming");
            self.is_transforming = true;
            self.statement_index = 0;
            db.reset()?;
        }

        Ok(result.produced_error.is_some()
            || (self.is_transforming && self.statement_index == self.statements_to_generate))
    }

    fn reduce_step(
        &mut self,
        progress: ReductionProgress,
        mut trees: Vec<Capturer>,
    ) -> (ReductionProgress, Vec<Capturer>, bool) {
        let progress = match progress.stage {
            ProgressStage::Equivalence(progress) => progress,
            _ => EquivalenceProgress::default(),
        };

        let next = match progress {
            EquivalenceProgress::Untransformed => {
                let keep = (self.statement_index + 1).min(trees.len() / 2);
                let tail = trees.split_off(trees.len() - keep);
                trees.truncate(keep);
                trees.extend(tail);
                tracing::info!("finished removing untransformed statements");
                EquivalenceProgress::Starting { next: None }
            }
            EquivalenceProgress::Starting { next } => reduce_starting_statements(&mut trees, next),
            EquivalenceProgress::Transformations { statement, flip } => {
                reduce_transformations(&mut trees, statement, flip)
            }
            EquivalenceProgress::Clauses { statement, clause } => {
                reduce_equivalence_clauses(&mut trees, statement, clause)
            }
            EquivalenceProgress::Finished => {
                // A repeated reduction starts over with the starting statements.
                return (EquivalenceProgress::Starting { next: None }.into(), trees, true);
            }
        };
        (next.into(), trees, false)
    }

    fn validate_reduction_result(&self, db: &dyn Driver, original: &[QueryResult], reduced: &[QueryResult]) -> bool {
        let (Some(last_original), Some(last_reduced)) = (original.last(), reduced.last()) else {
            return false;
        };
        let failed = |r: &QueryResult| r.produced_error.is_some();

        if original.len() != reduced.len() {
            if failed(last_original) != failed(last_reduced) {
                return false;
            }
        } else if original.iter().zip(reduced).any(|(a, b)| failed(a) != failed(b)) {
            return false;
        }

        if failed(last_original) || failed(last_reduced) {
            let matching = last_original.error_message() == last_reduced.error_message();
            tracing::info!(matching, "comparing errors of the last statements");
            return matching;
        }

        let Some(last_untransformed) = (reduced.len() / 2)
            .checked_sub(1)
            .and_then(|i| reduced.get(i))
        else {
            return false;
        };
        let still_differs = !db.is_equal_result(last_untransformed, last_reduced);
        tracing::info!(still_differs, "comparing the last original and transformed results");
        still_differs
    }

    fn prepare_query_for_bugreport(&self, mut statements: Vec<String>) -> Vec<String> {
        let keep = (self.statement_index + 1).min(statements.len() / 2);
        let transformed = statements.split_off(statements.len() - keep);
        statements.truncate(keep);
        statements.extend(transformed);
        statements
    }

    fn rerun_query(
        &mut self,
        statements: &[String],
        db: &mut dyn Driver,
        run_next: &mut RunNext<'_>,
    ) -> Result<QueryResultType, DbError> {
        if statements.len() % 2 != 0 {
            tracing::warn!(statements = statements.len(), "odd number of statements, not comparing results");
            return Ok(QueryResultType::Invalid);
        }

        let half = statements.len() / 2;
        let mut results = Vec::with_capacity(statements.len());
        for (i, statement) in statements.iter().enumerate() {
            if i == half {
                db.reset()?;
            }
            let result = run_next(&mut *db, statement);
            if result.ty != QueryResultType::Valid {
                return Ok(result.ty);
            }
            results.push(result);
        }

        let (originals, transformed) = results.split_at(half);
        for (i, (a, b)) in originals.iter().zip(transformed).enumerate() {
            if !db.is_equal_result(a, b) {
                tracing::warn!(
                    statement = half + i + 1,
                    original = i + 1,
                    "transformed statement produced a different result"
                );
                return Ok(QueryResultType::Bug);
            }
        }
        Ok(QueryResultType::Valid)
    }

    fn resets_between_halves(&self) -> bool {
        true
    }

    fn start_replay(&mut self, statements: usize) {
        // Without a twin for every original nothing is compared.
        let half = if statements % 2 == 0 { statements / 2 } else { statements };
        self.replay = Some(Replay {
            half,
            results: Vec::with_capacity(statements),
        });
    }
}

/// Post-order walk replacing each transformable node, with a fixed
/// probability, by an equivalent one.
pub(super) fn equivalence_transform(imp: &Implementation, capturer: &mut Capturer, seed: &mut Seed) {
    for child in capturer.children_mut() {
        equivalence_transform(imp, child, seed);
    }

    if !capturer.clause().is_transformer() || !seed.boolean_with_probability(TRANSFORM_PROBABILITY) {
        return;
    }
    let original = capturer.clone();
    if let Some(transformed) = capturer.transform(seed, imp) {
        tracing::trace!(clause = %original.clause().kind(), "transformed");
        capturer.update_clause(TransformedClause::new(original, Capturer::new(transformed)).into());
    }
}

fn reduce_starting_statements(trees: &mut Vec<Capturer>, next: Option<usize>) -> EquivalenceProgress {
    let finished = EquivalenceProgress::Transformations { statement: 0, flip: 0 };
    let statements = trees.len() / 2;
    let Some(index) = next.or_else(|| statements.checked_sub(2)) else {
        tracing::info!("finished reducing starting statements");
        return finished;
    };
    if index + 1 < statements {
        trees.remove(statements + index);
        trees.remove(index);
    }
    match index.checked_sub(1) {
        Some(next) => EquivalenceProgress::Starting { next: Some(next) },
        None => {
            tracing::info!("finished reducing starting statements");
            finished
        }
    }
}

fn reduce_transformations(trees: &mut [Capturer], statement: usize, flip: usize) -> EquivalenceProgress {
    let flipped = trees.get_mut(statement).map(|tree| flip_transformed(tree, flip));
    match flipped {
        Some(Ok(next)) => EquivalenceProgress::Transformations { statement, flip: next },
        Some(Err(_)) if statement + 1 < trees.len() => EquivalenceProgress::Transformations {
            statement: statement + 1,
            flip: 0,
        },
        _ => {
            tracing::info!("finished reducing equivalence transformations");
            EquivalenceProgress::Clauses { statement: 0, clause: 0 }
        }
    }
}

/// Flips the `flip`-th transformation still in use, in preorder, back to its
/// original. On success returns the index of the next transformation to try,
/// otherwise the number of transformations found.
pub(super) fn flip_transformed(capturer: &mut Capturer, flip: usize) -> Result<usize, usize> {
    let mut encountered = 0;
    if let Clause::Transformed(transformed) = capturer.clause() {
        if flip == 0 && transformed.use_transformed {
            let flipped = transformed.flipped();
            capturer.update_clause(flipped.into());
            return Ok(1);
        }
        encountered += 1;
    }
    for child in capturer.children_mut() {
        match flip_transformed(child, flip.saturating_sub(encountered)) {
            Ok(next) => return Ok(encountered + next),
            Err(found) => encountered += found,
        }
    }
    Err(encountered)
}

fn reduce_equivalence_clauses(trees: &mut [Capturer], statement: usize, clause: usize) -> EquivalenceProgress {
    let half = trees.len() / 2;
    let (originals, transformed) = trees.split_at_mut(half);
    let reduced = match (originals.get_mut(statement), transformed.get_mut(statement)) {
        (Some(original), Some(transformed)) => reduce_clause_at_index(original, transformed, clause).is_ok(),
        _ => false,
    };
    if reduced {
        return EquivalenceProgress::Clauses {
            statement,
            clause: clause + 1,
        };
    }
    if statement + 1 < half {
        return EquivalenceProgress::Clauses {
            statement: statement + 1,
            clause: 0,
        };
    }
    tracing::info!("finished reducing equivalence clauses");
    EquivalenceProgress::Finished
}

/// Shrinks the `index`-th node of an original statement and the same node of
/// its transformed twin. Nodes below a transformation still in use are left
/// alone. Returns the number of nodes traversed if there is no such node.
pub(super) fn reduce_clause_at_index(
    original: &mut Capturer,
    transformed: &mut Capturer,
    index: usize,
) -> Result<(), usize> {
    let selected = match transformed.clause() {
        Clause::Transformed(t) => Some(t.use_transformed),
        _ => None,
    };
    let transformed = match selected {
        Some(true) => return Err(0),
        Some(false) => match transformed.children_mut().first_mut() {
            Some(child) => child,
            None => return Err(0),
        },
        None => transformed,
    };

    if index == 0 {
        let (original_reduced, transformed_reduced) = match original.no_strategy_reduce() {
            Some(reduced) => (
                reduced,
                transformed.no_strategy_reduce().unwrap_or_else(Clause::empty),
            ),
            None => (Clause::empty(), Clause::empty()),
        };
        original.update_clause(original_reduced);
        transformed.update_clause(transformed_reduced);
        return Ok(());
    }

    let mut traversed = 1;
    for (o, t) in original.children_mut().iter_mut().zip(transformed.children_mut()) {
        match reduce_clause_at_index(o, t, index - traversed) {
            Ok(()) => return Ok(()),
            Err(nodes) => traversed += nodes,
        }
    }
    Err(traversed)
}

#[cfg(test)]
mod tests {
    use cypher_generation::{generate_captured_statement, ClauseKind};

    use super::*;
    use crate::dbms::ErrorMessageRegex;
    use crate::mock::MockDriver;
    use crate::strategy::tests::run_query;

    fn render(imp: &Implementation, tree: &mut Capturer, seed: &mut Seed) -> String {
        let mut s = Schema::new();
        s.disallow_return_all = true;
        generate_captured_statement(seed, &mut s, tree, imp, 0).unwrap()
    }

    fn replay(imp: &Implementation, tree: &mut Capturer) -> String {
        render(imp, tree, &mut Seed::replay(Vec::new()))
    }

    fn count_used(capturer: &Capturer) -> usize {
        let own = match capturer.clause() {
            Clause::Transformed(t) => usize::from(t.use_transformed),
            _ => 0,
        };
        own + capturer.children().iter().map(count_used).sum::<usize>()
    }

    /// A generated statement and a rendered, transformed copy of it.
    fn transformed_pair(rng_seed: u64) -> (Capturer, String, Capturer) {
        let imp = Implementation::opencypher();
        let mut original = Capturer::new(RootClause);
        let rendered = render(&imp, &mut original, &mut Seed::from_rng_seed(rng_seed));
        let mut transformed = original.clone();
        equivalence_transform(&imp, &mut transformed, &mut Seed::from_rng_seed(rng_seed ^ 0xfeed));
        replay(&imp, &mut transformed);
        (original, rendered, transformed)
    }

    fn labelled(names: &[&str]) -> Vec<Capturer> {
        names.iter().map(|n| Capturer::new(Clause::stringer(n))).collect()
    }

    fn text(trees: &[Capturer]) -> Vec<Clause> {
        trees.iter().map(|t| t.clause().clone()).collect()
    }

    fn valid() -> QueryResult {
        QueryResult {
            ty: QueryResultType::Valid,
            ..QueryResult::default()
        }
    }

    #[test]
    fn untransformed_statements_are_equivalent_to_their_originals() {
        let imp = Implementation::opencypher();
        let regex = ErrorMessageRegex::default();
        for rng_seed in 0..30 {
            let (_, rendered, mut transformed) = transformed_pair(rng_seed);
            while flip_transformed(&mut transformed, 0).is_ok() {
                replay(&imp, &mut transformed);
            }
            assert_eq!(count_used(&transformed), 0);
            let flipped = replay(&imp, &mut transformed);
            assert_eq!(flipped, rendered);

            let mut strategy = EquivalenceTransformation::default();
            let mut db = MockDriver::default().echoing();
            let mut run = |db: &mut dyn Driver, statement: &str| {
                let mut result = db.run_query(statement);
                result.ty = db.query_result_type(&result, &regex);
                result
            };
            let verdict = strategy.rerun_query(&[rendered, flipped], &mut db, &mut run).unwrap();
            assert_eq!(verdict, QueryResultType::Valid);
            assert_eq!(db.resets(), 1);
        }
    }

    #[test]
    fn flips_walk_transformations_in_preorder() {
        for rng_seed in 0..30 {
            let (_, _, transformed) = transformed_pair(rng_seed);
            let used = count_used(&transformed);
            if used == 0 {
                continue;
            }
            let mut tree = transformed.clone();
            assert_eq!(flip_transformed(&mut tree, 0), Ok(1));
            assert!(count_used(&tree) < used);

            let mut untouched = transformed.clone();
            assert!(flip_transformed(&mut untouched, usize::MAX).is_err());
            assert_eq!(untouched, transformed);
        }
    }

    #[test]
    fn the_oracle_flags_differing_results() {
        let mut found = 0;
        for rng_seed in 0..40 {
            let mut strategy = EquivalenceTransformation::default();
            let mut db = MockDriver::new(3).echoing();
            let (trees, statements, results) = run_query(&mut strategy, &mut db, &mut Seed::from_rng_seed(rng_seed));
            assert_eq!(trees.len(), statements.len());
            let last = results.last().unwrap();
            if last.ty != QueryResultType::Bug {
                continue;
            }
            found += 1;
            let originals = strategy.statements_to_generate;
            let bug_at = strategy.statement_index;
            assert_eq!(statements.len(), originals + bug_at + 1);
            assert_ne!(statements[bug_at], statements[statements.len() - 1]);

            let reported = strategy.prepare_query_for_bugreport(statements.clone());
            assert_eq!(reported.len(), 2 * (bug_at + 1));
            assert_eq!(reported[..bug_at + 1], statements[..bug_at + 1]);
        }
        assert!(found > 0, "no transformation changed a statement");
    }

    #[test]
    fn invalid_statements_start_the_transformation() {
        let imp = Implementation::opencypher();
        let mut strategy = EquivalenceTransformation::default();
        let mut db = MockDriver::new(10);
        let mut seed = Seed::replay(Vec::new());

        strategy.root_clause(&imp, &mut Schema::new(), &mut seed);
        let first = valid();
        assert_eq!(strategy.query_result_type(&db, &first), QueryResultType::Valid);
        assert!(!strategy.discard_query(&first, &mut db, &mut seed).unwrap());

        strategy.root_clause(&imp, &mut Schema::new(), &mut seed);
        let invalid = QueryResult {
            ty: QueryResultType::Invalid,
            produced_error: Some(DbError::Query("syntax".into())),
            ..QueryResult::default()
        };
        strategy.query_result_type(&db, &invalid);
        assert!(!strategy.discard_query(&invalid, &mut db, &mut seed).unwrap());
        assert!(strategy.is_transforming);
        assert_eq!(strategy.generated.len(), 1);
        assert_eq!(strategy.statements_to_generate, 1);
        assert_eq!(db.resets(), 1);

        strategy.root_clause(&imp, &mut Schema::new(), &mut seed);
        let again = valid();
        assert_eq!(strategy.query_result_type(&db, &again), QueryResultType::Valid);
        assert!(strategy.discard_query(&again, &mut db, &mut seed).unwrap());
    }

    #[test]
    fn statements_are_generated_without_return_all() {
        let imp = Implementation::opencypher();
        let mut strategy = EquivalenceTransformation::default();
        let mut s = Schema::new();
        strategy.root_clause(&imp, &mut s, &mut Seed::replay(Vec::new()));
        assert!(s.disallow_return_all);
    }

    #[test]
    fn reduction_stages() {
        let mut strategy = EquivalenceTransformation {
            statement_index: 1,
            ..EquivalenceTransformation::default()
        };
        let trees = labelled(&["o0", "o1", "o2", "t0", "t1"]);

        let (progress, trees, done) = strategy.reduce_step(ReductionProgress::default(), trees);
        assert!(!done);
        assert_eq!(text(&trees), text(&labelled(&["o0", "o1", "t0", "t1"])));

        let (progress, trees, done) = strategy.reduce_step(progress, trees);
        assert!(!done);
        assert_eq!(text(&trees), text(&labelled(&["o1", "t1"])));

        // No transformations to flip in either statement.
        let (progress, trees, _) = strategy.reduce_step(progress, trees);
        let (progress, trees, _) = strategy.reduce_step(progress, trees);
        assert_eq!(
            progress,
            ReductionProgress::from(EquivalenceProgress::Clauses { statement: 0, clause: 0 })
        );

        let (progress, trees, _) = strategy.reduce_step(progress, trees);
        assert!(trees.iter().all(|t| t.clause().kind() == ClauseKind::Empty));
        let (progress, trees, done) = strategy.reduce_step(progress, trees);
        assert!(!done);
        let (progress, _, done) = strategy.reduce_step(progress, trees);
        assert!(done);
        assert_eq!(progress, ReductionProgress::from(EquivalenceProgress::Starting { next: None }));
    }

    #[test]
    fn unpaired_originals_are_dropped_first() {
        // The transformed twin of the third statement never ran.
        let mut strategy = EquivalenceTransformation {
            statement_index: 2,
            ..EquivalenceTransformation::default()
        };
        let trees = labelled(&["o0", "o1", "o2", "t0", "t1"]);
        let (progress, trees, done) = strategy.reduce_step(ReductionProgress::default(), trees);
        assert!(!done);
        assert_eq!(text(&trees), text(&labelled(&["o0", "o1", "t0", "t1"])));
        assert_eq!(progress, ReductionProgress::from(EquivalenceProgress::Starting { next: None }));

        let (_, trees, _) = strategy.reduce_step(progress, trees);
        assert_eq!(text(&trees), text(&labelled(&["o1", "t1"])));
    }

    #[test]
    fn replays_are_judged_on_their_own_results() {
        let db = MockDriver::default();
        let rows = |v: &str| QueryResult {
            ty: QueryResultType::Valid,
            ..QueryResult::rows(vec![vec![v.to_string()]])
        };
        let mut strategy = EquivalenceTransformation {
            is_transforming: true,
            previous_results: vec![rows("from the fuzzed query")],
            ..EquivalenceTransformation::default()
        };

        strategy.start_replay(2);
        assert_eq!(strategy.query_result_type(&db, &rows("a")), QueryResultType::Valid);
        assert_eq!(strategy.query_result_type(&db, &rows("a")), QueryResultType::Valid);

        strategy.start_replay(2);
        assert_eq!(strategy.query_result_type(&db, &rows("a")), QueryResultType::Valid);
        assert_eq!(strategy.query_result_type(&db, &rows("b")), QueryResultType::Bug);

        strategy.start_replay(3);
        for v in ["a", "b", "c"] {
            assert_eq!(strategy.query_result_type(&db, &rows(v)), QueryResultType::Valid);
        }
        assert_eq!(strategy.previous_results.len(), 1);
    }

    #[test]
    fn lockstep_reduction_terminates() {
        let imp = Implementation::opencypher();
        for rng_seed in 0..20 {
            let (original, _, transformed) = transformed_pair(rng_seed);
            let mut o = original.clone();
            let mut t = transformed.clone();
            let mut index = 0;
            while reduce_clause_at_index(&mut o, &mut t, index).is_ok() {
                replay(&imp, &mut o);
                replay(&imp, &mut t);
                index += 1;
            }
            assert!(o.node_count() <= original.node_count());
            assert!(index <= original.node_count());
        }
    }

    #[test]
    fn validation_compares_errors_then_results() {
        let strategy = EquivalenceTransformation::default();
        let db = MockDriver::default();
        let rows = |v: &str| QueryResult::rows(vec![vec![v.to_string()]]);
        let failed = |m: &str| QueryResult::error(DbError::Query(m.into()));

        assert!(strategy.validate_reduction_result(&db, &[rows("a"), rows("b")], &[rows("a"), rows("c")]));
        assert!(!strategy.validate_reduction_result(&db, &[rows("a"), rows("b")], &[rows("a"), rows("a")]));
        assert!(strategy.validate_reduction_result(&db, &[rows("a"), failed("x")], &[rows("a"), failed("x")]));
        assert!(!strategy.validate_reduction_result(&db, &[rows("a"), failed("x")], &[rows("a"), failed("y")]));
        assert!(!strategy.validate_reduction_result(&db, &[failed("x"), rows("a")], &[rows("x"), rows("a")]));
        assert!(!strategy.validate_reduction_result(&db, &[rows("a")], &[]));
    }
}
