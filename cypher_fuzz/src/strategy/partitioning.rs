//! Predicate partitioning.
//!
//! After a few statements that populate the database, a `MATCH .. RETURN ..`
//! query runs once as is and once split into three `UNION ALL` partitions by a
//! predicate: the rows where it holds, where it does not and where it is null.
//! Both must return the same rows.

use cypher_generation::clauses::{Index, PathPatternExpression, Return, WhereExpression, WriteClause};
use cypher_generation::{Capturer, Clause, Implementation, Schema, Seed};

use super::{run_until_invalid, FuzzingStrategy, ReductionProgress, RunNext, Strategy};
use crate::dbms::{DbError, Driver, QueryResult, QueryResultType};

/// The predicate is generated but not part of the original query.
const ORIGINAL: &str = "MATCH %s %[3]s";

const PARTITIONS: &str = "MATCH %s
WHERE %s
%s
\tUNION ALL
MATCH %[1]s
WHERE NOT (%s)
%s
\tUNION ALL
MATCH %[1]s
WHERE (%s) IS NULL
%s";

#[derive(Debug)]
pub struct PredicatePartitioning {
    generated_schema: bool,
    generated_original: bool,
    generated_partitions: bool,
    original_result: Option<QueryResult>,
    current: Capturer,
}

impl Default for PredicatePartitioning {
    fn default() -> Self {
        Self {
            generated_schema: false,
            generated_original: false,
            generated_partitions: false,
            original_result: None,
            current: Capturer::new(Clause::empty()),
        }
    }
}

impl Strategy for PredicatePartitioning {
    fn kind(&self) -> FuzzingStrategy {
        FuzzingStrategy::PredicatePartitioning
    }

    fn reset(&mut self) {
        *self = Self::default();
    }

    fn root_clause(&mut self, _: &Implementation, s: &mut Schema, seed: &mut Seed) -> &mut Capturer {
        let clause = if !self.generated_schema {
            if seed.get_byte() % 5 == 0 {
                self.generated_schema = true;
            }
            if seed.get_byte() % 5 == 0 {
                Index.into()
            } else {
                WriteClause.into()
            }
        } else if !self.generated_original {
            self.generated_original = true;
            s.disallow_aggregate_functions = true;
            Clause::assembler(
                ORIGINAL,
                vec![
                    PathPatternExpression::default().into(),
                    WhereExpression.into(),
                    Return::default().into(),
                ],
            )
        } else {
            self.generated_partitions = true;
            // The original query's parts, exactly as they were generated.
            let parts = self.current.children().iter().cloned().map(Clause::captured).collect();
            Clause::assembler(PARTITIONS, parts)
        };
        self.current = Capturer::new(clause);
        &mut self.current
    }

    fn query_result_type(&mut self, db: &dyn Driver, result: &QueryResult) -> QueryResultType {
        if result.ty != QueryResultType::Valid {
            return result.ty;
        }
        if self.generated_original && !self.generated_partitions {
            self.original_result = Some(result.clone());
        }
        if !self.generated_partitions {
            return QueryResultType::Valid;
        }
        match &self.original_result {
            Some(original) if !db.is_equal_result(original, result) => {
                tracing::debug!("partitions differ from the original query");
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
        Ok(db.discard_query(result, seed) || self.generated_partitions)
    }

    fn reduce_step(
        &mut self,
        progress: ReductionProgress,
        trees: Vec<Capturer>,
    ) -> (ReductionProgress, Vec<Capturer>, bool) {
        (progress, trees, true)
    }

    fn validate_reduction_result(&self, _: &dyn Driver, _: &[QueryResult], _: &[QueryResult]) -> bool {
        true
    }

    /// The last two statements are the original query and its partitions.
    fn rerun_query(
        &mut self,
        statements: &[String],
        db: &mut dyn Driver,
        run_next: &mut RunNext<'_>,
    ) -> Result<QueryResultType, DbError> {
        let (ty, results) = run_until_invalid(statements, db, run_next);
        if ty != QueryResultType::Valid {
            return Ok(ty);
        }
        match results.as_slice() {
            [.., original, partitions] if !db.is_equal_result(original, partitions) => Ok(QueryResultType::Bug),
            _ => Ok(QueryResultType::Valid),
        }
    }
}
