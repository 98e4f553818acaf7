//! The reducer loop.
//!
//! Replays a bug-triggering byte string, then lets the session's strategy
//! shrink the captured statements one step at a time. A step is kept only if
//! re-running its statements still shows the bug.

use anyhow::{ensure, Result};
use cypher_generation::{Capturer, Seed};

use crate::dbms::QueryResult;
use crate::runner::{Execution, Session};
use crate::strategy::ReductionProgress;

#[derive(Debug, Clone)]
pub struct Reduction {
    /// The query as the byte string generated it.
    pub original: Execution,
    pub trees: Vec<Capturer>,
    /// The reduced statements, rendered and run once more on a reset database.
    pub statements: Vec<String>,
    pub last_result: QueryResult,
    pub steps: usize,
    pub accepted: usize,
}

/// Reduces the query `bytes` generates. With `full`, the reduction is repeated
/// for as long as it keeps changing the statements.
pub fn reduce(session: &mut Session, bytes: &[u8], full: bool) -> Result<Reduction> {
    session.connect()?;
    let original = session.execute_query(&mut Seed::replay(bytes.to_vec()))?;
    ensure!(
        original.first_bug().is_some(),
        "the byte string does not trigger a bug with the {} strategy",
        session.config().strategy
    );
    tracing::info!(statements = original.statements.len(), "reducing query");

    let mut best = original.trees.clone();
    let mut progress = ReductionProgress::default();
    let mut previous: Option<Vec<String>> = None;
    let (mut steps, mut accepted) = (0, 0);
    loop {
        let (next, mut candidate, done) = session.strategy_mut().reduce_step(progress, best.clone());
        progress = next;
        steps += 1;

        let (statements, results) = session.replay(&mut candidate, bytes)?;
        if session
            .strategy()
            .validate_reduction_result(session.driver(), &original.results, &results)
        {
            tracing::info!(step = steps, statements = candidate.len(), "reduction step successful");
            best = candidate;
            accepted += 1;
        } else {
            tracing::info!(step = steps, "reduction step unsuccessful");
        }

        if done {
            if full && previous.as_ref() != Some(&statements) {
                tracing::info!("reduction changed the statements, repeating");
                previous = Some(statements);
                continue;
            }
            break;
        }
    }
    tracing::info!(steps, accepted, "reduction done");

    let (statements, results) = session.replay(&mut best, bytes)?;
    let last_result = results.last().cloned().unwrap_or_default();
    Ok(Reduction {
        original,
        trees: best,
        statements,
        last_result,
        steps,
        accepted,
    })
}
