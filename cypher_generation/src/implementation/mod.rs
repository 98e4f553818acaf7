//! Target adapters.
//!
//! An [Implementation] reshapes the OpenCypher grammar for one target: a table
//! of drop-ins replaces clauses of a given kind right before they generate,
//! and a [GenerationConfig] tunes what the remaining clauses may produce.

use std::collections::HashMap;

use crate::clause::{Clause, ClauseKind};
use crate::model::{GenerationConfig, Schema};
use crate::Seed;

pub mod memgraph;
pub mod neo4j;

/// Replaces a clause with a target specific one.
pub type DropIn = fn(Clause, &mut Seed, &mut Schema) -> Clause;

#[derive(Debug, Clone)]
pub struct Implementation {
    name: &'static str,
    drop_ins: HashMap<ClauseKind, DropIn>,
    config: GenerationConfig,
}

impl Implementation {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            drop_ins: HashMap::new(),
            config: GenerationConfig::default(),
        }
    }

    /// Plain OpenCypher: no drop-ins and the default config.
    pub fn opencypher() -> Self {
        Self::new("opencypher")
    }

    pub fn memgraph() -> Self {
        memgraph::drop_ins()
            .into_iter()
            .fold(Self::new("memgraph"), |imp, (kind, drop_in)| imp.with_drop_in(kind, drop_in))
            .with_config(memgraph::config())
    }

    pub fn neo4j() -> Self {
        neo4j::drop_ins()
            .into_iter()
            .fold(Self::new("neo4j"), |imp, (kind, drop_in)| imp.with_drop_in(kind, drop_in))
            .with_config(neo4j::config())
    }

    /// Registers `drop_in` for every clause of `kind`, replacing any previous one.
    pub fn with_drop_in(mut self, kind: ClauseKind, drop_in: DropIn) -> Self {
        self.drop_ins.insert(kind, drop_in);
        self
    }

    pub fn with_config(mut self, config: GenerationConfig) -> Self {
        self.config = config;
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    pub fn has_drop_in(&self, kind: ClauseKind) -> bool {
        self.drop_ins.contains_key(&kind)
    }

    /// Applies the drop-in registered for the clause's kind, if any.
    pub fn adapt(&self, clause: Clause, seed: &mut Seed, s: &mut Schema) -> Clause {
        let kind = clause.kind();
        match self.drop_ins.get(&kind) {
            Some(drop_in) => {
                let adapted = drop_in(clause, seed, s);
                tracing::trace!(from = %kind, to = %adapted.kind(), "applied drop-in");
                adapted
            }
            None => clause,
        }
    }
}

/// Targets a query can be generated for.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString, strum::EnumIter,
)]
#[strum(serialize_all = "lowercase")]
pub enum Target {
    /// Plain OpenCypher, executed against the mock driver.
    Mock,
    Memgraph,
    Neo4j,
}

impl Target {
    pub fn implementation(self) -> Implementation {
        match self {
            Target::Mock => Implementation::opencypher(),
            Target::Memgraph => Implementation::memgraph(),
            Target::Neo4j => Implementation::neo4j(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clause::{EmptyClause, Stringer};
    use std::str::FromStr;

    #[test]
    fn adapt_applies_only_registered_kinds() {
        let imp = Implementation::opencypher()
            .with_drop_in(ClauseKind::Empty, |_, _, _| Stringer::new("x").into());
        let mut seed = Seed::replay(Vec::new());
        let mut s = Schema::new();

        let adapted = imp.adapt(EmptyClause.into(), &mut seed, &mut s);
        assert_eq!(adapted, Clause::stringer("x"));

        // No chaining: the substitute is not adapted again.
        let untouched = imp.adapt(Clause::stringer("y"), &mut seed, &mut s);
        assert_eq!(untouched, Clause::stringer("y"));
    }

    #[test]
    fn targets_parse() {
        assert_eq!(Target::from_str("neo4j").unwrap(), Target::Neo4j);
        assert_eq!(Target::Memgraph.to_string(), "memgraph");
        assert_eq!(Target::Memgraph.implementation().name(), "memgraph");
        assert!(Target::Neo4j.implementation().has_drop_in(ClauseKind::RootClause));
        assert!(!Target::Mock.implementation().has_drop_in(ClauseKind::RootClause));
    }
}
