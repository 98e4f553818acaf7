use std::borrow::Cow;

use super::util::decide_on_label_match_type;
use super::{Expression, PathPatternExpression, ReadClause, Tautum};
use crate::capture::Capturer;
use crate::clause::{Clause, Production};
use crate::implementation::Implementation;
use crate::model::{ExpressionConfig, PropertyType, Schema};
use crate::Seed;

/// `MATCH ..` followed by the rest of the read query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Match;

impl Production for Match {
    fn generate(&mut self, _: &mut Seed, _: &mut Schema, _: &Implementation) -> Vec<Clause> {
        vec![MatchClause::default().into(), ReadClause::default().into()]
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchClause {
    is_optional: bool,
}

impl Production for MatchClause {
    fn generate(&mut self, seed: &mut Seed, s: &mut Schema, imp: &Implementation) -> Vec<Clause> {
        decide_on_label_match_type(seed, s);
        let forced = s.has_optional_match && imp.config().disallow_match_after_optional_match;
        if forced || seed.random_boolean() {
            self.is_optional = true;
            s.has_optional_match = true;
        }
        vec![
            MatchElementChain::new(self.is_optional).into(),
            OptionalWhereClause::default().into(),
        ]
    }

    fn template(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Borrowed(if self.is_optional {
            "OPTIONAL MATCH %s %s "
        } else {
            "MATCH %s %s "
        }))
    }
}

/// Comma separated path patterns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchElementChain {
    pub is_optional: bool,
    is_base_case: bool,
}

impl MatchElementChain {
    pub fn new(is_optional: bool) -> Self {
        Self {
            is_optional,
            is_base_case: false,
        }
    }
}

impl Production for MatchElementChain {
    fn generate(&mut self, seed: &mut Seed, _: &mut Schema, _: &Implementation) -> Vec<Clause> {
        let path = PathPatternExpression::new(self.is_optional).into();
        if seed.boolean_with_probability(0.9) {
            self.is_base_case = true;
            return vec![path];
        }
        vec![path, MatchElementChain::new(self.is_optional).into()]
    }

    fn template(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Borrowed(if self.is_base_case { "%s" } else { "%s, %s" }))
    }

    fn no_strategy_reduce(&self, this: &Capturer) -> Option<Clause> {
        let index = if self.is_base_case { 0 } else { 1 };
        this.children().get(index).cloned().map(Clause::captured)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OptionalWhereClause {
    will_generate: bool,
}

impl Production for OptionalWhereClause {
    fn generate(&mut self, seed: &mut Seed, _: &mut Schema, _: &Implementation) -> Vec<Clause> {
        if seed.random_boolean() {
            return Vec::new();
        }
        self.will_generate = true;
        vec![WhereClause.into()]
    }

    fn is_transformer(&self) -> bool {
        true
    }

    /// A missing WHERE filters nothing, and neither does `WHERE true`.
    fn transform(&self, _: &mut Seed, _: &mut Schema, _: &[Capturer], _: &Implementation) -> Option<Clause> {
        if self.will_generate {
            return None;
        }
        Some(Clause::assembler(
            "WHERE %s",
            vec![Tautum::new(ExpressionConfig::property(PropertyType::BOOLEAN)).into()],
        ))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WhereClause;

impl Production for WhereClause {
    fn generate(&mut self, _: &mut Seed, _: &mut Schema, _: &Implementation) -> Vec<Clause> {
        vec![WhereExpression.into()]
    }

    fn template(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Borrowed("WHERE %s"))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WhereExpression;

impl Production for WhereExpression {
    fn generate(&mut self, _: &mut Seed, _: &mut Schema, _: &Implementation) -> Vec<Clause> {
        vec![Expression::new(ExpressionConfig::property(PropertyType::BOOLEAN)).into()]
    }
}
