use std::borrow::Cow;

use super::util::{decide_on_label_match_type, optional_clause};
use super::Expression;
use crate::capture::Capturer;
use crate::clause::{Clause, Production};
use crate::implementation::Implementation;
use crate::model::{ExpressionConfig, ExpressionType, PropertyType, Schema};
use crate::Seed;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CaseExpression {
    pub conf: ExpressionConfig,
}

impl CaseExpression {
    pub fn new(conf: ExpressionConfig) -> Self {
        Self { conf }
    }
}

impl Production for CaseExpression {
    fn generate(&mut self, seed: &mut Seed, s: &mut Schema, _: &Implementation) -> Vec<Clause> {
        // Which branch gets deleted is unknown.
        self.conf.gets_deleted = false;
        decide_on_label_match_type(seed, s);
        if seed.random_boolean() {
            vec![SimpleCaseExpression { conf: self.conf }.into()]
        } else {
            vec![GenericCaseExpression { conf: self.conf }.into()]
        }
    }
}

/// Non-null cases need an ELSE, as no WHEN might match.
fn else_branch(seed: &mut Seed, conf: ExpressionConfig) -> Clause {
    if conf.must_be_non_null {
        CaseExpressionElse::new(conf).into()
    } else {
        optional_clause(seed, CaseExpressionElse::new(conf))
    }
}

/// `CASE x WHEN .. END`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimpleCaseExpression {
    pub conf: ExpressionConfig,
}

impl Production for SimpleCaseExpression {
    fn generate(&mut self, seed: &mut Seed, _: &mut Schema, _: &Implementation) -> Vec<Clause> {
        let otherwise = else_branch(seed, self.conf);
        vec![
            Expression::new(self.conf).into(),
            CaseExpressionWhen::new(self.conf, false).into(),
            otherwise,
        ]
    }

    fn template(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Borrowed("CASE %s %s %s END"))
    }
}

/// `CASE WHEN condition .. END`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenericCaseExpression {
    pub conf: ExpressionConfig,
}

impl Production for GenericCaseExpression {
    fn generate(&mut self, seed: &mut Seed, _: &mut Schema, _: &Implementation) -> Vec<Clause> {
        let otherwise = else_branch(seed, self.conf);
        vec![CaseExpressionWhen::new(self.conf, true).into(), otherwise]
    }

    fn template(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Borrowed("CASE %s %s END"))
    }
}

/// One or more `WHEN .. THEN ..` branches.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CaseExpressionWhen {
    pub conf: ExpressionConfig,
    /// Part of a generic case expression, so conditions are booleans.
    pub is_generic: bool,
}

impl CaseExpressionWhen {
    pub fn new(conf: ExpressionConfig, is_generic: bool) -> Self {
        Self { conf, is_generic }
    }
}

impl Production for CaseExpressionWhen {
    fn generate(&mut self, seed: &mut Seed, _: &mut Schema, _: &Implementation) -> Vec<Clause> {
        let mut when = ExpressionConfig::property(if self.is_generic {
            PropertyType::BOOLEAN
        } else {
            PropertyType::ANY
        });
        when.target_type = ExpressionType::PropertyValue;
        when.is_constant_expression = self.conf.is_constant_expression;
        vec![
            Expression::new(when).into(),
            Expression::new(self.conf).into(),
            optional_clause(seed, CaseExpressionWhen::new(self.conf, self.is_generic)),
        ]
    }

    fn template(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Borrowed("WHEN %s THEN %s %s"))
    }

    fn no_strategy_reduce(&self, this: &Capturer) -> Option<Clause> {
        this.children().last().cloned().map(Clause::captured)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CaseExpressionElse {
    pub conf: ExpressionConfig,
}

impl CaseExpressionElse {
    pub fn new(conf: ExpressionConfig) -> Self {
        Self { conf }
    }
}

impl Production for CaseExpressionElse {
    fn generate(&mut self, _: &mut Seed, _: &mut Schema, _: &Implementation) -> Vec<Clause> {
        vec![Expression::new(self.conf).into()]
    }

    fn template(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Borrowed("ELSE %s"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::generate_statement;

    #[test]
    fn non_null_cases_always_have_an_else() {
        let conf = ExpressionConfig::property(PropertyType::INTEGER).non_null();
        for rng_seed in 0..50 {
            let query = generate_statement(
                &mut Seed::from_rng_seed(rng_seed),
                &mut Schema::new(),
                GenericCaseExpression { conf }.into(),
                &Implementation::opencypher(),
                0,
            )
            .unwrap();
            assert!(query.starts_with("CASE WHEN") && query.contains("ELSE"), "{query}");
        }
    }
}
