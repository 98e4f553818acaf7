use std::borrow::Cow;

use super::util::{add_variable_to_schema, generate_expression_conf, generate_unique_name};
use super::{Expression, WhereClause};
use crate::clause::{Clause, Production};
use crate::implementation::Implementation;
use crate::model::{ExpressionConfig, Schema};
use crate::Seed;

/// `all`, `any`, `none` or `single` over a list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Predicate {
    pub conf: ExpressionConfig,
    function: &'static str,
    /// The scope to return to once the iterator goes out of scope.
    saved: Option<Schema>,
}

impl Predicate {
    pub fn new(conf: ExpressionConfig) -> Self {
        Self {
            conf,
            ..Self::default()
        }
    }
}

impl Production for Predicate {
    fn generate(&mut self, seed: &mut Seed, s: &mut Schema, _: &Implementation) -> Vec<Clause> {
        self.saved = Some(s.copy());
        self.function = *seed.random_choice(&["all", "any", "none", "single"]);
        vec![PredicatePrefix::new(self.conf).into(), WhereClause.into()]
    }

    fn template(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Owned(format!("{}(%s %s)", self.function)))
    }

    fn modify_schema(&mut self, s: &mut Schema) {
        if let Some(saved) = self.saved.take() {
            s.restore_scope(saved);
        }
    }
}

/// `x IN list`, binding the iterator for the predicate's condition.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PredicatePrefix {
    pub conf: ExpressionConfig,
    iterator: String,
    iterator_conf: ExpressionConfig,
}

impl PredicatePrefix {
    pub fn new(conf: ExpressionConfig) -> Self {
        Self {
            conf,
            ..Self::default()
        }
    }
}

impl Production for PredicatePrefix {
    fn generate(&mut self, seed: &mut Seed, s: &mut Schema, imp: &Implementation) -> Vec<Clause> {
        self.iterator = generate_unique_name(seed, s);
        let mut conf = generate_expression_conf(seed, imp.config());
        conf.is_list = false;
        conf.is_constant_expression = self.conf.is_constant_expression;
        conf.can_contain_aggregating_functions = self.conf.can_contain_aggregating_functions;
        conf.must_be_non_null = self.conf.must_be_non_null;
        self.iterator_conf = conf;
        vec![Expression::new(conf.list()).into()]
    }

    fn template(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Owned(format!("{} IN %s", self.iterator)))
    }

    fn modify_schema(&mut self, s: &mut Schema) {
        add_variable_to_schema(s, &self.iterator, self.iterator_conf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PropertyType;
    use crate::render::generate_statement;

    #[test]
    fn iterator_is_scoped_to_the_predicate() {
        let mut s = Schema::new();
        let query = generate_statement(
            &mut Seed::from_rng_seed(21),
            &mut s,
            Predicate::new(ExpressionConfig::property(PropertyType::BOOLEAN)).into(),
            &Implementation::opencypher(),
            0,
        )
        .unwrap();
        assert!(query.contains(" IN ") && query.contains("WHERE"), "{query}");
        assert!(s.property_variables_by_name.is_empty());
        assert!(s.structural_variables_by_name.is_empty());
    }
}
