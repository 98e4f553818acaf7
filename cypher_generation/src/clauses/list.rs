use std::borrow::Cow;

use super::util::{add_variable_to_schema, generate_unique_name};
use super::{
    Collect, Expression, FunctionApplicationExpression, OperatorApplicationExpression, OptionalWhereClause,
    VariableExpression,
};
use crate::clause::{Clause, Production};
use crate::implementation::Implementation;
use crate::model::{ExpressionConfig, Schema};
use crate::Seed;

/// Any expression evaluating to a list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListExpression {
    pub conf: ExpressionConfig,
    is_null: bool,
}

impl ListExpression {
    pub fn new(conf: ExpressionConfig) -> Self {
        Self {
            conf,
            is_null: false,
        }
    }
}

impl Production for ListExpression {
    fn generate(&mut self, seed: &mut Seed, s: &mut Schema, _: &Implementation) -> Vec<Clause> {
        if seed.boolean_with_probability(0.1) && !self.conf.must_be_non_null {
            self.is_null = true;
            return Vec::new();
        }
        let conf = self.conf;
        // Exhausted replays take the literal branch, which always terminates.
        if !seed.boolean_with_probability(0.8) {
            let subquery_allowed = !conf.is_constant_expression && !s.is_in_merge_clause;
            return match seed.random_intn(if subquery_allowed { 3 } else { 2 }) {
                0 => vec![ListComprehension::new(conf).into()],
                1 => vec![OperatorApplicationExpression::new(conf).into()],
                _ => vec![Collect::new(conf).into()],
            };
        }
        match seed.random_intn(3) {
            0 => vec![ListLiteral::new(conf).into()],
            1 => vec![FunctionApplicationExpression::new(conf).into()],
            _ => vec![VariableExpression::new(conf).into()],
        }
    }

    fn template(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Borrowed(if self.is_null { "null" } else { "%s" }))
    }
}

/// `[a, b, ..]`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListLiteral {
    pub conf: ExpressionConfig,
}

impl ListLiteral {
    pub fn new(conf: ExpressionConfig) -> Self {
        Self { conf }
    }
}

impl Production for ListLiteral {
    fn generate(&mut self, seed: &mut Seed, _: &mut Schema, _: &Implementation) -> Vec<Clause> {
        if seed.random_boolean() {
            return vec![Clause::empty()];
        }
        let mut item = self.conf;
        item.is_list = false;
        vec![ListLiteralItem::new(item).into()]
    }

    fn template(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Borrowed("[%s]"))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListLiteralItem {
    pub conf: ExpressionConfig,
    last: bool,
}

impl ListLiteralItem {
    pub fn new(conf: ExpressionConfig) -> Self {
        Self { conf, last: false }
    }
}

impl Production for ListLiteralItem {
    fn generate(&mut self, seed: &mut Seed, _: &mut Schema, _: &Implementation) -> Vec<Clause> {
        let mut items = vec![Expression::new(self.conf).into()];
        self.last = seed.random_boolean();
        if !self.last {
            items.push(ListLiteralItem::new(self.conf).into());
        }
        items
    }

    fn template(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Borrowed(if self.last { "%s" } else { "%s, %s" }))
    }
}

/// `[x IN list WHERE .. | ..]`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListComprehension {
    pub conf: ExpressionConfig,
    saved: Option<Schema>,
}

impl ListComprehension {
    pub fn new(conf: ExpressionConfig) -> Self {
        Self { conf, saved: None }
    }
}

impl Production for ListComprehension {
    fn generate(&mut self, _: &mut Seed, s: &mut Schema, _: &Implementation) -> Vec<Clause> {
        self.saved = Some(s.copy());
        let mut suffix = self.conf;
        suffix.is_list = false;
        suffix.can_contain_aggregating_functions = false;
        vec![
            ListComprehensionPrefix::new(self.conf).into(),
            ListComprehensionSuffix::new(suffix).into(),
        ]
    }

    fn template(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Borrowed("[%s %s]"))
    }

    fn modify_schema(&mut self, s: &mut Schema) {
        if let Some(saved) = self.saved.take() {
            s.restore_scope(saved);
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListComprehensionPrefix {
    pub conf: ExpressionConfig,
    iterator: String,
}

impl ListComprehensionPrefix {
    pub fn new(conf: ExpressionConfig) -> Self {
        Self {
            conf,
            iterator: String::new(),
        }
    }
}

impl Production for ListComprehensionPrefix {
    fn generate(&mut self, seed: &mut Seed, s: &mut Schema, _: &Implementation) -> Vec<Clause> {
        self.iterator = generate_unique_name(seed, s);
        vec![Expression::new(self.conf).into()]
    }

    fn template(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Owned(format!("{} IN %s", self.iterator)))
    }

    fn modify_schema(&mut self, s: &mut Schema) {
        let mut element = self.conf;
        element.is_list = false;
        add_variable_to_schema(s, &self.iterator, element);
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListComprehensionSuffix {
    pub conf: ExpressionConfig,
}

impl ListComprehensionSuffix {
    pub fn new(conf: ExpressionConfig) -> Self {
        Self { conf }
    }
}

impl Production for ListComprehensionSuffix {
    fn generate(&mut self, _: &mut Seed, _: &mut Schema, _: &Implementation) -> Vec<Clause> {
        vec![OptionalWhereClause::default().into(), Expression::new(self.conf).into()]
    }

    fn template(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Borrowed("%s | %s"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PropertyType;
    use crate::render::generate_statement;

    fn render(clause: Clause, seed: &mut Seed, s: &mut Schema) -> String {
        generate_statement(seed, s, clause, &Implementation::opencypher(), 0).unwrap()
    }

    #[test]
    fn exhausted_seed_renders_null_or_empty_list() {
        let conf = ExpressionConfig::property(PropertyType::INTEGER).list();
        let mut seed = Seed::replay(Vec::new());
        let rendered = render(ListExpression::new(conf).into(), &mut seed, &mut Schema::new());
        assert_eq!(rendered, "null");

        let rendered = render(
            ListExpression::new(conf.non_null()).into(),
            &mut Seed::replay(Vec::new()),
            &mut Schema::new(),
        );
        assert_eq!(rendered, "[]");
    }

    #[test]
    fn comprehension_iterator_does_not_leak() {
        let conf = ExpressionConfig::property(PropertyType::STRING).list();
        for rng_seed in 0..20 {
            let mut s = Schema::new();
            let rendered = render(
                ListComprehension::new(conf).into(),
                &mut Seed::from_rng_seed(rng_seed),
                &mut s,
            );
            assert!(rendered.starts_with('[') && rendered.contains(" | "), "{rendered}");
            assert!(s.property_variables_by_name.is_empty());
        }
    }
}
