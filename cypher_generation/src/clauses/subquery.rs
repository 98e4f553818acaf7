use std::borrow::Cow;

use super::util::{decide_on_label_match_type, generate_unique_name, optional_clause, populate_variables_to_return};
use super::{PathPatternExpression, Return, WhereClause, WithClause};
use crate::clause::{Clause, Production};
use crate::implementation::Implementation;
use crate::model::{ExpressionConfig, ExpressionType, PropertyVariable, Schema, StructuralVariable};
use crate::Seed;

fn subquery_body(seed: &mut Seed) -> Clause {
    if seed.random_boolean() {
        SimpleSubqueryExpressionBody::default().into()
    } else {
        SubqueryExpression::default().into()
    }
}

/// `EXISTS { .. }`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Exists;

impl Production for Exists {
    fn generate(&mut self, seed: &mut Seed, _: &mut Schema, _: &Implementation) -> Vec<Clause> {
        vec![subquery_body(seed)]
    }

    fn template(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Borrowed("EXISTS { %s }"))
    }
}

/// `COUNT { .. }`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Count;

impl Production for Count {
    fn generate(&mut self, seed: &mut Seed, _: &mut Schema, _: &Implementation) -> Vec<Clause> {
        vec![subquery_body(seed)]
    }

    fn template(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Borrowed("COUNT { %s }"))
    }
}

/// `COLLECT { .. RETURN x }`, a list of a single returned column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Collect {
    pub conf: ExpressionConfig,
}

impl Collect {
    pub fn new(conf: ExpressionConfig) -> Self {
        Self { conf }
    }
}

impl Production for Collect {
    fn generate(&mut self, seed: &mut Seed, s: &mut Schema, _: &Implementation) -> Vec<Clause> {
        self.conf.is_list = false;
        let column = generate_unique_name(seed, s);
        vec![SubqueryExpression::returning(column, self.conf).into()]
    }

    fn template(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Borrowed("COLLECT { %s }"))
    }
}

/// A single path pattern with an optional WHERE.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimpleSubqueryExpressionBody {
    saved: Option<Schema>,
}

impl Production for SimpleSubqueryExpressionBody {
    fn generate(&mut self, seed: &mut Seed, s: &mut Schema, _: &Implementation) -> Vec<Clause> {
        self.saved = Some(s.copy());
        decide_on_label_match_type(seed, s);
        *s = s.new_sub_context();
        vec![PathPatternExpression::default().into(), optional_clause(seed, WhereClause)]
    }

    fn modify_schema(&mut self, s: &mut Schema) {
        if let Some(saved) = self.saved.take() {
            s.restore_scope(saved);
        }
    }
}

/// A full subquery, possibly a UNION of several parts.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubqueryExpression {
    /// Set for COLLECT, which returns exactly this column.
    pub column: Option<(String, ExpressionConfig)>,
    saved: Option<Schema>,
}

impl SubqueryExpression {
    pub fn returning(name: String, conf: ExpressionConfig) -> Self {
        Self {
            column: Some((name, conf)),
            saved: None,
        }
    }
}

impl Production for SubqueryExpression {
    fn generate(&mut self, seed: &mut Seed, s: &mut Schema, imp: &Implementation) -> Vec<Clause> {
        self.saved = Some(s.copy());
        decide_on_label_match_type(seed, s);
        *s = s.new_sub_context();

        match &self.column {
            None => {
                if seed.random_boolean() {
                    populate_variables_to_return(seed, s, imp.config());
                }
            }
            Some((name, conf)) => {
                s.must_return = true;
                s.property_variables_to_return.clear();
                s.structural_variables_to_return.clear();
                if conf.target_type == ExpressionType::StructuralValue {
                    s.structural_variables_to_return.push(StructuralVariable {
                        name: name.clone(),
                        ty: conf.structural_type,
                        likely_null: true,
                    });
                } else {
                    s.property_variables_to_return.push(PropertyVariable {
                        name: name.clone(),
                        ty: conf.property_type,
                        value: String::new(),
                    });
                }
            }
        }

        let is_union_all = if seed.random_boolean() {
            Some(seed.random_boolean())
        } else {
            None
        };
        vec![SubqueryExpressionBody::new(is_union_all, false).into()]
    }

    fn modify_schema(&mut self, s: &mut Schema) {
        if let Some(saved) = self.saved.take() {
            s.restore_scope(saved);
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubqueryExpressionBody {
    /// `None` for no UNION, otherwise whether it is a UNION ALL.
    pub is_union_all: Option<bool>,
    pub must_return: bool,
    has_union: bool,
}

impl SubqueryExpressionBody {
    pub fn new(is_union_all: Option<bool>, must_return: bool) -> Self {
        Self {
            is_union_all,
            must_return,
            has_union: false,
        }
    }
}

impl Production for SubqueryExpressionBody {
    fn generate(&mut self, seed: &mut Seed, s: &mut Schema, imp: &Implementation) -> Vec<Clause> {
        let next = if self.is_union_all.is_none() || seed.random_boolean() {
            Clause::empty()
        } else {
            self.has_union = true;
            // Every part of a UNION returns the same columns.
            if !self.must_return {
                populate_variables_to_return(seed, s, imp.config());
            }
            self.must_return = true;
            SubqueryExpressionBody::new(self.is_union_all, true).into()
        };
        vec![SubqueryExpressionBodyPart::new(self.must_return).into(), next]
    }

    fn template(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Borrowed(match (self.has_union, self.is_union_all) {
            (true, Some(true)) => "%s UNION ALL %s",
            (true, _) => "%s UNION %s",
            _ => "%s %s",
        }))
    }
}

/// `[WITH ..] MATCH .. [WHERE ..] [RETURN ..]`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubqueryExpressionBodyPart {
    pub must_return: bool,
    saved: Option<Schema>,
}

impl SubqueryExpressionBodyPart {
    pub fn new(must_return: bool) -> Self {
        Self {
            must_return,
            saved: None,
        }
    }
}

impl Production for SubqueryExpressionBodyPart {
    fn generate(&mut self, seed: &mut Seed, s: &mut Schema, _: &Implementation) -> Vec<Clause> {
        let saved = s.copy();
        let mut scope = s.new_sub_context();
        scope.must_return = saved.must_return;
        scope.property_variables_to_return = saved.property_variables_to_return.clone();
        scope.structural_variables_to_return = saved.structural_variables_to_return.clone();
        *s = scope;
        self.saved = Some(saved);

        let mut where_clause = optional_clause(seed, WhereClause);
        let last = if s.must_return || self.must_return {
            Return::default().into()
        } else {
            // A subquery cannot end in a bare MATCH.
            where_clause = WhereClause.into();
            Clause::empty()
        };
        vec![
            optional_clause(seed, WithClause::default()),
            PathPatternExpression::default().into(),
            where_clause,
            last,
        ]
    }

    fn template(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Borrowed("%s MATCH %s %s %s"))
    }

    fn modify_schema(&mut self, s: &mut Schema) {
        if let Some(saved) = self.saved.take() {
            s.restore_scope(saved);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{PropertyType, StructuralType};
    use crate::render::generate_statement;

    fn render(clause: Clause, rng_seed: u64, s: &mut Schema) -> String {
        generate_statement(&mut Seed::from_rng_seed(rng_seed), s, clause, &Implementation::opencypher(), 0)
            .unwrap()
    }

    #[test]
    fn subqueries_leave_the_outer_scope_alone() {
        for rng_seed in 0..30 {
            let mut s = Schema::new();
            s.add_structural_variable(StructuralVariable {
                name: "outer".into(),
                ty: StructuralType::NODE,
                likely_null: false,
            });
            let before = s.clone();
            let rendered = render(Exists.into(), rng_seed, &mut s);
            assert!(rendered.starts_with("EXISTS { "), "{rendered}");
            assert_eq!(s.structural_variables_by_name, before.structural_variables_by_name);
            assert!(!s.must_return);
        }
    }

    #[test]
    fn collect_returns_its_column() {
        for rng_seed in 0..30 {
            let mut s = Schema::new();
            let conf = ExpressionConfig::property(PropertyType::INTEGER);
            let rendered = render(Collect::new(conf.list()).into(), rng_seed, &mut s);
            assert!(rendered.starts_with("COLLECT { ") && rendered.contains("RETURN"), "{rendered}");
        }
    }
}
