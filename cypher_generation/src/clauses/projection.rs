//! RETURN and the ORDER BY, SKIP and LIMIT modifiers shared with WITH.

use std::borrow::Cow;

use itertools::Itertools;

use super::util::{decide_on_label_match_type, optional_clause};
use super::{Expression, StructureName, WriteClause};
use crate::capture::Capturer;
use crate::clause::{Clause, Production};
use crate::implementation::Implementation;
use crate::model::{ExpressionConfig, PropertyType, Schema, StructuralType};
use crate::Seed;

fn projected_conf(mut conf: ExpressionConfig) -> ExpressionConfig {
    conf.can_contain_aggregating_functions = true;
    conf
}

/// A non-negative integer constant.
fn row_count() -> Expression {
    Expression::new(ExpressionConfig::property(PropertyType::POSITIVE_INTEGER).non_null().constant())
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Return {
    /// Either a predetermined RETURN or a write clause in its place.
    is_predetermined: bool,
}

impl Production for Return {
    fn generate(&mut self, seed: &mut Seed, s: &mut Schema, _: &Implementation) -> Vec<Clause> {
        if s.cannot_return {
            self.is_predetermined = true;
            return vec![WriteClause.into()];
        }
        decide_on_label_match_type(seed, s);

        if s.must_return {
            self.is_predetermined = true;
            return vec![PredeterminedReturn::default().into()];
        }

        let mut children = vec![optional_clause(seed, Clause::stringer("DISTINCT"))];
        let in_scope = s.property_variables_of(PropertyType::ANY).len()
            + s.structural_variables_of(StructuralType::ANY).len();
        if in_scope != 0 && seed.random_boolean() && !s.is_in_subquery && !s.disallow_return_all {
            children.push(Clause::stringer("*"));
        } else {
            children.push(ReturnElementChain::default().into());
        }
        children.extend([
            OptionalOrderBy::default().into(),
            OptionalSkip::default().into(),
            OptionalLimit::default().into(),
        ]);
        children
    }

    fn template(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Borrowed(if self.is_predetermined {
            "%s"
        } else {
            "RETURN %s %s %s %s %s"
        }))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReturnElementChain {
    is_base_case: bool,
}

impl Production for ReturnElementChain {
    fn generate(&mut self, seed: &mut Seed, _: &mut Schema, _: &Implementation) -> Vec<Clause> {
        self.is_base_case = seed.random_boolean();
        let mut children = vec![ReturnElement.into()];
        if !self.is_base_case {
            children.push(ReturnElementChain::default().into());
        }
        children
    }

    fn template(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Borrowed(if self.is_base_case { "%s" } else { "%s, %s" }))
    }

    fn no_strategy_reduce(&self, this: &Capturer) -> Option<Clause> {
        this.children().first().cloned().map(Clause::captured)
    }
}

/// `expression AS alias`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReturnElement;

impl Production for ReturnElement {
    fn generate(&mut self, _: &mut Seed, _: &mut Schema, _: &Implementation) -> Vec<Clause> {
        let mut conf = projected_conf(ExpressionConfig::any());
        conf.allow_maps = true;
        vec![Expression::new(conf).into(), StructureName::default().into()]
    }

    fn template(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Borrowed("%s AS %s"))
    }
}

/// Returns exactly the columns the schema asks for, in order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PredeterminedReturn {
    aliases: Vec<String>,
}

impl Production for PredeterminedReturn {
    fn generate(&mut self, _: &mut Seed, s: &mut Schema, _: &Implementation) -> Vec<Clause> {
        let mut children = Vec::new();
        for variable in &s.property_variables_to_return {
            children.push(Expression::new(projected_conf(ExpressionConfig::property(variable.ty))).into());
            self.aliases.push(variable.name.clone());
        }
        for variable in &s.structural_variables_to_return {
            // Falls back to null without a variable of the type.
            children.push(Expression::new(projected_conf(ExpressionConfig::structural(variable.ty))).into());
            self.aliases.push(variable.name.clone());
        }
        children
    }

    fn template(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Owned(format!(
            "RETURN {}",
            self.aliases.iter().map(|alias| format!("%s AS {alias}")).join(", ")
        )))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OptionalOrderBy {
    is_generated: bool,
}

impl Production for OptionalOrderBy {
    fn generate(&mut self, seed: &mut Seed, _: &mut Schema, _: &Implementation) -> Vec<Clause> {
        if seed.random_boolean() {
            return Vec::new();
        }
        self.is_generated = true;
        vec![OrderByExpressionChain::default().into()]
    }

    fn template(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Borrowed(if self.is_generated { "ORDER BY %s" } else { "" }))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderByExpressionChain {
    is_base_case: bool,
}

impl Production for OrderByExpressionChain {
    fn generate(&mut self, seed: &mut Seed, _: &mut Schema, _: &Implementation) -> Vec<Clause> {
        self.is_base_case = seed.random_boolean();
        let mut children = vec![OrderByExpression::default().into()];
        if !self.is_base_case {
            children.push(OrderByExpressionChain::default().into());
        }
        children
    }

    fn template(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Borrowed(if self.is_base_case { "%s" } else { "%s, %s" }))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderByExpression {
    order: &'static str,
}

impl Production for OrderByExpression {
    fn generate(&mut self, seed: &mut Seed, _: &mut Schema, _: &Implementation) -> Vec<Clause> {
        self.order = match seed.random_intn(3) {
            0 => "ASC",
            1 => "DESC",
            _ => "",
        };
        let mut conf = ExpressionConfig::any();
        conf.allow_maps = true;
        vec![Expression::new(conf).into()]
    }

    fn template(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Owned(format!("%s {}", self.order)))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OptionalSkip {
    will_generate: bool,
}

impl Production for OptionalSkip {
    fn generate(&mut self, seed: &mut Seed, _: &mut Schema, _: &Implementation) -> Vec<Clause> {
        self.will_generate = seed.random_boolean();
        if self.will_generate {
            vec![row_count().into()]
        } else {
            Vec::new()
        }
    }

    fn template(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Borrowed(if self.will_generate { "SKIP %s" } else { "" }))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OptionalLimit {
    will_generate: bool,
}

impl Production for OptionalLimit {
    fn generate(&mut self, seed: &mut Seed, _: &mut Schema, _: &Implementation) -> Vec<Clause> {
        self.will_generate = seed.random_boolean();
        if self.will_generate {
            vec![row_count().into()]
        } else {
            Vec::new()
        }
    }

    fn template(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Borrowed(if self.will_generate { "LIMIT %s" } else { "" }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{PropertyVariable, StructuralVariable};
    use crate::render::generate_statement;

    fn render(clause: impl Into<Clause>, s: &mut Schema, seed: &mut Seed) -> String {
        generate_statement(seed, s, clause.into(), &Implementation::opencypher(), 0).unwrap()
    }

    #[test]
    fn predetermined_columns_keep_their_order() {
        let mut s = Schema::new();
        s.must_return = true;
        s.property_variables_to_return.push(PropertyVariable {
            name: "a".into(),
            ty: PropertyType::INTEGER,
            value: String::new(),
        });
        s.structural_variables_to_return.push(StructuralVariable {
            name: "b".into(),
            ty: StructuralType::NODE,
            likely_null: true,
        });
        let rendered = render(Return::default(), &mut s, &mut Seed::from_rng_seed(7));
        assert!(rendered.starts_with("RETURN "), "{rendered}");
        let a = rendered.find(" AS a").unwrap();
        let b = rendered.find(" AS b").unwrap();
        assert!(a < b);
    }

    #[test]
    fn subqueries_never_return_all() {
        let mut s = Schema::new();
        s.is_in_subquery = true;
        s.add_structural_variable(StructuralVariable {
            name: "n".into(),
            ty: StructuralType::NODE,
            likely_null: false,
        });
        for rng_seed in 0..30 {
            let rendered = render(Return::default(), &mut s.clone(), &mut Seed::from_rng_seed(rng_seed));
            assert!(!rendered.contains(" * "), "{rendered}");
        }
    }

    #[test]
    fn scopes_that_cannot_return_write_instead() {
        let mut s = Schema::new();
        s.cannot_return = true;
        let mut seed = Seed::replay(Vec::new());
        let mut clause = Return::default();
        let children = clause.generate(&mut seed, &mut s, &Implementation::opencypher());
        assert_eq!(children, vec![Clause::from(WriteClause)]);
        assert_eq!(clause.template().as_deref(), Some("%s"));
    }
}
