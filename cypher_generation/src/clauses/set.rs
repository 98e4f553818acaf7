use std::borrow::Cow;

use super::util::{decide_on_label_match_type, has_write_targets, write_target_type};
use super::{Expression, Labels, OptionalWriteQuery, Properties, PropertyName, WriteClause, WriteTarget};
use crate::capture::Capturer;
use crate::clause::{Clause, Production};
use crate::implementation::Implementation;
use crate::model::{ExpressionConfig, PropertyType, Schema, StructuralType, StructuralVariable};
use crate::Seed;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Set;

impl Production for Set {
    fn generate(&mut self, _: &mut Seed, s: &mut Schema, imp: &Implementation) -> Vec<Clause> {
        if !has_write_targets(s, imp.config()) {
            return vec![Clause::empty(), WriteClause::default().into()];
        }
        vec![SetClause.into(), OptionalWriteQuery.into()]
    }

    fn template(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Borrowed("%s %s"))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SetClause;

impl Production for SetClause {
    fn generate(&mut self, _: &mut Seed, _: &mut Schema, _: &Implementation) -> Vec<Clause> {
        vec![SetExpression::default().into()]
    }

    fn template(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Borrowed("SET %s"))
    }
}

/// Comma separated property and label updates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SetExpression {
    is_base_case: bool,
}

impl Production for SetExpression {
    fn generate(&mut self, seed: &mut Seed, _: &mut Schema, _: &Implementation) -> Vec<Clause> {
        self.is_base_case = seed.random_boolean();
        let item = if seed.random_boolean() {
            SetPropertyExpression::default().into()
        } else {
            SetLabelExpression::default().into()
        };
        if self.is_base_case {
            vec![item]
        } else {
            vec![item, SetExpression::default().into()]
        }
    }

    fn template(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Borrowed(if self.is_base_case { "%s" } else { "%s, %s" }))
    }

    fn no_strategy_reduce(&self, this: &Capturer) -> Option<Clause> {
        this.children().last().cloned().map(Clause::captured)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum PropertyAssignment {
    /// `target.name = value`
    Single,
    /// `n = {..}` replaces every property.
    Map(String),
    /// `n += {..}` merges into the existing properties.
    MapAddition(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SetPropertyExpression {
    assignment: PropertyAssignment,
}

impl Default for SetPropertyExpression {
    fn default() -> Self {
        Self {
            assignment: PropertyAssignment::Single,
        }
    }
}

impl Production for SetPropertyExpression {
    fn generate(&mut self, seed: &mut Seed, s: &mut Schema, imp: &Implementation) -> Vec<Clause> {
        decide_on_label_match_type(seed, s);

        let candidates: Vec<&StructuralVariable> = s
            .structural_variables_of(StructuralType::NODE)
            .iter()
            .chain(s.structural_variables_of(StructuralType::RELATIONSHIP))
            .collect();
        if !candidates.is_empty() && seed.random_boolean() {
            let name = seed.random_choice(&candidates).name.clone();
            self.assignment = if seed.random_boolean() {
                PropertyAssignment::MapAddition(name)
            } else {
                PropertyAssignment::Map(name)
            };
            return vec![Properties.into()];
        }

        let ty = write_target_type(seed, s, imp.config());
        vec![
            WriteTarget::new(ty).into(),
            PropertyName::default().into(),
            Expression::new(ExpressionConfig::property(PropertyType::ANY)).into(),
        ]
    }

    fn template(&self) -> Option<Cow<'_, str>> {
        Some(match &self.assignment {
            PropertyAssignment::Single => Cow::Borrowed("%s.%s = %s"),
            PropertyAssignment::Map(name) => Cow::Owned(format!("{name} = %s")),
            PropertyAssignment::MapAddition(name) => Cow::Owned(format!("{name} += %s")),
        })
    }
}

/// `n:A:B`, or a property update if no node is bound.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SetLabelExpression {
    name: String,
}

impl Production for SetLabelExpression {
    fn generate(&mut self, seed: &mut Seed, s: &mut Schema, _: &Implementation) -> Vec<Clause> {
        let nodes = s.structural_variables_of(StructuralType::NODE);
        if nodes.is_empty() {
            return vec![SetPropertyExpression::default().into()];
        }
        self.name = seed.random_choice(nodes).name.clone();
        vec![Labels::new(StructuralType::NODE).into()]
    }

    fn template(&self) -> Option<Cow<'_, str>> {
        Some(if self.name.is_empty() {
            Cow::Borrowed("%s")
        } else {
            Cow::Owned(format!("{}%s", self.name))
        })
    }
}
