use std::borrow::Cow;

use super::util::{captured_children, has_write_targets, write_target_type};
use super::{Labels, OptionalWriteQuery, PropertyName, WriteClause, WriteTarget};
use crate::capture::Capturer;
use crate::clause::{Clause, Production};
use crate::implementation::Implementation;
use crate::model::{Schema, StructuralType};
use crate::Seed;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Remove;

impl Production for Remove {
    fn generate(&mut self, _: &mut Seed, s: &mut Schema, imp: &Implementation) -> Vec<Clause> {
        if !has_write_targets(s, imp.config()) {
            return vec![Clause::empty(), WriteClause::default().into()];
        }
        vec![RemoveClause.into(), OptionalWriteQuery.into()]
    }

    fn template(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Borrowed("%s %s"))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemoveClause;

impl Production for RemoveClause {
    fn generate(&mut self, _: &mut Seed, _: &mut Schema, _: &Implementation) -> Vec<Clause> {
        vec![RemoveSubclause::default().into()]
    }

    fn template(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Borrowed("REMOVE %s"))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemoveSubclause {
    is_base_case: bool,
}

impl Production for RemoveSubclause {
    fn generate(&mut self, seed: &mut Seed, _: &mut Schema, _: &Implementation) -> Vec<Clause> {
        self.is_base_case = seed.random_boolean();
        let item = if seed.random_boolean() {
            RemovePropertyExpression.into()
        } else {
            RemoveLabelExpression::default().into()
        };
        if self.is_base_case {
            vec![item]
        } else {
            vec![item, RemoveSubclause::default().into()]
        }
    }

    fn template(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Borrowed(if self.is_base_case { "%s" } else { "%s, %s" }))
    }

    fn is_transformer(&self) -> bool {
        true
    }

    /// Removing the first item twice removes nothing more.
    fn transform(
        &self,
        _: &mut Seed,
        _: &mut Schema,
        children: &[Capturer],
        _: &Implementation,
    ) -> Option<Clause> {
        let template = if self.is_base_case {
            "%s, %[1]s"
        } else {
            "%s, %[1]s, %[2]s"
        };
        Some(Clause::assembler(template, captured_children(children)))
    }
}

/// `target.property`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemovePropertyExpression;

impl Production for RemovePropertyExpression {
    fn generate(&mut self, seed: &mut Seed, s: &mut Schema, imp: &Implementation) -> Vec<Clause> {
        let ty = write_target_type(seed, s, imp.config());
        vec![WriteTarget::new(ty).into(), PropertyName::default().into()]
    }

    fn template(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Borrowed("%s.%s"))
    }
}

/// `n:A`, or a property removal if no node is bound.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemoveLabelExpression {
    name: String,
}

impl Production for RemoveLabelExpression {
    fn generate(&mut self, seed: &mut Seed, s: &mut Schema, _: &Implementation) -> Vec<Clause> {
        let nodes = s.structural_variables_of(StructuralType::NODE);
        if nodes.is_empty() {
            return vec![RemovePropertyExpression.into()];
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
