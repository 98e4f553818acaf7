use std::borrow::Cow;

use super::util::has_write_targets;
use super::{CreateElement, OptionalWriteQuery, SetExpression};
use crate::clause::{Clause, Production};
use crate::implementation::Implementation;
use crate::model::Schema;
use crate::Seed;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Merge;

impl Production for Merge {
    fn generate(&mut self, _: &mut Seed, _: &mut Schema, _: &Implementation) -> Vec<Clause> {
        vec![MergeClause::default().into(), OptionalWriteQuery.into()]
    }

    fn template(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Borrowed("%s %s"))
    }
}

/// `MERGE pattern [ON CREATE SET ..] [ON MATCH SET ..]`
///
/// Property values inside the clause must not be null. Variables of the
/// merged pattern are bound once the whole clause is generated.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeClause {
    has_on_create: bool,
    has_on_match: bool,
    was_in_merge_clause: bool,
}

impl Production for MergeClause {
    fn generate(&mut self, seed: &mut Seed, s: &mut Schema, imp: &Implementation) -> Vec<Clause> {
        self.was_in_merge_clause = s.is_in_merge_clause;
        s.is_in_merge_clause = true;
        s.just_created_structural_variables.clear();

        let can_set = has_write_targets(s, imp.config());
        let mut children = vec![CreateElement::default().into()];
        self.has_on_create = can_set && seed.random_boolean();
        children.push(if self.has_on_create {
            SetExpression::default().into()
        } else {
            Clause::empty()
        });
        self.has_on_match = can_set && seed.random_boolean();
        children.push(if self.has_on_match {
            SetExpression::default().into()
        } else {
            Clause::empty()
        });
        children
    }

    fn template(&self) -> Option<Cow<'_, str>> {
        let mut template = String::from("MERGE %s");
        if self.has_on_create {
            template.push_str(" ON CREATE SET");
        }
        template.push_str(" %s");
        if self.has_on_match {
            template.push_str(" ON MATCH SET");
        }
        template.push_str(" %s");
        Some(Cow::Owned(template))
    }

    fn modify_schema(&mut self, s: &mut Schema) {
        s.is_in_merge_clause = self.was_in_merge_clause;
        for variable in std::mem::take(&mut s.just_created_structural_variables) {
            s.add_structural_variable(variable);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::generate_statement;

    #[test]
    fn merge_scope_is_restored_and_variables_bound() {
        for rng_seed in 0..30 {
            let mut s = Schema::new();
            let rendered = generate_statement(
                &mut Seed::from_rng_seed(rng_seed),
                &mut s,
                MergeClause::default().into(),
                &Implementation::opencypher(),
                0,
            )
            .unwrap();
            assert!(rendered.starts_with("MERGE "), "{rendered}");
            assert!(!s.is_in_merge_clause);
            assert!(s.just_created_structural_variables.is_empty());
            for name in s.structural_variables_by_name.keys() {
                assert!(rendered.contains(name.as_str()));
            }
        }
    }
}
