use std::borrow::Cow;

use super::util::{has_variables, populate_variables_to_return};
use super::ReadClause;
use crate::clause::{Clause, Production};
use crate::implementation::Implementation;
use crate::model::Schema;
use crate::Seed;

/// `CALL { .. }` followed by the rest of the query.
///
/// The subquery only sees variables it imports, and whatever it returns is
/// in scope afterwards.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallSubquery;

impl Production for CallSubquery {
    fn generate(&mut self, _: &mut Seed, _: &mut Schema, _: &Implementation) -> Vec<Clause> {
        vec![CallSubqueryClause::default().into(), ReadClause::default().into()]
    }

    fn template(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Borrowed("%s %s"))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallSubqueryClause {
    saved: Option<Schema>,
}

impl Production for CallSubqueryClause {
    fn generate(&mut self, seed: &mut Seed, s: &mut Schema, imp: &Implementation) -> Vec<Clause> {
        let outer = s.copy();
        *s = s.new_context();
        s.is_in_subquery = true;

        if seed.random_boolean() {
            populate_variables_to_return(seed, s, imp.config());
        }

        let mut include_all = seed.boolean_with_probability(0.1);
        if imp.config().asterisk_needs_targets && !has_variables(&outer) {
            include_all = false;
        }
        let mut imported = Vec::new();
        for variable in outer.property_variables_by_name.values() {
            if include_all || seed.boolean_with_probability(0.1) {
                s.add_property_variable(variable.clone());
                imported.push(variable.name.clone());
            }
        }
        for variable in outer.structural_variables_by_name.values() {
            if include_all || seed.boolean_with_probability(0.1) {
                s.add_structural_variable(variable.clone());
                imported.push(variable.name.clone());
            }
        }
        self.saved = Some(outer);

        // WITH modifiers cannot follow an empty import.
        let simple_with_clause = imported.is_empty();
        vec![
            CallSubqueryWith::new(include_all, imported).into(),
            ReadClause::new(simple_with_clause).into(),
        ]
    }

    fn template(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Borrowed("CALL { %s %s }"))
    }

    fn modify_schema(&mut self, s: &mut Schema) {
        let returned_properties = std::mem::take(&mut s.property_variables_to_return);
        let returned_structures = std::mem::take(&mut s.structural_variables_to_return);
        let had_to_return = s.must_return;
        if let Some(saved) = self.saved.take() {
            s.restore_scope(saved);
        }
        if had_to_return {
            for variable in returned_properties {
                s.add_property_variable(variable);
            }
            for variable in returned_structures {
                s.add_structural_variable(variable);
            }
        }
    }
}

/// The importing `WITH` at the start of a CALL subquery.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallSubqueryWith {
    pub is_include_all: bool,
    pub variables_to_include: Vec<String>,
}

impl CallSubqueryWith {
    pub fn new(is_include_all: bool, variables_to_include: Vec<String>) -> Self {
        Self {
            is_include_all,
            variables_to_include,
        }
    }
}

impl Production for CallSubqueryWith {
    fn generate(&mut self, _: &mut Seed, _: &mut Schema, _: &Implementation) -> Vec<Clause> {
        Vec::new()
    }

    fn template(&self) -> Option<Cow<'_, str>> {
        Some(if self.is_include_all {
            Cow::Borrowed("WITH *")
        } else if self.variables_to_include.is_empty() {
            Cow::Borrowed("")
        } else {
            Cow::Owned(format!("WITH {}", self.variables_to_include.join(", ")))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{StructuralType, StructuralVariable};
    use crate::render::generate_statement;

    #[test]
    fn outer_scope_survives_the_subquery() {
        for rng_seed in 0..30 {
            let mut s = Schema::new();
            s.add_structural_variable(StructuralVariable {
                name: "n".into(),
                ty: StructuralType::NODE,
                likely_null: false,
            });
            s.must_return = true;
            let Ok(rendered) = generate_statement(
                &mut Seed::from_rng_seed(rng_seed),
                &mut s,
                CallSubqueryClause::default().into(),
                &Implementation::opencypher(),
                3000,
            ) else {
                continue;
            };
            assert!(rendered.starts_with("CALL { "), "{rendered}");
            assert!(s.structural_variables_by_name.contains_key("n"));
            assert!(s.must_return);
            assert!(!s.is_in_subquery);
        }
    }

    #[test]
    fn import_lists_render() {
        assert_eq!(CallSubqueryWith::new(true, Vec::new()).template().unwrap(), "WITH *");
        assert_eq!(CallSubqueryWith::new(false, Vec::new()).template().unwrap(), "");
        assert_eq!(
            CallSubqueryWith::new(false, vec!["a".into(), "b".into()]).template().unwrap(),
            "WITH a, b"
        );
    }
}
