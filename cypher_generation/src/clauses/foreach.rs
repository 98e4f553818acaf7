use std::borrow::Cow;

use super::util::{
    add_variable_to_schema, decide_on_label_match_type, generate_expression_conf,
    generate_unique_name, optional_clause,
};
use super::{CreateClause, DeleteClause, Expression, MergeClause, OptionalWriteQuery, SetClause};
use crate::clause::{Clause, Production};
use crate::implementation::Implementation;
use crate::model::{ExpressionConfig, Schema, StructuralType};
use crate::Seed;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Foreach;

impl Production for Foreach {
    fn generate(&mut self, _: &mut Seed, _: &mut Schema, _: &Implementation) -> Vec<Clause> {
        vec![ForeachClause::default().into(), OptionalWriteQuery.into()]
    }

    fn template(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Borrowed("%s %s"))
    }
}

/// `FOREACH ( x IN list | updates )`. Nothing bound inside leaks out.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ForeachClause {
    saved: Option<Schema>,
}

impl Production for ForeachClause {
    fn generate(&mut self, seed: &mut Seed, s: &mut Schema, _: &Implementation) -> Vec<Clause> {
        decide_on_label_match_type(seed, s);
        self.saved = Some(s.copy());
        *s = s.new_sub_context();
        vec![ForeachVariable::default().into(), ForeachCommand.into()]
    }

    fn template(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Borrowed("FOREACH ( %s | %s )"))
    }

    fn modify_schema(&mut self, s: &mut Schema) {
        if let Some(saved) = self.saved.take() {
            s.restore_scope(saved);
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ForeachVariable {
    name: String,
    conf: ExpressionConfig,
}

impl Production for ForeachVariable {
    fn generate(&mut self, seed: &mut Seed, s: &mut Schema, imp: &Implementation) -> Vec<Clause> {
        self.name = generate_unique_name(seed, s);
        self.conf = generate_expression_conf(seed, imp.config());
        self.conf.is_list = false;
        vec![Expression::new(self.conf.list()).into()]
    }

    fn template(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Owned(format!("{} IN %s", self.name)))
    }

    fn modify_schema(&mut self, s: &mut Schema) {
        add_variable_to_schema(s, &self.name, self.conf);
    }
}

/// One or more updating clauses.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ForeachCommand;

impl Production for ForeachCommand {
    fn generate(&mut self, seed: &mut Seed, s: &mut Schema, _: &Implementation) -> Vec<Clause> {
        let writable = !s.structural_variables_of(StructuralType::NODE).is_empty()
            || !s.structural_variables_of(StructuralType::RELATIONSHIP).is_empty();
        let options = if writable { 5 } else { 3 };
        let command = match seed.random_intn(options) {
            0 => CreateClause.into(),
            1 => MergeClause::default().into(),
            2 => ForeachClause::default().into(),
            3 => SetClause.into(),
            _ => DeleteClause::default().into(),
        };
        vec![command, optional_clause(seed, ForeachCommand)]
    }

    fn template(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Borrowed("%s %s"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::generate_statement;

    #[test]
    fn body_does_not_leak() {
        for rng_seed in 0..30 {
            let mut s = Schema::new();
            let before = s.clone();
            let Ok(rendered) = generate_statement(
                &mut Seed::from_rng_seed(rng_seed),
                &mut s,
                ForeachClause::default().into(),
                &Implementation::opencypher(),
                3000,
            ) else {
                continue;
            };
            assert!(rendered.starts_with("FOREACH ( "), "{rendered}");
            assert_eq!(s.structural_variables_by_name, before.structural_variables_by_name);
            assert_eq!(s.property_variables_by_name, before.property_variables_by_name);
        }
    }

    #[test]
    fn exhausted_seed_creates() {
        let mut command = ForeachCommand;
        let children =
            command.generate(&mut Seed::replay(Vec::new()), &mut Schema::new(), &Implementation::opencypher());
        assert_eq!(children, vec![CreateClause.into(), Clause::empty()]);
    }
}
