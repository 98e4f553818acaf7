use std::borrow::Cow;

use super::util::{add_variable_to_schema, generate_expression_conf, generate_unique_name};
use super::{Expression, ReadClause};
use crate::clause::{Clause, Production};
use crate::implementation::Implementation;
use crate::model::{ExpressionConfig, Schema};
use crate::Seed;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Unwind;

impl Production for Unwind {
    fn generate(&mut self, _: &mut Seed, _: &mut Schema, _: &Implementation) -> Vec<Clause> {
        vec![UnwindClause::default().into(), ReadClause::default().into()]
    }

    fn template(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Borrowed("%s %s"))
    }
}

/// `UNWIND list AS name`, binding `name` to the list's element type.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnwindClause {
    name: String,
    conf: ExpressionConfig,
}

impl Production for UnwindClause {
    fn generate(&mut self, seed: &mut Seed, s: &mut Schema, imp: &Implementation) -> Vec<Clause> {
        self.name = generate_unique_name(seed, s);
        self.conf = generate_expression_conf(seed, imp.config());
        self.conf.is_list = true;
        vec![Expression::new(self.conf).into()]
    }

    fn template(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Owned(format!("UNWIND %s AS {}", self.name)))
    }

    fn modify_schema(&mut self, s: &mut Schema) {
        let mut element = self.conf;
        element.is_list = false;
        add_variable_to_schema(s, &self.name, element);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::generate_statement;

    #[test]
    fn binds_the_element_variable() {
        let mut s = Schema::new();
        let rendered = generate_statement(
            &mut Seed::from_rng_seed(21),
            &mut s,
            UnwindClause::default().into(),
            &Implementation::opencypher(),
            0,
        )
        .unwrap();
        let name = rendered.rsplit(" AS ").next().unwrap();
        let bound = match s.property_variables_by_name.get(name) {
            Some(variable) => Some(variable.ty.is_list()),
            None => s.structural_variables_by_name.get(name).map(|v| v.ty.is_list()),
        };
        assert_eq!(bound, Some(false), "{rendered}");
    }
}
