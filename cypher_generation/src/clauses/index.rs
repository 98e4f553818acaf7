//! Pieces shared by the target specific index and constraint statements.

use std::borrow::Cow;

use super::PropertyName;
use crate::clause::{Clause, Production};
use crate::implementation::Implementation;
use crate::model::Schema;
use crate::Seed;

/// `n.a, n.b, ...`: the properties a uniqueness constraint spans.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConstraintPropertyChain {
    pub var_name: String,
    is_base_case: bool,
}

impl ConstraintPropertyChain {
    pub fn new(var_name: impl Into<String>) -> Self {
        Self {
            var_name: var_name.into(),
            is_base_case: false,
        }
    }
}

impl Production for ConstraintPropertyChain {
    fn generate(&mut self, seed: &mut Seed, _: &mut Schema, _: &Implementation) -> Vec<Clause> {
        self.is_base_case = seed.random_boolean();
        let property = ConstraintProperty::new(self.var_name.clone()).into();
        if self.is_base_case {
            return vec![property];
        }
        vec![ConstraintPropertyChain::new(self.var_name.clone()).into(), property]
    }

    fn template(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Borrowed(if self.is_base_case { "%s" } else { "%s, %s" }))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConstraintProperty {
    pub var_name: String,
}

impl ConstraintProperty {
    pub fn new(var_name: impl Into<String>) -> Self {
        Self {
            var_name: var_name.into(),
        }
    }
}

impl Production for ConstraintProperty {
    fn generate(&mut self, _: &mut Seed, _: &mut Schema, _: &Implementation) -> Vec<Clause> {
        vec![PropertyName::default().into()]
    }

    fn template(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Owned(format!("{}.%s", self.var_name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::generate_statement;

    #[test]
    fn every_property_is_qualified() {
        for rng_seed in 0..20 {
            let rendered = generate_statement(
                &mut Seed::from_rng_seed(rng_seed),
                &mut Schema::new(),
                ConstraintPropertyChain::new("n").into(),
                &Implementation::opencypher(),
                0,
            )
            .unwrap();
            assert!(rendered.split(", ").all(|p| p.starts_with("n.")), "{rendered}");
        }
    }
}
