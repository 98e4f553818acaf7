use std::borrow::Cow;

use super::util::populate_variables_to_return;
use super::ReadClause;
use crate::capture::Capturer;
use crate::clause::{Clause, Production};
use crate::implementation::Implementation;
use crate::model::Schema;
use crate::Seed;

/// Two queries returning the same columns. Every union of a statement is
/// either `UNION` or `UNION ALL`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Union {
    is_union_all: bool,
}

impl Production for Union {
    fn generate(&mut self, seed: &mut Seed, s: &mut Schema, imp: &Implementation) -> Vec<Clause> {
        if !s.must_return {
            populate_variables_to_return(seed, s, imp.config());
        }
        self.is_union_all = *s.is_union_all.get_or_insert_with(|| seed.random_boolean());
        vec![ReadClause::default().into(), UnionClause::default().into()]
    }

    fn template(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Borrowed(if self.is_union_all {
            "%s UNION ALL %s"
        } else {
            "%s UNION %s"
        }))
    }

    fn no_strategy_reduce(&self, this: &Capturer) -> Option<Clause> {
        this.children().first().cloned().map(Clause::captured)
    }
}

/// The second query of a union, in a scope of its own.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnionClause {
    saved: Option<Schema>,
}

impl Production for UnionClause {
    fn generate(&mut self, _: &mut Seed, s: &mut Schema, _: &Implementation) -> Vec<Clause> {
        let saved = s.copy();
        let mut scope = s.new_context();
        scope.is_union_all = saved.is_union_all;
        scope.must_return = true;
        scope.property_variables_to_return = saved.property_variables_to_return.clone();
        scope.structural_variables_to_return = saved.structural_variables_to_return.clone();
        *s = scope;
        self.saved = Some(saved);
        vec![ReadClause::default().into()]
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
    use crate::render::generate_statement;

    #[test]
    fn both_sides_return_the_same_columns() {
        for rng_seed in 0..30 {
            let mut s = Schema::new();
            let Ok(rendered) = generate_statement(
                &mut Seed::from_rng_seed(rng_seed),
                &mut s,
                Union::default().into(),
                &Implementation::opencypher(),
                3000,
            ) else {
                continue;
            };
            let keyword = if s.is_union_all == Some(true) { " UNION ALL " } else { " UNION " };
            assert!(rendered.contains(keyword), "{rendered}");
            for column in s
                .property_variables_to_return
                .iter()
                .map(|v| &v.name)
                .chain(s.structural_variables_to_return.iter().map(|v| &v.name))
            {
                let alias = format!(" AS {column}");
                assert!(rendered.matches(alias.as_str()).count() >= 2, "{rendered}");
            }
        }
    }
}
