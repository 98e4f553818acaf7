use std::borrow::Cow;

use super::util::{captured_children, has_write_targets};
use super::{OptionalWriteQuery, WriteClause, WriteTarget};
use crate::capture::Capturer;
use crate::clause::{Clause, Production};
use crate::implementation::Implementation;
use crate::model::{Schema, StructuralType};
use crate::Seed;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Delete;

impl Production for Delete {
    fn generate(&mut self, _: &mut Seed, s: &mut Schema, imp: &Implementation) -> Vec<Clause> {
        if !has_write_targets(s, imp.config()) {
            return vec![Clause::empty(), WriteClause::default().into()];
        }
        vec![DeleteClause::default().into(), OptionalWriteQuery.into()]
    }

    fn template(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Borrowed("%s %s"))
    }
}

/// `DELETE` or `DETACH DELETE`. Plain deletes only target relationships, so
/// they never fail on attached nodes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeleteClause {
    use_detach: bool,
}

impl Production for DeleteClause {
    fn generate(&mut self, seed: &mut Seed, s: &mut Schema, imp: &Implementation) -> Vec<Clause> {
        self.use_detach = if imp.config().only_variables_as_write_target {
            s.structural_variables_of(StructuralType::RELATIONSHIP).is_empty() || seed.random_boolean()
        } else {
            seed.random_boolean()
        };
        vec![DeleteElementChain::new(self.use_detach).into()]
    }

    fn template(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Borrowed(if self.use_detach {
            "DETACH DELETE %s"
        } else {
            "DELETE %s"
        }))
    }

    fn is_transformer(&self) -> bool {
        true
    }

    /// Detaching does not change what a plain delete removes.
    fn transform(
        &self,
        _: &mut Seed,
        _: &mut Schema,
        children: &[Capturer],
        _: &Implementation,
    ) -> Option<Clause> {
        (!self.use_detach).then(|| Clause::assembler("DETACH DELETE %s", captured_children(children)))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeleteElementChain {
    pub use_detach: bool,
}

impl DeleteElementChain {
    pub fn new(use_detach: bool) -> Self {
        Self { use_detach }
    }
}

impl Production for DeleteElementChain {
    fn generate(&mut self, seed: &mut Seed, s: &mut Schema, imp: &Implementation) -> Vec<Clause> {
        let mut ty = if self.use_detach {
            StructuralType::NODE
        } else {
            StructuralType::RELATIONSHIP
        };
        if imp.config().only_variables_as_write_target {
            if !s.structural_variables_of(StructuralType::RELATIONSHIP).is_empty() {
                ty = StructuralType::RELATIONSHIP;
            }
        } else if seed.random_boolean() {
            ty = StructuralType::RELATIONSHIP;
        }
        vec![WriteTarget::deleted(ty).into()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{GenerationConfig, StructuralVariable};
    use crate::render::generate_statement;

    fn restricted() -> Implementation {
        Implementation::opencypher()
            .with_config(GenerationConfig::default().with_only_variables_as_write_target(true))
    }

    fn bind(s: &mut Schema, name: &str, ty: StructuralType) {
        s.add_structural_variable(StructuralVariable {
            name: name.into(),
            ty,
            likely_null: false,
        });
    }

    #[test]
    fn nodes_are_detached() {
        let mut s = Schema::new();
        bind(&mut s, "n", StructuralType::NODE);
        let rendered = generate_statement(
            &mut Seed::from_rng_seed(3),
            &mut s,
            DeleteClause::default().into(),
            &restricted(),
            0,
        )
        .unwrap();
        assert_eq!(rendered, "DETACH DELETE n");
        assert!(s.deleted_vars.contains("n"));
    }

    #[test]
    fn only_plain_deletes_transform() {
        let mut s = Schema::new();
        bind(&mut s, "r", StructuralType::RELATIONSHIP);
        let imp = restricted();
        for rng_seed in 0..20 {
            let mut seed = Seed::from_rng_seed(rng_seed);
            let mut capturer = Capturer::new(DeleteClause::default());
            let rendered =
                crate::render::generate_captured_statement(&mut seed, &mut s.clone(), &mut capturer, &imp, 0)
                    .unwrap();
            let transformed = Capturer::transform(&mut capturer, &mut seed, &imp);
            if rendered.starts_with("DETACH") {
                assert!(transformed.is_none());
            } else {
                assert_eq!(rendered, "DELETE r");
                let mut transformed = Capturer::new(transformed.unwrap());
                let again = crate::render::generate_captured_statement(
                    &mut seed,
                    &mut s.clone(),
                    &mut transformed,
                    &imp,
                    0,
                )
                .unwrap();
                assert_eq!(again, "DETACH DELETE r");
            }
        }
    }

    #[test]
    fn falls_through_without_targets() {
        let mut seed = Seed::replay(Vec::new());
        let mut delete = Delete;
        let children = delete.generate(&mut seed, &mut Schema::new(), &restricted());
        assert_eq!(children[1].kind(), crate::clause::ClauseKind::WriteClause);
    }
}
