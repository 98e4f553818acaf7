//! Statement generation.
//!
//! The renderer expands a root clause depth first. For every node it applies
//! the target's drop-in, generates the children, renders them left to right
//! and only then lets the node modify the schema. Children therefore see the
//! schema as it was before their parent's post effects, while the parent's
//! post effects see the schema as its children left it.

use crate::capture::Capturer;
use crate::clause::template::{concat_template, format_template};
use crate::clause::{Clause, Production};
use crate::implementation::Implementation;
use crate::model::Schema;
use crate::Seed;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerationError {
    #[error("ast node limit of {limit} reached")]
    AstNodeLimitReached { limit: i64 },
}

struct Renderer<'a> {
    seed: &'a mut Seed,
    schema: &'a mut Schema,
    imp: &'a Implementation,
}

impl Renderer<'_> {
    /// Renders `clause` with at most `budget - 1` nodes. Returns the rendered
    /// string and the number of nodes generated, which reaches `budget` once
    /// the limit is hit.
    fn render(&mut self, clause: Clause, budget: i64) -> (String, i64) {
        if budget == 1 {
            return (String::new(), 1);
        }
        let mut clause = match clause {
            Clause::Captured(mut capturer) => return self.render_captured(&mut capturer, budget),
            clause => self.imp.adapt(clause, self.seed, self.schema),
        };

        let children = clause.generate(self.seed, self.schema, self.imp);
        tracing::trace!(clause = %clause.kind(), children = children.len(), "generating");
        let template = match clause.template() {
            Some(template) => template.into_owned(),
            None => concat_template(children.len()),
        };

        let mut nodes = 1;
        let mut rendered = Vec::with_capacity(children.len());
        for child in children {
            let (child, count) = self.render(child, budget - nodes);
            nodes += count;
            if nodes >= budget {
                return (String::new(), nodes);
            }
            rendered.push(child);
        }

        clause.modify_schema(self.schema);
        (format_template(&template, &rendered), nodes)
    }

    /// Renders a captured tree in place, so that the capturers keep what they generated.
    fn render_captured(&mut self, capturer: &mut Capturer, budget: i64) -> (String, i64) {
        if budget == 1 {
            return (String::new(), 1);
        }
        capturer.generate(self.seed, self.schema, self.imp);
        let template = capturer.template_string();

        let mut nodes = 1;
        let mut rendered = Vec::with_capacity(capturer.children().len());
        for child in capturer.children_mut() {
            let (child, count) = self.render_captured(child, budget - nodes);
            nodes += count;
            if nodes >= budget {
                return (String::new(), nodes);
            }
            rendered.push(child);
        }

        capturer.modify_schema(self.schema);
        (format_template(&template, &rendered), nodes)
    }
}

fn budget(max_ast_nodes: i64) -> i64 {
    if max_ast_nodes <= 0 {
        i64::MAX
    } else {
        max_ast_nodes
    }
}

/// Generates a statement from `root`. At most `max_ast_nodes` nodes are
/// generated, or any number if it is not positive.
pub fn generate_statement(
    seed: &mut Seed,
    schema: &mut Schema,
    root: Clause,
    imp: &Implementation,
    max_ast_nodes: i64,
) -> Result<String, GenerationError> {
    let limit = budget(max_ast_nodes);
    let (statement, nodes) = Renderer { seed, schema, imp }.render(root, limit);
    if nodes >= limit {
        return Err(GenerationError::AstNodeLimitReached { limit });
    }
    Ok(statement)
}

/// Like [generate_statement], but renders a captured tree in place.
pub fn generate_captured_statement(
    seed: &mut Seed,
    schema: &mut Schema,
    root: &mut Capturer,
    imp: &Implementation,
    max_ast_nodes: i64,
) -> Result<String, GenerationError> {
    let limit = budget(max_ast_nodes);
    let (statement, nodes) = Renderer { seed, schema, imp }.render_captured(root, limit);
    if nodes >= limit {
        return Err(GenerationError::AstNodeLimitReached { limit });
    }
    Ok(statement)
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::clause::{Assembler, HookClause, Stringer};
    use crate::clauses::RootClause;

    #[test]
    fn children_see_schema_before_post_effects() {
        let imp = Implementation::opencypher();
        let parent = HookClause::default()
            .with_generate(|_, _| {
                vec![HookClause::default()
                    .with_generate(|_, s| {
                        assert!(!s.must_return);
                        Vec::new()
                    })
                    .with_modify_schema(|s| s.cannot_return = true)
                    .into()]
            })
            .with_template(|| "%s".into())
            .with_modify_schema(|s| {
                assert!(s.cannot_return);
                s.must_return = true;
            });

        let mut s = Schema::new();
        generate_statement(&mut Seed::replay(Vec::new()), &mut s, parent.into(), &imp, 0).unwrap();
        assert!(s.must_return);
    }

    #[test]
    fn node_limit() {
        let imp = Implementation::opencypher();
        let tree: Clause = Assembler::new(
            "%s %s",
            vec![Stringer::new("a").into(), Stringer::new("b").into()],
        )
        .into();
        let mut s = Schema::new();
        let mut seed = Seed::replay(Vec::new());
        assert_eq!(generate_statement(&mut seed, &mut s, tree.clone(), &imp, 0).unwrap(), "a b");
        assert_eq!(generate_statement(&mut seed, &mut s, tree.clone(), &imp, 4).unwrap(), "a b");
        assert_eq!(
            generate_statement(&mut seed, &mut s, tree, &imp, 3),
            Err(GenerationError::AstNodeLimitReached { limit: 3 })
        );
    }

    proptest! {
        #[test]
        fn replayed_bytes_render_identically(rng_seed in any::<u64>()) {
            let imp = Implementation::opencypher();
            let mut seed = Seed::from_rng_seed(rng_seed);
            let mut s = Schema::new();
            let first = generate_statement(&mut seed, &mut s, RootClause::default().into(), &imp, 5000);

            let mut replay = Seed::replay(seed.byte_string().to_vec());
            let mut s2 = Schema::new();
            let second = generate_statement(&mut replay, &mut s2, RootClause::default().into(), &imp, 5000);

            prop_assert_eq!(&first, &second);
            if first.is_ok() {
                prop_assert_eq!(s, s2);
            }
        }
    }
}
