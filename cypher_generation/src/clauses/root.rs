//! Top level productions. A query is a chain of read clauses ending in a
//! write clause, which in turn ends in a RETURN or nothing at all.

use std::borrow::Cow;

use super::util::{
    captured_children, generate_expression_conf, generate_unique_name, has_variables,
};
use super::{
    CallSubquery, Create, DeadCode, Delete, Expression, Foreach, ForeachCommand, Label, Labels,
    Match, Merge, NonexistentPattern, Properties, Remove, Return, Set, Union, Unwind, With,
};
use crate::capture::Capturer;
use crate::clause::{Clause, Production};
use crate::implementation::Implementation;
use crate::model::{ExpressionConfig, ExpressionType, Schema, StructuralType};
use crate::Seed;

/// The root of every generated statement. Sometimes an index or constraint
/// definition instead of a query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RootClause;

impl Production for RootClause {
    fn generate(&mut self, seed: &mut Seed, _: &mut Schema, _: &Implementation) -> Vec<Clause> {
        if seed.get_byte() % 5 == 0 {
            return vec![Index.into()];
        }
        vec![ReadClause::default().into()]
    }
}

/// Left alone by plain OpenCypher; targets swap in their own index and
/// constraint statements.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Index;

impl Production for Index {
    fn generate(&mut self, _: &mut Seed, _: &mut Schema, _: &Implementation) -> Vec<Clause> {
        vec![ReadClause::default().into()]
    }
}

/// A reading clause followed by the rest of the query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReadClause {
    /// A WITH generated here may not carry ORDER BY, SKIP or LIMIT.
    pub simple_with_clause: bool,
}

impl ReadClause {
    pub fn new(simple_with_clause: bool) -> Self {
        Self { simple_with_clause }
    }

    fn with_all(children: Vec<Clause>, s: &Schema, imp: &Implementation) -> Option<Clause> {
        if imp.config().asterisk_needs_targets && !has_variables(s) {
            return None;
        }
        Some(Clause::assembler("WITH * %s", children))
    }

    /// `WITH * ` if it may be generated here, nothing otherwise.
    fn import_all(s: &Schema, imp: &Implementation) -> &'static str {
        if imp.config().asterisk_needs_targets && !has_variables(s) {
            ""
        } else {
            "WITH * "
        }
    }
}

impl Production for ReadClause {
    fn generate(&mut self, seed: &mut Seed, s: &mut Schema, _: &Implementation) -> Vec<Clause> {
        s.use_new_label_match_type = None;

        if s.disallow_write_clauses && seed.boolean_with_probability(0.2) {
            return vec![Return::default().into()];
        }

        // Clauses expanding into two read clauses are rare, or queries explode.
        if !seed.boolean_with_probability(0.85) {
            let options = if s.disallow_write_clauses { 2 } else { 3 };
            return vec![match seed.random_intn(options) {
                0 => CallSubquery.into(),
                1 => Union::default().into(),
                _ => Foreach.into(),
            }];
        }

        // Exhausted replays end the query with a write clause.
        let clause = if s.disallow_write_clauses {
            match seed.random_intn(3) {
                0 => Unwind.into(),
                1 => Match.into(),
                _ => With::new(self.simple_with_clause).into(),
            }
        } else {
            match seed.random_intn(4) {
                0 => WriteClause::default().into(),
                1 => Unwind.into(),
                2 => Match.into(),
                _ => With::new(self.simple_with_clause).into(),
            }
        };
        vec![clause]
    }

    fn is_transformer(&self) -> bool {
        true
    }

    /// Wraps the rest of the query in something that neither adds nor drops rows.
    fn transform(
        &self,
        seed: &mut Seed,
        s: &mut Schema,
        children: &[Capturer],
        imp: &Implementation,
    ) -> Option<Clause> {
        let rest = captured_children(children);
        if seed.random_boolean() {
            return Self::with_all(rest, s, imp);
        }
        let iterator = generate_unique_name(seed, s);
        let rest = rest.into_iter().next()?;

        if seed.random_boolean() {
            // A list of exactly one element.
            let mut list = generate_expression_conf(seed, imp.config());
            list.is_list = true;
            return Some(Clause::assembler(
                format!("UNWIND (CASE size(%s) WHEN 1 THEN %[1]s ELSE [%s] END) AS {iterator} %s"),
                vec![
                    Expression::new(list).into(),
                    Expression::new(ExpressionConfig::any()).into(),
                    rest,
                ],
            ));
        }
        if seed.random_boolean() {
            let import = Self::import_all(s, imp);
            return Some(Clause::assembler(
                format!("CALL {{ {import}RETURN %s AS {iterator} }} %s"),
                vec![Expression::new(ExpressionConfig::any()).into(), rest],
            ));
        }
        // Without writes the dead code could never end.
        if !s.disallow_write_clauses && seed.boolean_with_probability(0.25) {
            s.is_in_subquery = true;
            let import = Self::import_all(s, imp);
            return Some(Clause::assembler(
                format!("CALL {{ {import}%s }} %s"),
                vec![DeadCode::default().into(), rest],
            ));
        }
        if !imp.config().disallow_match_after_optional_match && seed.random_boolean() {
            return Some(Clause::assembler(
                "OPTIONAL MATCH %s %s",
                vec![NonexistentPattern.into(), rest],
            ));
        }

        // A single non-null value unwinds into one row.
        let mut value = generate_expression_conf(seed, imp.config());
        value.target_type = ExpressionType::PropertyValue;
        value.must_be_non_null = true;
        value.is_list = false;
        Some(Clause::assembler(
            format!("UNWIND %s AS {iterator} %s"),
            vec![Expression::new(value).into(), rest],
        ))
    }
}

/// A writing clause or the final RETURN.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteClause;

impl WriteClause {
    /// `CREATE` a path of fresh elements, then delete all of them.
    fn create_and_delete(seed: &mut Seed, s: &Schema, rest: Clause) -> Clause {
        let mut nodes = Vec::new();
        let mut relationships = Vec::new();
        let path = create_new_path_with_variables(seed, s, &mut nodes, &mut relationships);
        let detach = if seed.random_boolean() { "DETACH " } else { "" };
        let deleted = nodes.iter().chain(&relationships).map(String::as_str).collect::<Vec<_>>();
        Clause::assembler(
            format!("CREATE %s {detach}DELETE {} %s", deleted.join(", ")),
            vec![path, rest],
        )
    }
}

impl Production for WriteClause {
    fn generate(&mut self, seed: &mut Seed, s: &mut Schema, _: &Implementation) -> Vec<Clause> {
        s.use_new_label_match_type = None;

        // Scopes that cannot return skip the RETURN option.
        let skipped = usize::from(s.cannot_return);
        let clause = match seed.random_intn(6 - skipped) + skipped {
            0 => Return::default().into(),
            1 => Create.into(),
            2 => Delete.into(),
            3 => Set.into(),
            4 => Merge.into(),
            _ => Remove.into(),
        };
        vec![clause]
    }

    fn is_transformer(&self) -> bool {
        true
    }

    fn transform(
        &self,
        seed: &mut Seed,
        s: &mut Schema,
        children: &[Capturer],
        imp: &Implementation,
    ) -> Option<Clause> {
        let rest = captured_children(children);
        match seed.random_intn(4) {
            // A FOREACH over nothing.
            0 => {
                let iterator = generate_unique_name(seed, s);
                let nothing = *seed.random_choice(&["null", "[]"]);
                let rest = rest.into_iter().next()?;
                if seed.random_boolean() {
                    return Some(Clause::assembler(
                        format!("FOREACH ({iterator} IN {nothing} | %s) %s"),
                        vec![ForeachCommand.into(), rest],
                    ));
                }
                let mut list = generate_expression_conf(seed, imp.config());
                list.is_list = true;
                Some(Clause::assembler(
                    format!(
                        "FOREACH ({iterator} IN (CASE size(%s) WHEN 0 THEN %[1]s ELSE {nothing} END) | %s) %s"
                    ),
                    vec![Expression::new(list).into(), ForeachCommand.into(), rest],
                ))
            }
            1 => ReadClause::with_all(rest, s, imp),
            // Deleting something deleted before.
            2 => {
                let mut deleted = Vec::new();
                while !seed.random_boolean() {
                    for name in &s.deleted_vars {
                        if seed.random_boolean() {
                            deleted.push(name.as_str());
                        }
                    }
                }
                if deleted.is_empty() {
                    return None;
                }
                let delete = *seed.random_choice(&["DELETE", "DETACH DELETE"]);
                Some(Clause::assembler(
                    format!("{delete} {} %s", deleted.join(", ")),
                    rest,
                ))
            }
            _ => {
                let rest = rest.into_iter().next()?;
                Some(Self::create_and_delete(seed, s, rest))
            }
        }
    }
}

/// Builds a path where every element is new and named. Nodes may be
/// reused from `nodes`; the names of all created elements are appended.
pub(crate) fn create_new_path_with_variables(
    seed: &mut Seed,
    s: &Schema,
    nodes: &mut Vec<String>,
    relationships: &mut Vec<String>,
) -> Clause {
    let node = if !nodes.is_empty() && seed.random_boolean() {
        Clause::stringer(format!("({})", seed.random_choice(nodes.as_slice())))
    } else {
        let name = generate_unique_name(seed, s);
        let node = Clause::assembler(
            format!("({name}%s%s)"),
            vec![Labels::new(StructuralType::NODE).into(), Properties.into()],
        );
        nodes.push(name);
        node
    };
    if seed.random_boolean() {
        return node;
    }

    let relationship = generate_unique_name(seed, s);
    let rest = create_new_path_with_variables(seed, s, nodes, relationships);
    let template = if seed.random_boolean() {
        format!("%s<-[{relationship}%s%s]-%s")
    } else {
        format!("%s-[{relationship}%s%s]->%s")
    };
    relationships.push(relationship);
    Clause::assembler(
        template,
        vec![node, Label::new(StructuralType::RELATIONSHIP).into(), Properties.into(), rest],
    )
}

/// Either another write clause, or the end of the query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OptionalWriteQuery;

impl Production for OptionalWriteQuery {
    fn generate(&mut self, seed: &mut Seed, s: &mut Schema, _: &Implementation) -> Vec<Clause> {
        if !seed.random_boolean() {
            return vec![WriteClause.into()];
        }
        if s.must_return {
            return vec![Return::default().into()];
        }
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::model::StructuralVariable;
    use crate::render::{generate_captured_statement, generate_statement};

    #[test]
    fn exhausted_seed_terminates() {
        let mut s = Schema::new();
        let rendered = generate_statement(
            &mut Seed::replay(Vec::new()),
            &mut s,
            RootClause.into(),
            &Implementation::opencypher(),
            0,
        )
        .unwrap();
        assert!(rendered.contains("RETURN"), "{rendered}");
    }

    #[test]
    fn dead_code_scopes_never_return() {
        let mut s = Schema::new();
        s.cannot_return = true;
        for rng_seed in 0..50 {
            let mut clause = WriteClause;
            let children = clause.generate(
                &mut Seed::from_rng_seed(rng_seed),
                &mut s.clone(),
                &Implementation::opencypher(),
            );
            assert_ne!(children[0].kind(), crate::clause::ClauseKind::Return);
        }
    }

    #[test]
    fn fresh_paths_delete_everything_they_create() {
        let s = Schema::new();
        for rng_seed in 0..20 {
            let mut seed = Seed::from_rng_seed(rng_seed);
            let mut nodes = Vec::new();
            let mut relationships = Vec::new();
            let path = create_new_path_with_variables(&mut seed, &s, &mut nodes, &mut relationships);
            assert!(!nodes.is_empty());

            let rendered = generate_statement(
                &mut seed,
                &mut s.copy(),
                path,
                &Implementation::opencypher(),
                0,
            )
            .unwrap();
            for name in nodes.iter().chain(&relationships) {
                assert!(rendered.contains(name.as_str()), "{name} missing from {rendered}");
            }
        }
    }

    #[test]
    fn write_transform_redeletes() {
        let imp = Implementation::opencypher();
        let mut s = Schema::new();
        s.add_structural_variable(StructuralVariable {
            name: "n".into(),
            ty: StructuralType::NODE,
            likely_null: false,
        });
        s.deleted_vars.insert("n".into());

        let mut saw_redelete = false;
        for rng_seed in 0..100 {
            let mut seed = Seed::from_rng_seed(rng_seed);
            let mut clause = Capturer::new(WriteClause);
            if generate_captured_statement(&mut seed, &mut s.clone(), &mut clause, &imp, 2000).is_err() {
                continue;
            }
            let Some(transformed) = Capturer::transform(&mut clause, &mut seed, &imp) else {
                continue;
            };
            if let Clause::Assembler(_) = &transformed {
                let mut transformed = Capturer::new(transformed);
                let Ok(rendered) =
                    generate_captured_statement(&mut seed, &mut s.clone(), &mut transformed, &imp, 4000)
                else {
                    continue;
                };
                if rendered.starts_with("DELETE n") || rendered.starts_with("DETACH DELETE n") {
                    saw_redelete = true;
                }
            }
        }
        assert!(saw_redelete);
    }

    proptest! {
        #[test]
        fn read_transform_keeps_the_rest(rng_seed in any::<u64>()) {
            let imp = Implementation::opencypher();
            let mut seed = Seed::from_rng_seed(rng_seed);
            let mut clause = Capturer::new(ReadClause::default());
            let Ok(original) = generate_captured_statement(&mut seed, &mut Schema::new(), &mut clause, &imp, 2000) else {
                return Ok(());
            };
            let Some(transformed) = Capturer::transform(&mut clause, &mut seed, &imp) else {
                return Ok(());
            };
            let mut transformed = Capturer::new(transformed);
            if let Ok(rendered) = generate_captured_statement(&mut seed, &mut Schema::new(), &mut transformed, &imp, 8000) {
                prop_assert!(rendered.ends_with(original.as_str()), "{} does not end in {}", rendered, original);
            }
        }
    }
}
