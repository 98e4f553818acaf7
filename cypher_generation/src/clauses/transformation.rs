//! Clauses with a fixed meaning, used by equivalence transformations.
//!
//! Their rigid shape makes them poor material for general generation, but
//! each one guarantees a semantic property: [Tautum] is always true,
//! [Falsum] always false, [DeadCode] never changes the graph or the rows
//! and [NonexistentPattern] never matches anything.

use itertools::Itertools;

use super::path::random_relationship_template;
use super::util::{
    decide_on_label_match_type, generate_expression_ast, generate_property_type, generate_unique_name,
    optional_clause, optional_clause_with_probability,
};
use super::{
    CreateElement, Expression, LabelMatch, MatchElementChain, MatchRelationship, OptionalLabelMatch,
    OptionalPropertyMatch, OptionalStructureName, OptionalWhereClause, PathPatternExpression, PropertyChain,
    ReadClause, SetExpression,
};
use crate::capture::Capturer;
use crate::clause::{Assembler, Clause, Production};
use crate::implementation::Implementation;
use crate::model::{ExpressionConfig, ExpressionType, Property, PropertyType, Schema, StructuralType};
use crate::Seed;

/// Always evaluates to true.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tautum {
    pub conf: ExpressionConfig,
}

impl Tautum {
    pub fn new(conf: ExpressionConfig) -> Self {
        Self { conf }
    }
}

impl Production for Tautum {
    fn generate(&mut self, seed: &mut Seed, _: &mut Schema, _: &Implementation) -> Vec<Clause> {
        let conf = self.conf;
        match seed.random_intn(4) {
            0 => vec![TautumPartition::new(conf).into()],
            1 => vec![Clause::assembler(
                *seed.random_choice(&["((%s) and (%s))", "((%s) or (%s))"]),
                vec![Tautum::new(conf).into(), Tautum::new(conf).into()],
            )],
            2 => vec![Clause::assembler("(NOT (%s))", vec![Falsum::new(conf).into()])],
            _ => vec![Clause::stringer("true")],
        }
    }
}

/// Always evaluates to false.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Falsum {
    pub conf: ExpressionConfig,
}

impl Falsum {
    pub fn new(conf: ExpressionConfig) -> Self {
        Self { conf }
    }
}

impl Production for Falsum {
    fn generate(&mut self, seed: &mut Seed, _: &mut Schema, _: &Implementation) -> Vec<Clause> {
        let conf = self.conf;
        match seed.random_intn(4) {
            0 => vec![FalsumPartition::new(conf).into()],
            1 => vec![Clause::assembler(
                *seed.random_choice(&["((%s) and (%s))", "((%s) or (%s))"]),
                vec![Falsum::new(conf).into(), Falsum::new(conf).into()],
            )],
            2 => vec![Clause::assembler("(NOT (%s))", vec![Tautum::new(conf).into()])],
            _ => vec![Clause::stringer("false")],
        }
    }
}

fn boolean_conf(mut conf: ExpressionConfig) -> ExpressionConfig {
    conf.target_type = ExpressionType::PropertyValue;
    conf.property_type = PropertyType::BOOLEAN;
    conf.is_list = false;
    conf
}

/// Joins the three-valued partition of a predicate `P`, that is `P`,
/// `NOT P` and `P IS NULL` (or their negations), with `joiner`, mixing in
/// unrelated predicates.
fn partition(
    seed: &mut Seed,
    s: &mut Schema,
    imp: &Implementation,
    conf: ExpressionConfig,
    joiner: &str,
    null_test: &str,
) -> Vec<Clause> {
    let predicate = generate_expression_ast(conf, seed, s, imp);
    let filler = |template: String| Clause::assembler(template, vec![Expression::new(conf).into()]);
    vec![
        Clause::stringer("("),
        optional_clause(seed, filler(format!("(%s) {joiner} "))),
        Clause::assembler(" (%s) ", vec![predicate.clone().into()]),
        optional_clause(seed, filler(format!(" {joiner} (%s) "))),
        Clause::assembler(format!(" {joiner} (NOT %s) "), vec![predicate.clone().into()]),
        optional_clause(seed, filler(format!(" {joiner} (%s) "))),
        Clause::assembler(format!(" {joiner} ((%s) {null_test})"), vec![predicate.into()]),
        optional_clause(seed, filler(format!(" {joiner} (%s)"))),
        Clause::stringer(")"),
    ]
}

/// `(P) or (NOT P) or (P IS NULL)`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TautumPartition {
    pub conf: ExpressionConfig,
}

impl TautumPartition {
    pub fn new(conf: ExpressionConfig) -> Self {
        Self { conf }
    }
}

impl Production for TautumPartition {
    fn generate(&mut self, seed: &mut Seed, s: &mut Schema, imp: &Implementation) -> Vec<Clause> {
        self.conf = boolean_conf(self.conf);
        partition(seed, s, imp, self.conf, "or", "IS NULL")
    }
}

/// `(P) and (NOT P) and (P IS NOT NULL)`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FalsumPartition {
    pub conf: ExpressionConfig,
}

impl FalsumPartition {
    pub fn new(conf: ExpressionConfig) -> Self {
        Self { conf }
    }
}

impl Production for FalsumPartition {
    fn generate(&mut self, seed: &mut Seed, s: &mut Schema, imp: &Implementation) -> Vec<Clause> {
        self.conf = boolean_conf(self.conf);
        partition(seed, s, imp, self.conf, "and", "IS NOT NULL")
    }
}

/// A query part without any observable effect: no rows returned, no
/// writes that change the graph.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeadCode {
    was_in_merge_clause: bool,
}

impl DeadCode {
    /// `SET x += {}, ..` on some bound nodes and relationships.
    fn empty_set(seed: &mut Seed, s: &Schema) -> Option<Vec<Clause>> {
        let targets: Vec<&str> = s
            .structural_variables_of(StructuralType::NODE)
            .iter()
            .chain(s.structural_variables_of(StructuralType::RELATIONSHIP))
            .map(|v| v.name.as_str())
            .collect();
        if targets.is_empty() {
            return None;
        }
        let mut set = format!("SET {} += {{}}", seed.random_choice(&targets));
        while !seed.random_boolean() {
            set.push_str(&format!(", {} += {{}}", seed.random_choice(&targets)));
        }
        Some(vec![
            Clause::stringer(set),
            optional_clause(seed, Clause::assembler(" WITH * %s", vec![DeadCode::default().into()])),
        ])
    }

    /// `MATCH x WITH .. MERGE x`, which always finds what it merges.
    fn rematching_merge(seed: &mut Seed, s: &mut Schema, imp: &Implementation) -> Vec<Clause> {
        s.is_in_merge_clause = true;
        let separator = generate_unique_name(seed, s);
        let mut element = Capturer::new(CreateElement::default());
        element.generate_ast(seed, s, imp);

        let carried: String = s
            .property_variables_by_name
            .keys()
            .chain(s.structural_variables_by_name.keys())
            .map(|name| format!("{name}, "))
            .join("");

        let writable = s.structural_variables_of(StructuralType::NODE).len()
            + s.structural_variables_of(StructuralType::RELATIONSHIP).len();
        let set = if !imp.config().only_variables_as_write_target || writable != 0 {
            optional_clause(seed, Clause::assembler("ON CREATE SET %s", vec![SetExpression::default().into()]))
        } else {
            Clause::empty()
        };

        vec![Clause::assembler(
            "MATCH %s %s WITH %s0 AS %s MERGE %s %s %s",
            vec![
                element.clone().into(),
                OptionalWhereClause::default().into(),
                Clause::stringer(carried),
                Clause::stringer(separator),
                element.into(),
                set,
                optional_clause_with_probability(
                    seed,
                    Clause::assembler("WITH * %s", vec![DeadCode::default().into()]),
                    0.1,
                ),
            ],
        )]
    }

    /// A MATCH that cannot match, followed by anything.
    fn unmatchable(seed: &mut Seed, s: &mut Schema, imp: &Implementation) -> Vec<Clause> {
        s.use_new_label_match_type = Some(false);

        // Generated up front, so the pattern can reference the newest variables.
        let mut previous_chain = Capturer::new(optional_clause(
            seed,
            Clause::assembler("%s, ", vec![MatchElementChain::default().into()]),
        ));
        previous_chain.generate_ast(seed, s, imp);
        let mut previous_path = Capturer::new(optional_clause(seed, PathPatternExpression::default()));
        previous_path.generate_ast(seed, s, imp);

        let connect = !matches!(previous_path.clause(), Clause::Empty(_));
        let mut children = vec![
            Clause::stringer("MATCH "),
            previous_chain.into(),
            previous_path.into(),
        ];
        if connect {
            let mut relationship = Capturer::new(Clause::assembler(
                random_relationship_template(seed),
                vec![MatchRelationship::default().into()],
            ));
            relationship.generate_ast(seed, s, imp);
            children.push(relationship.into());
        }
        children.push(NonexistentPattern.into());
        children.push(optional_clause(
            seed,
            Clause::assembler(", %s", vec![MatchElementChain::default().into()]),
        ));
        children.push(ReadClause::default().into());
        children
    }
}

impl Production for DeadCode {
    fn generate(&mut self, seed: &mut Seed, s: &mut Schema, imp: &Implementation) -> Vec<Clause> {
        s.cannot_return = true;
        self.was_in_merge_clause = s.is_in_merge_clause;

        // Mostly pick shapes that keep the tree small.
        if seed.boolean_with_probability(0.9) {
            if seed.random_boolean() {
                if let Some(children) = Self::empty_set(seed, s) {
                    return children;
                }
            }
            return Self::rematching_merge(seed, s, imp);
        }

        if seed.random_boolean() {
            return vec![Clause::assembler(
                "MATCH %s WHERE %s %s",
                vec![
                    MatchElementChain::default().into(),
                    Falsum::default().into(),
                    ReadClause::default().into(),
                ],
            )];
        }
        Self::unmatchable(seed, s, imp)
    }

    fn modify_schema(&mut self, s: &mut Schema) {
        s.is_in_merge_clause = self.was_in_merge_clause;
    }
}

/// A pattern with at least one label or property no graph element has.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NonexistentPattern;

impl NonexistentPattern {
    fn continuation(seed: &mut Seed) -> Clause {
        let relationship = Clause::assembler(
            random_relationship_template(seed),
            vec![MatchRelationship::default().into()],
        );
        optional_clause(
            seed,
            Assembler::concat(vec![relationship, PathPatternExpression::default().into()]),
        )
    }

    fn surrounding_chain(seed: &mut Seed, template: &str) -> Clause {
        optional_clause(
            seed,
            Clause::assembler(template, vec![PropertyChain::new(0.05).into()]),
        )
    }
}

impl Production for NonexistentPattern {
    fn generate(&mut self, seed: &mut Seed, s: &mut Schema, imp: &Implementation) -> Vec<Clause> {
        let fresh = generate_unique_name(seed, s);
        decide_on_label_match_type(seed, s);

        if seed.random_boolean() {
            if seed.random_boolean() {
                s.add_label(StructuralType::NODE, &fresh);
                let node = Clause::assembler(
                    "(%s%s%s%s%s)",
                    vec![
                        OptionalStructureName::new(StructuralType::NODE, false).into(),
                        OptionalLabelMatch::new(StructuralType::NODE).into(),
                        Clause::stringer(format!(":{fresh}")),
                        OptionalLabelMatch::new(StructuralType::NODE).into(),
                        OptionalPropertyMatch.into(),
                    ],
                );
                return vec![node, Self::continuation(seed)];
            }
            s.add_label(StructuralType::RELATIONSHIP, &fresh);
            let template = *seed.random_choice(&["<-[%s:%s%s]-", "-[%s:%s%s]-", "-[%s:%s%s]->"]);
            return vec![
                PathPatternExpression::default().into(),
                Clause::assembler(
                    template,
                    vec![
                        OptionalStructureName::new(StructuralType::RELATIONSHIP, false).into(),
                        Clause::stringer(&fresh),
                        OptionalPropertyMatch.into(),
                    ],
                ),
                PathPatternExpression::default().into(),
            ];
        }

        let ty = generate_property_type(seed, imp.config());
        s.add_property(Property {
            name: fresh.clone(),
            ty,
            value: String::new(),
        });
        let mut value = ExpressionConfig::property(ty);
        value.must_be_non_null = s.is_in_merge_clause;
        let key = Clause::stringer(format!("{fresh}:"));

        if seed.random_boolean() {
            let node = Clause::assembler(
                "(%s%s{%s%s%s%s})",
                vec![
                    OptionalStructureName::new(StructuralType::NODE, false).into(),
                    OptionalLabelMatch::new(StructuralType::NODE).into(),
                    Self::surrounding_chain(seed, "%s, "),
                    key,
                    Expression::new(value).into(),
                    Self::surrounding_chain(seed, ", %s"),
                ],
            );
            return vec![node, Self::continuation(seed)];
        }

        let template = *seed.random_choice(&[
            "<-[%s:%s{%s%s%s%s}]-",
            "-[%s:%s{%s%s%s%s}]-",
            "-[%s:%s{%s%s%s%s}]->",
        ]);
        let relationship = Clause::assembler(
            template,
            vec![
                OptionalStructureName::new(StructuralType::RELATIONSHIP, false).into(),
                LabelMatch::new(StructuralType::RELATIONSHIP).into(),
                Self::surrounding_chain(seed, "%s, "),
                key,
                Expression::new(value).into(),
                Self::surrounding_chain(seed, ", %s"),
            ],
        );
        vec![
            PathPatternExpression::default().into(),
            relationship,
            PathPatternExpression::default().into(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::render::generate_statement;

    fn render(clause: Clause, rng_seed: u64) -> (String, Schema) {
        let mut s = Schema::new();
        let rendered = generate_statement(
            &mut Seed::from_rng_seed(rng_seed),
            &mut s,
            clause,
            &Implementation::opencypher(),
            0,
        )
        .unwrap();
        (rendered, s)
    }

    #[test]
    fn exhausted_seed_partitions() {
        let rendered = generate_statement(
            &mut Seed::replay(Vec::new()),
            &mut Schema::new(),
            Tautum::default().into(),
            &Implementation::opencypher(),
            0,
        )
        .unwrap();
        assert!(rendered.starts_with('(') && rendered.contains(" or (NOT "), "{rendered}");
        assert!(rendered.ends_with("IS NULL))"), "{rendered}");
    }

    #[test]
    fn dead_code_cannot_return() {
        for rng_seed in 0..10 {
            let (_, s) = render(DeadCode::default().into(), rng_seed);
            assert!(s.cannot_return);
            assert!(!s.is_in_merge_clause);
        }
    }

    #[test]
    fn nonexistent_pattern_registers_its_identifier() {
        for rng_seed in 0..20 {
            let (rendered, s) = render(NonexistentPattern.into(), rng_seed);
            let registered = s.labels_of(StructuralType::ANY).len() + s.properties_of(PropertyType::ANY).len();
            assert!(registered >= 1, "{rendered}");
        }
    }

    proptest! {
        #[test]
        fn partitions_use_the_same_predicate_three_times(rng_seed in any::<u64>()) {
            let (rendered, _) = render(FalsumPartition::default().into(), rng_seed);
            prop_assert!(rendered.contains(" and (NOT "));
            prop_assert!(rendered.contains("IS NOT NULL)"));
        }
    }
}
