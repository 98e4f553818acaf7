//! Memgraph: no list comprehensions, subquery expressions, temporal values or
//! points, only the old label expression syntax, and its own index and
//! constraint statements.

use std::borrow::Cow;

use super::DropIn;
use crate::clause::{Clause, ClauseKind, Production};
use crate::clauses::{
    ConstraintPropertyChain, Expression, Label, ListLiteral, NewProperty, PropertyName,
};
use crate::implementation::Implementation;
use crate::model::{
    ExpressionConfig, GenerationConfig, PropertyType, Schema, StructuralType, NON_NULL_MASK,
};
use crate::Seed;

pub fn drop_ins() -> Vec<(ClauseKind, DropIn)> {
    vec![
        (ClauseKind::ListComprehension, list_comprehension as DropIn),
        (ClauseKind::Exists, exists as DropIn),
        (ClauseKind::Count, count as DropIn),
        (ClauseKind::Collect, collect as DropIn),
        (ClauseKind::LabelMatch, label_match as DropIn),
        (ClauseKind::ExistingProperty, existing_property as DropIn),
        (ClauseKind::PropertyLiteral, property_literal as DropIn),
        (ClauseKind::Index, index as DropIn),
    ]
}

pub fn config() -> GenerationConfig {
    GenerationConfig::default()
        .with_only_variables_as_write_target(true)
        .with_asterisk_needs_targets(true)
        .with_disallow_match_after_optional_match(true)
        .with_disallowed_property_types(vec![
            PropertyType::DATE,
            PropertyType::DATETIME,
            PropertyType::DURATION,
            PropertyType::LOCAL_DATE_TIME,
            PropertyType::LOCAL_TIME,
            PropertyType::TIME,
            PropertyType::POINT,
            // Too slow, times out constantly.
            PropertyType::FLOAT,
        ])
        .with_disallowed_functions(vec![
            "range",
            "length",
            "reverse",
            "cot",
            "degrees",
            "radians",
            "percentileDisc",
            "percentileCont",
            // Paralyzes the server.
            "replace",
        ])
}

fn list_comprehension(clause: Clause, _: &mut Seed, _: &mut Schema) -> Clause {
    match clause {
        Clause::ListComprehension(c) => Expression::new(c.conf).into(),
        clause => clause,
    }
}

fn collect(clause: Clause, _: &mut Seed, _: &mut Schema) -> Clause {
    match clause {
        Clause::Collect(c) => ListLiteral::new(c.conf).into(),
        clause => clause,
    }
}

fn exists(_: Clause, _: &mut Seed, _: &mut Schema) -> Clause {
    Expression::new(ExpressionConfig::property(PropertyType::BOOLEAN).non_null().constant()).into()
}

fn count(_: Clause, _: &mut Seed, _: &mut Schema) -> Clause {
    Expression::new(ExpressionConfig::property(PropertyType::INTEGER).non_null().constant()).into()
}

fn existing_property(_: Clause, _: &mut Seed, _: &mut Schema) -> Clause {
    NewProperty::default().into()
}

fn index(_: Clause, _: &mut Seed, _: &mut Schema) -> Clause {
    Index::default().into()
}

fn label_match(clause: Clause, _: &mut Seed, s: &mut Schema) -> Clause {
    s.use_new_label_match_type = Some(false);
    clause
}

fn property_literal(clause: Clause, _: &mut Seed, _: &mut Schema) -> Clause {
    match clause {
        Clause::PropertyLiteral(c)
            if c.conf.property_type.without_mask(NON_NULL_MASK) == PropertyType::FLOAT =>
        {
            Clause::stringer("1.0")
        }
        clause => clause,
    }
}

/// `CREATE [EDGE] INDEX ON ...`, or a uniqueness constraint.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Index {
    generate_constraint: bool,
    index_type: &'static str,
}

impl Production for Index {
    fn generate(&mut self, seed: &mut Seed, _: &mut Schema, _: &Implementation) -> Vec<Clause> {
        self.generate_constraint = seed.random_boolean();
        if self.generate_constraint {
            return vec![Constraint.into()];
        }
        if seed.random_boolean() {
            if seed.random_boolean() {
                self.index_type = " EDGE";
            }
            return vec![IndexOnLabel.into()];
        }
        vec![IndexOnProperty.into()]
    }

    fn template(&self) -> Option<Cow<'_, str>> {
        if self.generate_constraint {
            return Some(Cow::Borrowed("%s"));
        }
        Some(Cow::Owned(format!("CREATE{} INDEX ON %s", self.index_type)))
    }
}

/// `:Label`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexOnLabel;

impl Production for IndexOnLabel {
    fn generate(&mut self, _: &mut Seed, _: &mut Schema, _: &Implementation) -> Vec<Clause> {
        vec![Label::new(StructuralType::ANY).into()]
    }
}

/// `:Label(property)`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexOnProperty;

impl Production for IndexOnProperty {
    fn generate(&mut self, _: &mut Seed, _: &mut Schema, _: &Implementation) -> Vec<Clause> {
        vec![Label::new(StructuralType::ANY).into(), PropertyName::default().into()]
    }

    fn template(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Borrowed("%s(%s)"))
    }
}

/// Memgraph only supports uniqueness constraints on node properties.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Constraint;

impl Production for Constraint {
    fn generate(&mut self, _: &mut Seed, _: &mut Schema, _: &Implementation) -> Vec<Clause> {
        vec![Label::new(StructuralType::NODE).into(), ConstraintPropertyChain::new("n").into()]
    }

    fn template(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Borrowed("CREATE CONSTRAINT ON (n%s) ASSERT %s IS UNIQUE"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clauses::{LabelMatch, ListComprehension, PropertyLiteral, RootClause};
    use crate::render::generate_statement;

    fn render(clause: Clause, rng_seed: u64) -> String {
        generate_statement(
            &mut Seed::from_rng_seed(rng_seed),
            &mut Schema::new(),
            clause,
            &Implementation::memgraph(),
            0,
        )
        .unwrap()
    }

    #[test]
    fn index_statements() {
        for rng_seed in 0..50 {
            let rendered = render(crate::clauses::Index.into(), rng_seed);
            assert!(
                rendered.starts_with("CREATE INDEX ON :")
                    || rendered.starts_with("CREATE EDGE INDEX ON :")
                    || rendered.starts_with("CREATE CONSTRAINT ON (n:"),
                "{rendered}"
            );
        }
    }

    #[test]
    fn constraints_assert_uniqueness() {
        let rendered = render(Constraint.into(), 4);
        assert!(rendered.ends_with(" IS UNIQUE"), "{rendered}");
        assert!(rendered.contains("ASSERT n."), "{rendered}");
    }

    #[test]
    fn label_matches_use_the_old_syntax() {
        let imp = Implementation::memgraph();
        let mut s = Schema::new();
        s.use_new_label_match_type = Some(true);
        let adapted = imp.adapt(
            LabelMatch::new(StructuralType::NODE).into(),
            &mut Seed::replay(Vec::new()),
            &mut s,
        );
        assert_eq!(adapted.kind(), ClauseKind::LabelMatch);
        assert_eq!(s.use_new_label_match_type, Some(false));
    }

    #[test]
    fn unsupported_expressions_are_replaced() {
        let imp = Implementation::memgraph();
        let mut seed = Seed::replay(Vec::new());
        let mut s = Schema::new();
        let conf = ExpressionConfig::property(PropertyType::INTEGER).list();

        let adapted = imp.adapt(ListComprehension::new(conf).into(), &mut seed, &mut s);
        assert_eq!(adapted, Clause::from(Expression::new(conf)));

        let float = PropertyLiteral::new(ExpressionConfig::property(PropertyType::FLOAT).non_null());
        assert_eq!(imp.adapt(float.into(), &mut seed, &mut s), Clause::stringer("1.0"));

        let integer = PropertyLiteral::new(ExpressionConfig::property(PropertyType::INTEGER));
        assert_eq!(imp.adapt(integer.clone().into(), &mut seed, &mut s), Clause::from(integer));
    }

    #[test]
    fn queries_avoid_disallowed_syntax() {
        for rng_seed in 0..100 {
            let Ok(rendered) = generate_statement(
                &mut Seed::from_rng_seed(rng_seed),
                &mut Schema::new(),
                RootClause.into(),
                &Implementation::memgraph(),
                3000,
            ) else {
                continue;
            };
            assert!(!rendered.contains("EXISTS {"), "{rendered}");
            assert!(!rendered.contains("COUNT {"), "{rendered}");
        }
    }
}
