//! Neo4j: queries may pick a Cypher runtime, index and constraint statements
//! use Neo4j's syntax, string literals may carry unicode escapes, and a few
//! Neo4j only functions are available.

use std::borrow::Cow;

use indexmap::IndexMap;

use super::DropIn;
use crate::capture::Capturer;
use crate::clause::{Clause, ClauseKind, Production};
use crate::clauses::{ConstraintPropertyChain, Label, LabelName, PropertyName, ReadClause};
use crate::implementation::Implementation;
use crate::model::{
    ExpressionConfig, Function, GenerationConfig, PropertyType, Schema, StructuralType, LIST_MASK,
};
use crate::Seed;

const ANY: ExpressionConfig = ExpressionConfig::any();
const ANY_LIST: ExpressionConfig = ExpressionConfig::any().list();
const BOOLEAN: ExpressionConfig = ExpressionConfig::property(PropertyType::BOOLEAN);
const FLOAT: ExpressionConfig = ExpressionConfig::property(PropertyType::FLOAT);
const INTEGER: ExpressionConfig = ExpressionConfig::property(PropertyType::INTEGER);
const POINT: ExpressionConfig = ExpressionConfig::property(PropertyType::POINT);
const POSITIVE_INT32: ExpressionConfig = ExpressionConfig::property(PropertyType::POSITIVE_INT32);
const STRING: ExpressionConfig = ExpressionConfig::property(PropertyType::STRING);
const STRING_LIST: ExpressionConfig = STRING.list();

const INDEX_NAMES: [&str; 3] = ["x", "y", "z"];

pub fn drop_ins() -> Vec<(ClauseKind, DropIn)> {
    vec![
        (ClauseKind::Index, index as DropIn),
        (ClauseKind::RootClause, root_clause as DropIn),
        (ClauseKind::StringLiteral, string_literal as DropIn),
    ]
}

pub fn config() -> GenerationConfig {
    GenerationConfig::default().with_additional_property_functions(property_functions())
}

fn property_functions() -> IndexMap<PropertyType, Vec<Function>> {
    IndexMap::from([
        (
            PropertyType::INTEGER,
            vec![
                Function::nullable("linenumber", &[]),
                Function::new("toInteger", &[BOOLEAN]),
                Function::nullable("toIntegerOrNull", &[ANY]),
            ],
        ),
        (
            PropertyType::FLOAT,
            vec![
                Function::new("haversin", &[FLOAT]),
                Function::new("point.distance", &[POINT, POINT]),
                Function::new("round", &[FLOAT, POSITIVE_INT32]),
                Function::nullable("toFloatOrNull", &[ANY]),
            ],
        ),
        (
            PropertyType::BOOLEAN,
            vec![
                Function::new("isEmpty", &[ANY_LIST]),
                Function::new("isEmpty", &[STRING]),
                Function::new("isNaN", &[INTEGER]),
                Function::new("isNaN", &[FLOAT]),
                Function::new("point.withinBBox", &[POINT, POINT, POINT]),
                Function::new("toBoolean", &[INTEGER]),
                Function::nullable("toBooleanOrNull", &[ANY]),
            ],
        ),
        (
            PropertyType::STRING,
            vec![
                Function::nullable("file", &[]),
                Function::nullable("toStringOrNull", &[ANY]),
            ],
        ),
        (
            PropertyType::STRING.with_mask(LIST_MASK),
            vec![
                Function::new("split", &[STRING, STRING_LIST]),
                Function::new("toStringList", &[ANY_LIST]),
            ],
        ),
        (PropertyType::INTEGER.with_mask(LIST_MASK), vec![Function::new("toIntegerList", &[ANY_LIST])]),
        (PropertyType::BOOLEAN.with_mask(LIST_MASK), vec![Function::new("toBooleanList", &[ANY_LIST])]),
        (PropertyType::FLOAT.with_mask(LIST_MASK), vec![Function::new("toFloatList", &[ANY_LIST])]),
    ])
}

fn index(_: Clause, _: &mut Seed, _: &mut Schema) -> Clause {
    Index::default().into()
}

fn root_clause(_: Clause, _: &mut Seed, _: &mut Schema) -> Clause {
    RootClause.into()
}

/// Half of the string literals mix in `\uXXXX` escapes.
fn string_literal(clause: Clause, seed: &mut Seed, _: &mut Schema) -> Clause {
    if seed.random_boolean() {
        return clause;
    }
    let mut literal = String::from("\"");
    while !seed.random_boolean() {
        if seed.random_boolean() {
            let c = (seed.random_intn(127 - 32) + 32) as u8 as char;
            if c != '"' && c != '\\' {
                literal.push(c);
            }
        } else {
            literal.push_str(&format!("\\u{:04x}", seed.random_i64() as u16));
        }
    }
    literal.push('"');
    Clause::stringer(literal)
}

/// An index statement, or a query preceded by an optional runtime selection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RootClause;

impl Production for RootClause {
    fn generate(&mut self, seed: &mut Seed, _: &mut Schema, _: &Implementation) -> Vec<Clause> {
        if seed.get_byte() % 5 == 0 {
            return vec![crate::clauses::Index.into()];
        }
        vec![Runtime::default().into(), ReadClause::default().into()]
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
enum RuntimeType {
    #[default]
    None,
    Legacy,
    Pipelined,
    Slotted,
    Parallel,
    Interpreted,
}

impl RuntimeType {
    const ALL: [Self; 6] = [
        Self::None,
        Self::Legacy,
        Self::Pipelined,
        Self::Slotted,
        Self::Parallel,
        Self::Interpreted,
    ];

    fn prefix(self) -> String {
        match self {
            Self::None => String::new(),
            runtime => format!("CYPHER runtime = {runtime} "),
        }
    }
}

/// `CYPHER runtime = ...` prefix. The parallel runtime only runs read-only queries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Runtime {
    runtime: RuntimeType,
}

impl Production for Runtime {
    fn generate(&mut self, seed: &mut Seed, s: &mut Schema, _: &Implementation) -> Vec<Clause> {
        self.runtime = *seed.random_choice(&RuntimeType::ALL);
        if self.runtime == RuntimeType::Parallel {
            s.disallow_write_clauses = true;
        }
        Vec::new()
    }

    fn template(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Owned(self.runtime.prefix()))
    }

    fn is_transformer(&self) -> bool {
        true
    }

    /// Any other runtime must produce the same result. Parallel is never
    /// picked, since the rest of the query may write.
    fn transform(&self, seed: &mut Seed, _: &mut Schema, _: &[Capturer], _: &Implementation) -> Option<Clause> {
        let runtime = match *seed.random_choice(&RuntimeType::ALL) {
            RuntimeType::Parallel => RuntimeType::None,
            runtime => runtime,
        };
        Some(Clause::stringer(runtime.prefix()))
    }

    fn no_strategy_reduce(&self, _: &Capturer) -> Option<Clause> {
        (self.runtime != RuntimeType::None).then(Clause::empty)
    }
}

/// `CREATE <type> INDEX <name> IF NOT EXISTS ...`, or a uniqueness constraint.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Index {
    generate_constraint: bool,
    index_type: &'static str,
    index_name: &'static str,
}

impl Production for Index {
    fn generate(&mut self, seed: &mut Seed, s: &mut Schema, _: &Implementation) -> Vec<Clause> {
        self.generate_constraint = seed.random_boolean();
        if self.generate_constraint {
            return vec![Constraint.into()];
        }

        self.index_name = *seed.random_choice(&INDEX_NAMES);
        s.indexes.push(self.index_name.to_string());

        let (index_type, on): (_, Clause) = match seed.random_intn(4) {
            0 => ("RANGE", IndexOnProperties::default().into()),
            1 => ("LOOKUP", IndexOnLabels::default().into()),
            2 => ("TEXT", IndexOnProperty::default().into()),
            _ => ("POINT", IndexOnProperty::default().into()),
        };
        self.index_type = index_type;
        vec![on]
    }

    fn template(&self) -> Option<Cow<'_, str>> {
        if self.generate_constraint {
            return Some(Cow::Borrowed("%s"));
        }
        Some(Cow::Owned(format!(
            "CREATE {} INDEX {} IF NOT EXISTS %s",
            self.index_type, self.index_name
        )))
    }

    fn is_transformer(&self) -> bool {
        true
    }

    /// Indexes and constraints on an empty graph do not affect any result.
    /// An empty statement is rejected, so send one that does nothing.
    fn transform(&self, _: &mut Seed, _: &mut Schema, _: &[Capturer], _: &Implementation) -> Option<Clause> {
        Some(Clause::stringer("DELETE NULL"))
    }
}

fn indexed_structure(seed: &mut Seed) -> (bool, &'static str) {
    let is_for_node = seed.random_boolean();
    (is_for_node, *seed.random_choice(&INDEX_NAMES))
}

fn structural_type(is_for_node: bool) -> StructuralType {
    if is_for_node {
        StructuralType::NODE
    } else {
        StructuralType::RELATIONSHIP
    }
}

/// A range index over one or more properties.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexOnProperties {
    is_for_node: bool,
    var_name: &'static str,
}

impl Production for IndexOnProperties {
    fn generate(&mut self, seed: &mut Seed, _: &mut Schema, _: &Implementation) -> Vec<Clause> {
        (self.is_for_node, self.var_name) = indexed_structure(seed);
        vec![
            LabelName::new(structural_type(self.is_for_node)).into(),
            IndexOnPropertiesProperties::new(self.var_name).into(),
        ]
    }

    fn template(&self) -> Option<Cow<'_, str>> {
        let v = self.var_name;
        Some(Cow::Owned(if self.is_for_node {
            format!("FOR ({v}:%s) ON (%s)")
        } else {
            format!("FOR ()-[{v}:%s]-() ON (%s)")
        }))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexOnPropertiesProperties {
    has_next: bool,
    var_name: &'static str,
}

impl IndexOnPropertiesProperties {
    fn new(var_name: &'static str) -> Self {
        Self {
            has_next: false,
            var_name,
        }
    }
}

impl Production for IndexOnPropertiesProperties {
    fn generate(&mut self, seed: &mut Seed, _: &mut Schema, _: &Implementation) -> Vec<Clause> {
        self.has_next = !seed.random_boolean();
        let mut children = vec![PropertyName::default().into()];
        if self.has_next {
            children.push(IndexOnPropertiesProperties::new(self.var_name).into());
        }
        children
    }

    fn template(&self) -> Option<Cow<'_, str>> {
        let suffix = if self.has_next { ", %s" } else { "" };
        Some(Cow::Owned(format!("{}.%s{suffix}", self.var_name)))
    }
}

/// A lookup index over node labels or relationship types.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexOnLabels {
    is_for_node: bool,
    var_name: &'static str,
}

impl Production for IndexOnLabels {
    fn generate(&mut self, seed: &mut Seed, _: &mut Schema, _: &Implementation) -> Vec<Clause> {
        (self.is_for_node, self.var_name) = indexed_structure(seed);
        Vec::new()
    }

    fn template(&self) -> Option<Cow<'_, str>> {
        let v = self.var_name;
        Some(Cow::Owned(if self.is_for_node {
            format!("FOR ({v}) ON EACH labels({v})")
        } else {
            format!("FOR ()-[{v}]-() ON EACH type({v})")
        }))
    }
}

/// A text or point index over a single property.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexOnProperty {
    is_for_node: bool,
    var_name: &'static str,
}

impl Production for IndexOnProperty {
    fn generate(&mut self, seed: &mut Seed, _: &mut Schema, _: &Implementation) -> Vec<Clause> {
        (self.is_for_node, self.var_name) = indexed_structure(seed);
        vec![
            LabelName::new(structural_type(self.is_for_node)).into(),
            PropertyName::default().into(),
        ]
    }

    fn template(&self) -> Option<Cow<'_, str>> {
        let v = self.var_name;
        Some(Cow::Owned(if self.is_for_node {
            format!("FOR ({v}:%s) ON ({v}.%s)")
        } else {
            format!("FOR ()-[{v}:%s]-() ON ({v}.%s)")
        }))
    }
}

/// A uniqueness constraint on node or relationship properties.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Constraint;

impl Production for Constraint {
    fn generate(&mut self, seed: &mut Seed, _: &mut Schema, _: &Implementation) -> Vec<Clause> {
        if seed.random_boolean() {
            return vec![NodeConstraint.into()];
        }
        vec![RelationshipConstraint.into()]
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeConstraint;

impl Production for NodeConstraint {
    fn generate(&mut self, _: &mut Seed, _: &mut Schema, _: &Implementation) -> Vec<Clause> {
        vec![Label::new(StructuralType::NODE).into(), ConstraintPropertyChain::new("n").into()]
    }

    fn template(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Borrowed("CREATE CONSTRAINT IF NOT EXISTS FOR (n%s) REQUIRE (%s) IS UNIQUE"))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RelationshipConstraint;

impl Production for RelationshipConstraint {
    fn generate(&mut self, _: &mut Seed, _: &mut Schema, _: &Implementation) -> Vec<Clause> {
        vec![
            Label::new(StructuralType::RELATIONSHIP).into(),
            ConstraintPropertyChain::new("n").into(),
        ]
    }

    fn template(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Borrowed(
            "CREATE CONSTRAINT IF NOT EXISTS FOR ()-[n%s]-() REQUIRE (%s) IS UNIQUE",
        ))
    }
}
