//! Path patterns as they appear in MATCH, including the two pattern shapes
//! that can be rewritten into equivalent ones.

use std::borrow::Cow;

use super::util::{captured_children, decide_on_label_match_type, generate_unique_name, optional_clause};
use super::{OptionalLabelMatch, OptionalPropertyMatch, OptionalStructureName, PropertiesMatch, StructureName};
use crate::capture::Capturer;
use crate::clause::{Clause, Production};
use crate::implementation::Implementation;
use crate::model::{Schema, StructuralType, StructuralVariable, LIST_MASK};
use crate::Seed;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) enum Direction {
    #[default]
    None,
    Left,
    Right,
    Any,
}

impl Direction {
    /// Any of the four directions.
    pub(crate) fn draw(seed: &mut Seed) -> Self {
        match seed.random_intn(4) {
            0 => Direction::None,
            1 => Direction::Left,
            2 => Direction::Right,
            _ => Direction::Any,
        }
    }

    /// A direction that connects two nodes.
    pub(crate) fn draw_connecting(seed: &mut Seed) -> Self {
        match seed.random_intn(3) {
            1 => Direction::Left,
            2 => Direction::Right,
            _ => Direction::Any,
        }
    }

    /// `(a)` then the relationship then `(b)`.
    fn template(self) -> &'static str {
        match self {
            Direction::None => "%s",
            Direction::Left => "%s<-%s-%s",
            Direction::Right => "%s-%s->%s",
            Direction::Any => "%s-%s-%s",
        }
    }

    /// A relationship template that may follow a node.
    pub(crate) fn relationship_template(self) -> &'static str {
        match self {
            Direction::None => "",
            Direction::Left => "<-%s-%s",
            Direction::Right => "-%s->%s",
            Direction::Any => "-%s-%s",
        }
    }

    pub(crate) fn reversed(self) -> Self {
        match self {
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
            other => other,
        }
    }
}

/// A relationship template around a single child, e.g. `-%s->`.
pub(crate) fn random_relationship_template(seed: &mut Seed) -> &'static str {
    *seed.random_choice(&["<-%s-", "-%s-", "-%s->"])
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PathPatternExpression {
    pub is_optional: bool,
    /// Continues another path pattern.
    is_child: bool,
    direction: Direction,
}

impl PathPatternExpression {
    pub fn new(is_optional: bool) -> Self {
        Self {
            is_optional,
            ..Self::default()
        }
    }

    fn child(is_optional: bool) -> Self {
        Self {
            is_optional,
            is_child: true,
            direction: Direction::None,
        }
    }
}

impl Production for PathPatternExpression {
    fn generate(&mut self, seed: &mut Seed, s: &mut Schema, _: &Implementation) -> Vec<Clause> {
        decide_on_label_match_type(seed, s);
        if seed.boolean_with_probability(0.1) {
            return vec![TransformablePath {
                is_optional: self.is_optional,
                is_child: self.is_child,
            }
            .into()];
        }

        self.direction = Direction::draw(seed);
        if seed.boolean_with_probability(0.75) {
            self.direction = Direction::None;
        }
        let node = MatchNode::new(self.is_optional).into();
        if self.direction == Direction::None {
            return vec![node];
        }
        vec![
            node,
            MatchRelationship::new(self.is_optional).into(),
            PathPatternExpression::child(self.is_optional).into(),
        ]
    }

    fn template(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Borrowed(self.direction.template()))
    }

    fn no_strategy_reduce(&self, this: &Capturer) -> Option<Clause> {
        this.children().first().cloned().map(Clause::captured)
    }
}

/// `(name:Labels {props})`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchNode {
    pub is_optional: bool,
}

impl MatchNode {
    pub fn new(is_optional: bool) -> Self {
        Self { is_optional }
    }
}

impl Production for MatchNode {
    fn generate(&mut self, _: &mut Seed, _: &mut Schema, _: &Implementation) -> Vec<Clause> {
        vec![
            OptionalStructureName::new(StructuralType::NODE, self.is_optional).into(),
            OptionalLabelMatch::new(StructuralType::NODE).into(),
            OptionalPropertyMatch.into(),
        ]
    }

    fn template(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Borrowed("(%s%s%s)"))
    }
}

/// `[name:TYPE*min..max {props}]`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchRelationship {
    pub is_optional: bool,
    min_length: Option<usize>,
    max_length: Option<usize>,
    has_structure_name: bool,
}

impl MatchRelationship {
    pub fn new(is_optional: bool) -> Self {
        Self {
            is_optional,
            ..Self::default()
        }
    }

    fn is_variable_length(&self) -> bool {
        self.min_length.is_some() || self.max_length.is_some()
    }

    fn length_range(min: Option<usize>, max: Option<usize>) -> String {
        let mut range = "*".to_string();
        if let Some(min) = min {
            range.push_str(&min.to_string());
        }
        range.push_str("..");
        if let Some(max) = max {
            range.push_str(&max.to_string());
        }
        range
    }
}

impl Production for MatchRelationship {
    fn generate(&mut self, seed: &mut Seed, s: &mut Schema, _: &Implementation) -> Vec<Clause> {
        // Relationship type expressions of the new syntax rule out variable lengths.
        if s.use_new_label_match_type != Some(true) {
            if seed.boolean_with_probability(0.05) {
                self.min_length = Some(seed.random_intn(10));
            }
            if seed.boolean_with_probability(0.05) {
                self.max_length = Some(seed.random_intn(20) + self.min_length.unwrap_or(0));
            }
        }
        let ty = if self.is_variable_length() {
            StructuralType::RELATIONSHIP.with_mask(LIST_MASK)
        } else {
            StructuralType::RELATIONSHIP
        };
        let name = if seed.random_boolean() {
            self.has_structure_name = true;
            StructureName::new(ty, self.is_optional).into()
        } else {
            Clause::empty()
        };
        vec![
            name,
            OptionalLabelMatch::new(StructuralType::RELATIONSHIP).into(),
            OptionalPropertyMatch.into(),
        ]
    }

    fn template(&self) -> Option<Cow<'_, str>> {
        if !self.is_variable_length() {
            return Some(Cow::Borrowed("[%s%s%s]"));
        }
        let range = Self::length_range(self.min_length, self.max_length);
        Some(Cow::Owned(format!("[%s%s{range}%s]")))
    }

    fn is_transformer(&self) -> bool {
        true
    }

    /// Splits `()-[*x..y]-()` into `()-[*x-z..y-z]-()-[*z..z]-()`.
    fn transform(&self, seed: &mut Seed, _: &mut Schema, children: &[Capturer], _: &Implementation) -> Option<Clause> {
        if self.has_structure_name {
            return None;
        }
        // Without a lower bound both hops would default to a minimum length of one.
        let min = self.min_length.filter(|min| *min >= 2)?;
        let offset = seed.random_intn(min - 1) + 1;
        let first = Self::length_range(Some(min - offset), self.max_length.map(|max| max - offset));
        let second = Self::length_range(Some(offset), self.max_length.map(|_| offset));
        Some(Clause::assembler(
            format!("[%s%s{first}%s]-()-[%[1]s%[2]s{second}%[3]s]"),
            captured_children(children),
        ))
    }
}

/// A path that can be rewritten into an equivalent path.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransformablePath {
    pub is_optional: bool,
    is_child: bool,
}

impl Production for TransformablePath {
    fn generate(&mut self, seed: &mut Seed, _: &mut Schema, _: &Implementation) -> Vec<Clause> {
        if seed.random_intn(2) == 1 {
            return vec![CyclicPath::new(self.is_optional).into()];
        }
        if self.is_child {
            vec![PathPatternExpression::child(self.is_optional).into()]
        } else {
            vec![ReversiblePath::new(self.is_optional).into()]
        }
    }
}

/// A path that gets reversed when transformed, e.g.
/// `(a)-[b]->(c)` becomes `(c)<-[b]-(a)`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReversiblePath {
    pub is_optional: bool,
    template: String,
    reversed_template: String,
}

impl ReversiblePath {
    pub fn new(is_optional: bool) -> Self {
        Self {
            is_optional,
            ..Self::default()
        }
    }
}

impl Production for ReversiblePath {
    fn generate(&mut self, seed: &mut Seed, s: &mut Schema, _: &Implementation) -> Vec<Clause> {
        decide_on_label_match_type(seed, s);
        let mut children = vec![MatchNode::new(self.is_optional).into()];
        self.template = "%s".into();
        self.reversed_template = "%s".into();

        while !seed.random_boolean() {
            children.push(MatchRelationship::new(self.is_optional).into());
            children.push(MatchNode::new(self.is_optional).into());

            let direction = Direction::draw_connecting(seed);
            self.template.push_str(direction.relationship_template());
            let reversed = direction.reversed().relationship_template();
            // `<-%s-%s` read from the other end is `%s-%s->`
            let prefix = format!("%s{}", &reversed[..reversed.len() - 2]);
            self.reversed_template.insert_str(0, &prefix);
        }
        children
    }

    fn template(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Borrowed(&self.template))
    }

    fn is_transformer(&self) -> bool {
        true
    }

    fn transform(&self, _: &mut Seed, _: &mut Schema, children: &[Capturer], _: &Implementation) -> Option<Clause> {
        let mut reversed = captured_children(children);
        reversed.reverse();
        Some(Clause::assembler(self.reversed_template.clone(), reversed))
    }
}

/// A cycle through a single node, e.g. `(a)-->(a)`. Transforming it walks
/// the cycle some more times.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CyclicPath {
    pub is_optional: bool,
    name: String,
    template: String,
}

impl CyclicPath {
    pub fn new(is_optional: bool) -> Self {
        Self {
            is_optional,
            ..Self::default()
        }
    }

    fn step(&self, seed: &mut Seed) -> String {
        match Direction::draw_connecting(seed) {
            Direction::Left => format!("<--({})", self.name),
            Direction::Right => format!("-->({})", self.name),
            _ => format!("--({})", self.name),
        }
    }
}

impl Production for CyclicPath {
    fn generate(&mut self, seed: &mut Seed, s: &mut Schema, _: &Implementation) -> Vec<Clause> {
        self.name = generate_unique_name(seed, s);
        s.add_structural_variable(StructuralVariable {
            name: self.name.clone(),
            ty: StructuralType::NODE,
            likely_null: self.is_optional,
        });

        let mut children = Vec::new();
        if seed.random_boolean() {
            children.push(PathPatternExpression::child(self.is_optional).into());
            self.template.push_str("%s<--");
        }
        self.template.push_str("%s");
        children.push(Clause::assembler(
            format!("({}%s)", self.name),
            vec![optional_clause(seed, PropertiesMatch)],
        ));

        let step = self.step(seed);
        self.template.push_str(&step);
        while !seed.random_boolean() {
            let step = self.step(seed);
            self.template.push_str(&step);
        }

        let last = Direction::draw(seed);
        if last != Direction::None {
            self.template.push_str(last.relationship_template());
            children.push(optional_clause(seed, MatchRelationship::new(self.is_optional)));
            children.push(PathPatternExpression::child(true).into());
        }
        children
    }

    fn template(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Borrowed(&self.template))
    }

    fn is_transformer(&self) -> bool {
        true
    }

    fn transform(&self, seed: &mut Seed, _: &mut Schema, children: &[Capturer], _: &Implementation) -> Option<Clause> {
        let mut template = self.template.clone();
        // The steps sit right before an optional trailing relationship.
        let insert_at = template.rfind(')').map_or(template.len(), |i| i + 1);
        let mut steps = self.step(seed);
        while !seed.random_boolean() {
            steps.push_str(&self.step(seed));
        }
        template.insert_str(insert_at, &steps);
        Some(Clause::assembler(template, captured_children(children)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{generate_captured_statement, generate_statement};

    #[test]
    fn reversed_path_reads_backwards() {
        let imp = Implementation::opencypher();
        for rng_seed in 0..40 {
            let mut seed = Seed::from_rng_seed(rng_seed);
            let mut s = Schema::new();
            let mut path = Capturer::new(ReversiblePath::new(false));
            let original = generate_captured_statement(&mut seed, &mut s, &mut path, &imp, 0).unwrap();

            let reversed = Capturer::transform(&mut path, &mut seed, &imp).unwrap();
            let mut reversed = Capturer::new(reversed);
            let rendered = generate_captured_statement(&mut seed, &mut Schema::new(), &mut reversed, &imp, 0).unwrap();

            // Same elements, read from the other end.
            let normalized = |query: &str| {
                let mut chars: Vec<char> = query
                    .chars()
                    .map(|c| if c == '<' || c == '>' { '|' } else { c })
                    .collect();
                chars.sort_unstable();
                chars
            };
            assert_eq!(normalized(&rendered), normalized(&original));
            assert_eq!(rendered.len(), original.len());
        }
    }

    #[test]
    fn variable_length_split_keeps_bounds() {
        let relationship = MatchRelationship {
            is_optional: false,
            min_length: Some(5),
            max_length: Some(9),
            has_structure_name: false,
        };
        let imp = Implementation::opencypher();
        let mut seed = Seed::replay(Vec::new());
        let split = relationship
            .transform(&mut seed, &mut Schema::new(), &[], &imp)
            .unwrap();
        let split = Capturer::new(split);
        // Offset one on an exhausted seed.
        assert_eq!(split.template_string(), "[%s%s*4..8%s]-()-[%[1]s%[2]s*1..1%[3]s]");

        let unbounded = MatchRelationship {
            min_length: None,
            max_length: Some(9),
            ..relationship
        };
        assert!(unbounded.transform(&mut seed, &mut Schema::new(), &[], &imp).is_none());
    }

    #[test]
    fn cyclic_path_binds_its_node() {
        let mut s = Schema::new();
        let rendered = generate_statement(
            &mut Seed::from_rng_seed(9),
            &mut s,
            CyclicPath::new(false).into(),
            &Implementation::opencypher(),
            0,
        )
        .unwrap();
        let (name, _) = s.structural_variables_by_name.first().unwrap();
        assert!(rendered.matches(&format!("({name}")).count() >= 2, "{rendered}");
    }
}
