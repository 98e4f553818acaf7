use std::borrow::Cow;

use super::path::Direction;
use super::util::generate_unique_name;
use super::{Label, Labels, OptionalProperties, OptionalWriteQuery};
use crate::capture::Capturer;
use crate::clause::{Clause, Production};
use crate::implementation::Implementation;
use crate::model::{Schema, StructuralType, StructuralVariable};
use crate::Seed;

/// Marks a variable created by the current clause. It only becomes visible
/// once the whole clause is generated.
fn just_created(s: &mut Schema, name: &str, ty: StructuralType) {
    s.just_created_structural_variables.push(StructuralVariable {
        name: name.to_string(),
        ty,
        likely_null: false,
    });
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Create;

impl Production for Create {
    fn generate(&mut self, _: &mut Seed, _: &mut Schema, _: &Implementation) -> Vec<Clause> {
        vec![CreateClause.into(), OptionalWriteQuery.into()]
    }

    fn template(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Borrowed("%s %s"))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CreateClause;

impl Production for CreateClause {
    fn generate(&mut self, _: &mut Seed, s: &mut Schema, _: &Implementation) -> Vec<Clause> {
        s.just_created_structural_variables.clear();
        vec![CreateElementChain::default().into()]
    }

    fn template(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Borrowed("CREATE %s"))
    }

    fn modify_schema(&mut self, s: &mut Schema) {
        for variable in std::mem::take(&mut s.just_created_structural_variables) {
            s.add_structural_variable(variable);
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CreateElementChain {
    is_base_case: bool,
}

impl Production for CreateElementChain {
    fn generate(&mut self, seed: &mut Seed, _: &mut Schema, _: &Implementation) -> Vec<Clause> {
        self.is_base_case = seed.random_boolean();
        let element = CreateElement::default().into();
        if self.is_base_case {
            vec![element]
        } else {
            vec![element, CreateElementChain::default().into()]
        }
    }

    fn template(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Borrowed(if self.is_base_case { "%s" } else { "%s, %s" }))
    }

    fn no_strategy_reduce(&self, this: &Capturer) -> Option<Clause> {
        this.children().last().cloned().map(Clause::captured)
    }
}

/// A created path, sometimes bound to a path variable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CreateElement {
    path_name: String,
}

impl Production for CreateElement {
    fn generate(&mut self, seed: &mut Seed, s: &mut Schema, _: &Implementation) -> Vec<Clause> {
        if seed.random_boolean() {
            self.path_name = generate_unique_name(seed, s);
            just_created(s, &self.path_name, StructuralType::PATH);
        }
        vec![CreatePathElement::default().into()]
    }

    fn template(&self) -> Option<Cow<'_, str>> {
        Some(if self.path_name.is_empty() {
            Cow::Borrowed("%s")
        } else {
            Cow::Owned(format!("{} = %s", self.path_name))
        })
    }
}

/// A node, optionally followed by a directed relationship and the rest of the path.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CreatePathElement {
    /// Part of a relationship being created.
    pub in_relationship: bool,
    direction: Direction,
    relationship_name: String,
}

impl CreatePathElement {
    pub fn new(in_relationship: bool) -> Self {
        Self {
            in_relationship,
            ..Self::default()
        }
    }
}

impl Production for CreatePathElement {
    fn generate(&mut self, seed: &mut Seed, s: &mut Schema, _: &Implementation) -> Vec<Clause> {
        // Created relationships always have a direction.
        self.direction = match seed.random_intn(3) {
            1 => Direction::Left,
            2 => Direction::Right,
            _ => Direction::None,
        };
        if self.direction == Direction::None {
            return vec![CreateNode::new(self.in_relationship).into()];
        }
        if seed.random_boolean() {
            self.relationship_name = generate_unique_name(seed, s);
            just_created(s, &self.relationship_name, StructuralType::RELATIONSHIP);
        }
        vec![
            CreateNode::new(true).into(),
            Label::new(StructuralType::RELATIONSHIP).into(),
            OptionalProperties.into(),
            CreatePathElement::new(true).into(),
        ]
    }

    fn template(&self) -> Option<Cow<'_, str>> {
        let name = &self.relationship_name;
        Some(match self.direction {
            Direction::Left => Cow::Owned(format!("%s<-[{name}%s%s]-%s")),
            Direction::Right => Cow::Owned(format!("%s-[{name}%s%s]->%s")),
            _ => Cow::Borrowed("%s"),
        })
    }

    fn no_strategy_reduce(&self, this: &Capturer) -> Option<Clause> {
        this.children().last().cloned().map(Clause::captured)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CreateNode {
    /// Only nodes within a relationship may be existing ones.
    pub in_relationship: bool,
}

impl CreateNode {
    pub fn new(in_relationship: bool) -> Self {
        Self { in_relationship }
    }
}

impl Production for CreateNode {
    fn generate(&mut self, seed: &mut Seed, _: &mut Schema, _: &Implementation) -> Vec<Clause> {
        if !self.in_relationship || seed.random_boolean() {
            vec![CreateNewNode::default().into()]
        } else {
            vec![CreateExistingNode::default().into()]
        }
    }
}

/// `(name:Labels {props})`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CreateNewNode {
    name: String,
}

impl Production for CreateNewNode {
    fn generate(&mut self, seed: &mut Seed, s: &mut Schema, _: &Implementation) -> Vec<Clause> {
        if seed.random_boolean() {
            self.name = generate_unique_name(seed, s);
            just_created(s, &self.name, StructuralType::NODE);
        }
        vec![Labels::new(StructuralType::NODE).into(), OptionalProperties.into()]
    }

    fn template(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Owned(format!("({}%s%s)", self.name)))
    }
}

/// `(name)` for a node that is bound and most likely not null.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CreateExistingNode {
    name: String,
}

impl Production for CreateExistingNode {
    fn generate(&mut self, seed: &mut Seed, s: &mut Schema, _: &Implementation) -> Vec<Clause> {
        let available: Vec<&StructuralVariable> = s
            .structural_variables_of(StructuralType::NODE)
            .iter()
            .chain(
                s.just_created_structural_variables
                    .iter()
                    .filter(|v| v.ty == StructuralType::NODE),
            )
            .collect();
        if !available.is_empty() {
            let target = seed.random_choice(&available);
            if !target.likely_null {
                self.name = target.name.clone();
                return Vec::new();
            }
        }
        vec![CreateNode::default().into()]
    }

    fn template(&self) -> Option<Cow<'_, str>> {
        (!self.name.is_empty()).then(|| Cow::Owned(format!("({})", self.name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::generate_statement;

    #[test]
    fn created_variables_are_bound_after_the_clause() {
        for rng_seed in 0..30 {
            let mut s = Schema::new();
            let rendered = generate_statement(
                &mut Seed::from_rng_seed(rng_seed),
                &mut s,
                CreateClause.into(),
                &Implementation::opencypher(),
                0,
            )
            .unwrap();
            assert!(rendered.starts_with("CREATE ("), "{rendered}");
            assert!(s.just_created_structural_variables.is_empty());
            for name in s.structural_variables_by_name.keys() {
                assert!(rendered.contains(name.as_str()), "{name} missing from {rendered}");
            }
        }
    }

    #[test]
    fn exhausted_seed_creates_a_single_node() {
        let mut s = Schema::new();
        let rendered = generate_statement(
            &mut Seed::replay(Vec::new()),
            &mut s,
            CreateClause.into(),
            &Implementation::opencypher(),
            0,
        )
        .unwrap();
        // Path "a", node "a_1" and a new label "a".
        assert!(rendered.starts_with("CREATE a = (a_1:a"), "{rendered}");
        assert_eq!(s.structural_variables_of(StructuralType::NODE).len(), 1);
        assert_eq!(s.structural_variables_of(StructuralType::PATH).len(), 1);
    }
}
