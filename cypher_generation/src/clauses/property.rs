use std::borrow::Cow;

use super::util::{generate_property_type, generate_unique_name};
use super::Expression;
use crate::capture::Capturer;
use crate::clause::{Clause, Production};
use crate::implementation::Implementation;
use crate::model::{ExpressionConfig, Property, PropertyType, Schema};
use crate::Seed;

/// Value config for a property written in a pattern. MERGE cannot take null properties.
fn property_value_conf(ty: PropertyType, s: &Schema) -> ExpressionConfig {
    let mut conf = ExpressionConfig::property(ty);
    conf.must_be_non_null = s.is_in_merge_clause;
    conf
}

/// `{k: v, ..}` when creating.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Properties;

impl Production for Properties {
    fn generate(&mut self, _: &mut Seed, _: &mut Schema, _: &Implementation) -> Vec<Clause> {
        vec![PropertyChain::new(0.5).into()]
    }

    fn template(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Borrowed("{%s}"))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyChain {
    /// Chance of inventing a property rather than reusing a known one.
    pub new_property_probability: f64,
    is_base_case: bool,
}

impl PropertyChain {
    pub fn new(new_property_probability: f64) -> Self {
        Self {
            new_property_probability,
            is_base_case: false,
        }
    }
}

impl Production for PropertyChain {
    fn generate(&mut self, seed: &mut Seed, _: &mut Schema, _: &Implementation) -> Vec<Clause> {
        self.is_base_case = seed.random_boolean();
        let property = if seed.boolean_with_probability(self.new_property_probability) {
            NewProperty::default().into()
        } else {
            ExistingProperty::default().into()
        };
        if self.is_base_case {
            vec![property]
        } else {
            vec![property, PropertyChain::new(self.new_property_probability).into()]
        }
    }

    fn template(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Borrowed(if self.is_base_case { "%s" } else { "%s, %s" }))
    }

    fn no_strategy_reduce(&self, this: &Capturer) -> Option<Clause> {
        this.children().first().cloned().map(Clause::captured)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OptionalProperties;

impl Production for OptionalProperties {
    fn generate(&mut self, seed: &mut Seed, _: &mut Schema, _: &Implementation) -> Vec<Clause> {
        if seed.random_boolean() {
            vec![Properties.into()]
        } else {
            Vec::new()
        }
    }
}

/// `k: v` for a property the graph did not have yet.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewProperty {
    name: String,
}

impl Production for NewProperty {
    fn generate(&mut self, seed: &mut Seed, s: &mut Schema, imp: &Implementation) -> Vec<Clause> {
        self.name = generate_unique_name(seed, s);
        let ty = generate_property_type(seed, imp.config());
        s.add_property(Property {
            name: self.name.clone(),
            ty,
            value: String::new(),
        });
        vec![Expression::new(property_value_conf(ty, s)).into()]
    }

    fn template(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Owned(format!("{}:%s", self.name)))
    }
}

/// `k: v` for a known property, usually with a value of its type.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExistingProperty {
    name: String,
    value: String,
}

impl Production for ExistingProperty {
    fn generate(&mut self, seed: &mut Seed, s: &mut Schema, _: &Implementation) -> Vec<Clause> {
        let available = s.properties_of(PropertyType::ANY);
        if available.is_empty() {
            return vec![NewProperty::default().into()];
        }
        let property = seed.random_choice(&available).clone();
        self.name = property.name;
        let mut ty = property.ty;
        if seed.random_boolean() {
            ty = PropertyType::ANY;
            s.add_property(Property {
                name: self.name.clone(),
                ty,
                value: String::new(),
            });
        }
        if !property.value.is_empty() && seed.boolean_with_probability(0.75) {
            self.value = property.value;
            return Vec::new();
        }
        vec![Expression::new(property_value_conf(ty, s)).into()]
    }

    fn template(&self) -> Option<Cow<'_, str>> {
        if self.name.is_empty() {
            None
        } else if self.value.is_empty() {
            Some(Cow::Owned(format!("{}:%s", self.name)))
        } else {
            Some(Cow::Owned(format!("{}:{}", self.name, self.value)))
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OptionalPropertyMatch;

impl Production for OptionalPropertyMatch {
    fn generate(&mut self, seed: &mut Seed, _: &mut Schema, _: &Implementation) -> Vec<Clause> {
        if seed.random_boolean() {
            Vec::new()
        } else {
            vec![PropertiesMatch.into()]
        }
    }
}

/// `{k: v, ..}` in a pattern, mostly over known properties.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertiesMatch;

impl Production for PropertiesMatch {
    fn generate(&mut self, _: &mut Seed, _: &mut Schema, _: &Implementation) -> Vec<Clause> {
        vec![PropertyChain::new(0.05).into()]
    }

    fn template(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Borrowed("{%s}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::generate_statement;

    #[test]
    fn new_properties_reach_the_graph() {
        let mut s = Schema::new();
        let rendered = generate_statement(
            &mut Seed::from_rng_seed(17),
            &mut s,
            NewProperty::default().into(),
            &Implementation::opencypher(),
            0,
        )
        .unwrap();
        let name = rendered.split(':').next().unwrap();
        assert!(s.property_type_of(name).is_some());
        assert_eq!(s.properties_of(PropertyType::ANY).len(), 1);
    }

    #[test]
    fn known_values_are_reused() {
        let mut s = Schema::new();
        s.add_property(Property {
            name: "p".into(),
            ty: PropertyType::INTEGER,
            value: "42".into(),
        });
        // Type kept, then the value used.
        let mut seed = Seed::replay(vec![0, 0, 0, 0, 0, 0, 0, 0, 1]);
        let rendered = generate_statement(
            &mut seed,
            &mut s,
            ExistingProperty::default().into(),
            &Implementation::opencypher(),
            0,
        )
        .unwrap();
        assert_eq!(rendered, "p:42");
    }
}
