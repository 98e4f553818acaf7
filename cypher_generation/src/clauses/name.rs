use std::borrow::Cow;

use super::util::{generate_property_name, generate_structure_name, generate_unique_name};
use crate::clause::{Clause, Production};
use crate::implementation::Implementation;
use crate::model::{Schema, StructuralType};
use crate::Seed;

/// Names a pattern element half of the time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OptionalStructureName {
    pub ty: Option<StructuralType>,
    pub likely_null: bool,
}

impl OptionalStructureName {
    pub fn new(ty: StructuralType, likely_null: bool) -> Self {
        Self {
            ty: Some(ty),
            likely_null,
        }
    }
}

impl Production for OptionalStructureName {
    fn generate(&mut self, seed: &mut Seed, _: &mut Schema, _: &Implementation) -> Vec<Clause> {
        if seed.random_intn(2) == 0 {
            return Vec::new();
        }
        vec![StructureName {
            ty: self.ty,
            likely_null: self.likely_null,
            name: String::new(),
        }
        .into()]
    }
}

/// A variable bound by a pattern. Without a type it is just a fresh name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StructureName {
    pub ty: Option<StructuralType>,
    pub likely_null: bool,
    name: String,
}

impl StructureName {
    pub fn new(ty: StructuralType, likely_null: bool) -> Self {
        Self {
            ty: Some(ty),
            likely_null,
            name: String::new(),
        }
    }
}

impl Production for StructureName {
    fn generate(&mut self, seed: &mut Seed, s: &mut Schema, _: &Implementation) -> Vec<Clause> {
        self.name = match self.ty {
            Some(ty) => generate_structure_name(seed, s, ty, self.likely_null),
            None => generate_unique_name(seed, s),
        };
        Vec::new()
    }

    fn template(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Borrowed(&self.name))
    }
}

/// A property key, either one the graph already has or a fresh one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyName {
    name: String,
}

impl Production for PropertyName {
    fn generate(&mut self, seed: &mut Seed, s: &mut Schema, _: &Implementation) -> Vec<Clause> {
        self.name = generate_property_name(seed, s);
        Vec::new()
    }

    fn template(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Borrowed(&self.name))
    }
}
