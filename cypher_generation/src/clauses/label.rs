use std::borrow::Cow;

use super::util::generate_name;
use crate::capture::Capturer;
use crate::clause::{Clause, Production};
use crate::implementation::Implementation;
use crate::model::{Schema, StructuralType};
use crate::Seed;

/// One or more `:Label`s, as used when creating nodes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Labels {
    pub ty: StructuralType,
}

impl Labels {
    pub fn new(ty: StructuralType) -> Self {
        Self { ty }
    }
}

impl Production for Labels {
    fn generate(&mut self, seed: &mut Seed, _: &mut Schema, _: &Implementation) -> Vec<Clause> {
        let label = Label::new(self.ty).into();
        if seed.random_boolean() {
            vec![label, Clause::empty()]
        } else {
            vec![label, Labels::new(self.ty).into()]
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Label {
    pub ty: StructuralType,
}

impl Label {
    pub fn new(ty: StructuralType) -> Self {
        Self { ty }
    }
}

impl Production for Label {
    fn generate(&mut self, _: &mut Seed, _: &mut Schema, _: &Implementation) -> Vec<Clause> {
        vec![LabelName::new(self.ty).into()]
    }

    fn template(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Borrowed(":%s"))
    }
}

/// Mostly an existing label, sometimes a new one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabelName {
    pub ty: StructuralType,
}

impl LabelName {
    pub fn new(ty: StructuralType) -> Self {
        Self { ty }
    }
}

impl Production for LabelName {
    fn generate(&mut self, seed: &mut Seed, _: &mut Schema, _: &Implementation) -> Vec<Clause> {
        if seed.boolean_with_probability(0.1) {
            vec![NewLabel::new(self.ty).into()]
        } else {
            vec![ExistingLabel::new(self.ty).into()]
        }
    }
}

/// Invents a label and registers it in the graph state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewLabel {
    pub ty: StructuralType,
    name: String,
}

impl NewLabel {
    pub fn new(ty: StructuralType) -> Self {
        Self {
            ty,
            name: String::new(),
        }
    }
}

impl Production for NewLabel {
    fn generate(&mut self, seed: &mut Seed, s: &mut Schema, _: &Implementation) -> Vec<Clause> {
        self.name = generate_name(seed);
        s.add_label(self.ty, &self.name);
        Vec::new()
    }

    fn template(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Borrowed(&self.name))
    }
}

/// Picks a known label, falling back to a new one if there is none.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExistingLabel {
    pub ty: StructuralType,
    name: String,
}

impl ExistingLabel {
    pub fn new(ty: StructuralType) -> Self {
        Self {
            ty,
            name: String::new(),
        }
    }
}

impl Production for ExistingLabel {
    fn generate(&mut self, seed: &mut Seed, s: &mut Schema, _: &Implementation) -> Vec<Clause> {
        if seed.boolean_with_probability(0.1) {
            self.ty = StructuralType::ANY;
        }
        let labels = s.labels_of(self.ty);
        if labels.is_empty() {
            return vec![NewLabel::new(self.ty).into()];
        }
        self.name = seed.random_choice(&labels).clone();
        Vec::new()
    }

    fn template(&self) -> Option<Cow<'_, str>> {
        (!self.name.is_empty()).then(|| Cow::Borrowed(self.name.as_str()))
    }
}

/// A label expression in a pattern. The new syntax supports negation and
/// `&`/`|` combinations, the old one only conjunctions of node labels and
/// disjunctions of relationship types.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabelMatch {
    pub ty: StructuralType,
    is_base_case: bool,
    operator: &'static str,
    is_negated: bool,
    use_new_syntax: bool,
}

impl LabelMatch {
    pub fn new(ty: StructuralType) -> Self {
        Self {
            ty,
            ..Self::default()
        }
    }
}

impl Production for LabelMatch {
    fn generate(&mut self, seed: &mut Seed, s: &mut Schema, _: &Implementation) -> Vec<Clause> {
        self.use_new_syntax = s.use_new_label_match_type == Some(true) && !s.is_in_subquery;
        if self.use_new_syntax {
            self.is_negated = seed.random_boolean();
        }
        if seed.boolean_with_probability(0.65) {
            self.is_base_case = true;
            if seed.boolean_with_probability(0.9) {
                return vec![ExistingLabel::new(self.ty).into()];
            }
            return vec![NewLabel::new(self.ty).into()];
        }
        if self.use_new_syntax {
            self.operator = *seed.random_choice(&["&", "|"]);
        }
        vec![LabelMatch::new(self.ty).into(), LabelMatch::new(self.ty).into()]
    }

    fn template(&self) -> Option<Cow<'_, str>> {
        let prefix = if self.is_negated { "!" } else { "" };
        let template = if self.is_base_case {
            format!("{prefix}%s")
        } else if !self.use_new_syntax {
            match self.ty {
                StructuralType::RELATIONSHIP => "%s|%s".to_string(),
                _ => "%s:%s".to_string(),
            }
        } else {
            format!("{prefix}(%s{}%s)", self.operator)
        };
        Some(Cow::Owned(template))
    }

    fn no_strategy_reduce(&self, _: &Capturer) -> Option<Clause> {
        Some(NewLabel::new(self.ty).into())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OptionalLabelMatch {
    pub ty: StructuralType,
    generate_match: bool,
}

impl OptionalLabelMatch {
    pub fn new(ty: StructuralType) -> Self {
        Self {
            ty,
            generate_match: false,
        }
    }
}

impl Production for OptionalLabelMatch {
    fn generate(&mut self, seed: &mut Seed, _: &mut Schema, _: &Implementation) -> Vec<Clause> {
        if seed.random_boolean() {
            return Vec::new();
        }
        self.generate_match = true;
        vec![LabelMatch::new(self.ty).into()]
    }

    fn template(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Borrowed(if self.generate_match { ":%s" } else { "" }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::generate_statement;

    fn render(clause: Clause, seed: &mut Seed, s: &mut Schema) -> String {
        generate_statement(seed, s, clause, &Implementation::opencypher(), 0).unwrap()
    }

    #[test]
    fn new_labels_are_registered_under_any() {
        let mut s = Schema::new();
        let name = render(NewLabel::new(StructuralType::RELATIONSHIP).into(), &mut Seed::from_rng_seed(2), &mut s);
        assert_eq!(s.labels_of(StructuralType::RELATIONSHIP), vec![name.clone()]);
        assert_eq!(s.labels_of(StructuralType::ANY), vec![name]);
        assert!(s.labels_of(StructuralType::NODE).is_empty());
    }

    #[test]
    fn existing_label_picks_the_only_label() {
        let mut s = Schema::new();
        s.add_label(StructuralType::NODE, "x");
        for rng_seed in 0..20 {
            let rendered = render(
                ExistingLabel::new(StructuralType::NODE).into(),
                &mut Seed::from_rng_seed(rng_seed),
                &mut s.clone(),
            );
            assert_eq!(rendered, "x");
        }
    }

    #[test]
    fn old_syntax_never_negates() {
        for rng_seed in 0..50 {
            let mut s = Schema::new();
            s.use_new_label_match_type = Some(false);
            let rendered = render(
                LabelMatch::new(StructuralType::RELATIONSHIP).into(),
                &mut Seed::from_rng_seed(rng_seed),
                &mut s,
            );
            assert!(!rendered.contains('!') && !rendered.contains('&'), "{rendered}");
        }
    }
}
