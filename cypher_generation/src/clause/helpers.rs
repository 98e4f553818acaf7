//! Clauses that simplify composing other clauses.
//!
//! None of them touch the schema or seed on their own, unless the children
//! they are handed do.

use std::borrow::Cow;

use super::template::{concat_template, escape};
use super::{Clause, Production};
use crate::capture::Capturer;
use crate::implementation::Implementation;
use crate::model::Schema;
use crate::Seed;

/// Renders as the empty string.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmptyClause;

impl Production for EmptyClause {
    fn generate(&mut self, _: &mut Seed, _: &mut Schema, _: &Implementation) -> Vec<Clause> {
        Vec::new()
    }
}

/// Renders a fixed string.
#[derive(Debug, Clone, PartialEq)]
pub struct Stringer {
    template: String,
}

impl Stringer {
    pub fn new(value: &str) -> Self {
        Self {
            template: escape(value),
        }
    }
}

impl Production for Stringer {
    fn generate(&mut self, _: &mut Seed, _: &mut Schema, _: &Implementation) -> Vec<Clause> {
        Vec::new()
    }

    fn template(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Borrowed(&self.template))
    }
}

/// Returns the children it was built with and interpolates them into its template.
#[derive(Debug, Clone, PartialEq)]
pub struct Assembler {
    template: String,
    children: Vec<Clause>,
}

impl Assembler {
    pub fn new(template: impl Into<String>, children: Vec<Clause>) -> Self {
        Self {
            template: template.into(),
            children,
        }
    }

    /// An assembler concatenating its children.
    pub fn concat(children: Vec<Clause>) -> Self {
        Self {
            template: concat_template(children.len()),
            children,
        }
    }
}

impl Production for Assembler {
    fn generate(&mut self, _: &mut Seed, _: &mut Schema, _: &Implementation) -> Vec<Clause> {
        self.children.clone()
    }

    fn template(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Borrowed(&self.template))
    }
}

/// A node an equivalence transformation was applied to.
///
/// Both branches are kept so that reduction can flip the node back to its
/// original. Generates the selected branch as its only child.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformedClause {
    pub use_transformed: bool,
    pub original: Box<Capturer>,
    pub transformed: Box<Capturer>,
}

impl TransformedClause {
    pub fn new(original: Capturer, transformed: Capturer) -> Self {
        Self {
            use_transformed: true,
            original: Box::new(original),
            transformed: Box::new(transformed),
        }
    }

    pub fn selected(&self) -> &Capturer {
        if self.use_transformed {
            &self.transformed
        } else {
            &self.original
        }
    }

    /// A copy of this node selecting the original branch.
    pub fn flipped(&self) -> Self {
        Self {
            use_transformed: false,
            ..self.clone()
        }
    }
}

impl Production for TransformedClause {
    fn generate(&mut self, _: &mut Seed, _: &mut Schema, _: &Implementation) -> Vec<Clause> {
        vec![Clause::captured(self.selected().clone())]
    }
}
