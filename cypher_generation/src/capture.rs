//! Memoizing clause wrapper.
//!
//! A [Capturer] generates the clause it wraps once and from then on reproduces
//! the exact same children and schema effects, without consuming seed bytes.
//! This makes generation repeatable and lets strategies swap out single nodes
//! of a generated statement while every other node renders unchanged.

use std::borrow::Cow;

use crate::clause::template::concat_template;
use crate::clause::{Clause, Production};
use crate::implementation::Implementation;
use crate::model::Schema;
use crate::Seed;

#[derive(Debug, Clone, PartialEq)]
pub struct Capturer {
    generated: bool,
    /// The clause was replaced through [Capturer::update_clause] and gets
    /// generated again with the schema captured the first time.
    regenerated: bool,
    /// The schema right before the clause was first generated.
    captured_schema: Option<Schema>,
    /// The schema after the clause modified it.
    modified_schema: Option<Schema>,
    clause: Clause,
    children: Vec<Capturer>,
}

impl Capturer {
    /// Captures `clause`. A clause that is already captured is returned as is.
    pub fn new(clause: impl Into<Clause>) -> Self {
        match clause.into() {
            Clause::Captured(capturer) => *capturer,
            clause => Self {
                generated: false,
                regenerated: false,
                captured_schema: None,
                modified_schema: None,
                clause,
                children: Vec::new(),
            },
        }
    }

    pub fn clause(&self) -> &Clause {
        &self.clause
    }

    /// Children captured during generation. Empty until generated.
    pub fn children(&self) -> &[Capturer] {
        &self.children
    }

    pub fn children_mut(&mut self) -> &mut [Capturer] {
        &mut self.children
    }

    /// The schema the clause was originally generated with. Present once
    /// generated, and kept across [Capturer::update_clause].
    pub fn captured_schema(&self) -> Option<&Schema> {
        self.captured_schema.as_ref()
    }

    pub fn is_generated(&self) -> bool {
        self.generated
    }

    /// Nodes in the captured tree, this one included.
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(Capturer::node_count).sum::<usize>()
    }

    /// Replaces the wrapped clause, keeping the schema captured at the first
    /// generation for the next one.
    ///
    /// Passing a captured clause replaces this whole capturer with it.
    pub fn update_clause(&mut self, clause: Clause) {
        match clause {
            Clause::Captured(capturer) => *self = *capturer,
            clause => {
                tracing::trace!(from = %self.clause.kind(), to = %clause.kind(), "updating captured clause");
                self.generated = false;
                self.regenerated = true;
                self.children.clear();
                self.clause = clause;
            }
        }
    }

    /// Replaces the wrapped clause and forgets everything captured, so the
    /// next generation behaves like the first one.
    pub fn renew_clause(&mut self, clause: Clause) {
        self.generated = false;
        self.regenerated = false;
        self.captured_schema = None;
        self.modified_schema = None;
        self.children.clear();
        self.clause = clause;
    }

    /// Generates the children of the wrapped clause, or restores the captured
    /// schema if that already happened.
    pub fn generate(&mut self, seed: &mut Seed, s: &mut Schema, imp: &Implementation) {
        if self.generated {
            debug_assert!(
                self.modified_schema.is_some(),
                "generated capturer of {} lost its captured schema",
                self.clause.kind()
            );
            if let Some(captured) = &self.captured_schema {
                *s = captured.clone();
            }
            return;
        }

        match (&self.captured_schema, self.regenerated) {
            (Some(captured), true) => *s = captured.clone(),
            _ => self.captured_schema = Some(s.clone()),
        }

        let clause = std::mem::replace(&mut self.clause, Clause::empty());
        self.clause = imp.adapt(clause, seed, s);

        tracing::trace!(clause = %self.clause.kind(), regenerated = self.regenerated, "capturer generating");
        self.children = self
            .clause
            .generate(seed, s, imp)
            .into_iter()
            .map(Capturer::new)
            .collect();
    }

    pub fn template_string(&self) -> String {
        match self.clause.template() {
            Some(template) => template.into_owned(),
            None => concat_template(self.children.len()),
        }
    }

    /// Applies the wrapped clause's schema modification the first time,
    /// restores its result on every later call.
    pub fn modify_schema(&mut self, s: &mut Schema) {
        if self.generated {
            if let Some(modified) = &self.modified_schema {
                *s = modified.clone();
            }
        } else {
            self.clause.modify_schema(s);
            self.modified_schema = Some(s.clone());
        }
        self.generated = true;
    }

    /// Generates the whole subtree up front, independent of any rendering.
    pub fn generate_ast(&mut self, seed: &mut Seed, s: &mut Schema, imp: &Implementation) {
        self.generate(seed, s, imp);
        for child in &mut self.children {
            child.generate_ast(seed, s, imp);
        }
        self.modify_schema(s);
    }

    /// Asks the wrapped clause for an equivalent replacement. The replacement
    /// sees, and may change, the schema captured at the first generation.
    pub fn transform(&mut self, seed: &mut Seed, imp: &Implementation) -> Option<Clause> {
        let schema = self.captured_schema.as_mut()?;
        self.clause.transform(seed, schema, &self.children, imp)
    }

    pub fn no_strategy_reduce(&self) -> Option<Clause> {
        self.clause.no_strategy_reduce(self)
    }
}

/// Lets captured clauses sit anywhere a plain clause does. Rendering goes
/// through [Capturer::generate] directly; this path hands out copies of the
/// captured children.
impl Production for Capturer {
    fn generate(&mut self, seed: &mut Seed, s: &mut Schema, imp: &Implementation) -> Vec<Clause> {
        Capturer::generate(self, seed, s, imp);
        self.children.iter().cloned().map(Clause::captured).collect()
    }

    fn template(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Owned(self.template_string()))
    }

    fn modify_schema(&mut self, s: &mut Schema) {
        Capturer::modify_schema(self, s)
    }
}
