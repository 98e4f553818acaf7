use std::borrow::Cow;

use super::util::{
    add_variable_to_schema, captured_children, generate_expression_conf, generate_unique_name,
    has_variables, optional_clause,
};
use super::{Expression, OptionalLimit, OptionalOrderBy, OptionalSkip, ReadClause};
use crate::capture::Capturer;
use crate::clause::{Clause, Production};
use crate::implementation::Implementation;
use crate::model::{ExpressionConfig, Schema};
use crate::Seed;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct With {
    /// No ORDER BY, SKIP or LIMIT.
    pub simple_with_clause: bool,
}

impl With {
    pub fn new(simple_with_clause: bool) -> Self {
        Self { simple_with_clause }
    }
}

impl Production for With {
    fn generate(&mut self, _: &mut Seed, _: &mut Schema, _: &Implementation) -> Vec<Clause> {
        if self.simple_with_clause {
            return vec![WithClause::default().into(), ReadClause::default().into()];
        }
        vec![
            WithClause::default().into(),
            OptionalOrderBy::default().into(),
            OptionalSkip::default().into(),
            OptionalLimit::default().into(),
            ReadClause::default().into(),
        ]
    }

    fn template(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Borrowed(if self.simple_with_clause {
            "%s %s"
        } else {
            "%s %s %s %s %s"
        }))
    }

    fn no_strategy_reduce(&self, this: &Capturer) -> Option<Clause> {
        this.children().last().cloned().map(Clause::captured)
    }
}

/// `WITH [DISTINCT] *` or a list of projections, which then form the only
/// variables in scope.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WithClause {
    pub is_include_all: bool,
}

impl Production for WithClause {
    fn generate(&mut self, seed: &mut Seed, s: &mut Schema, imp: &Implementation) -> Vec<Clause> {
        s.projected_variables.clear();
        self.is_include_all = seed.random_boolean();
        if imp.config().asterisk_needs_targets && !has_variables(s) {
            self.is_include_all = false;
        }
        let distinct = optional_clause(seed, Clause::stringer("DISTINCT"));
        if self.is_include_all {
            vec![distinct, Clause::stringer("*")]
        } else {
            vec![distinct, WithElementChain::default().into()]
        }
    }

    fn template(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Borrowed("WITH %s %s"))
    }

    fn modify_schema(&mut self, s: &mut Schema) {
        if self.is_include_all {
            return;
        }
        let projected = std::mem::take(&mut s.projected_variables);
        s.reset_context();
        for (name, conf) in projected {
            add_variable_to_schema(s, &name, conf);
        }
    }

    fn is_transformer(&self) -> bool {
        true
    }

    /// Projects one more column. Nothing after the clause knows about it.
    fn transform(
        &self,
        seed: &mut Seed,
        s: &mut Schema,
        children: &[Capturer],
        imp: &Implementation,
    ) -> Option<Clause> {
        let name = generate_unique_name(seed, s);
        let mut children = captured_children(children);
        children.push(WithElement::new(name, generate_expression_conf(seed, imp.config())).into());
        Some(Clause::assembler("WITH %s %s, %s", children))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WithElementChain {
    is_base_case: bool,
    projection: Option<(String, ExpressionConfig)>,
}

impl Production for WithElementChain {
    fn generate(&mut self, seed: &mut Seed, s: &mut Schema, imp: &Implementation) -> Vec<Clause> {
        self.is_base_case = seed.random_boolean();

        let mut conf = generate_expression_conf(seed, imp.config());
        conf.can_contain_aggregating_functions = true;
        let name = generate_unique_name(seed, s);
        self.projection = Some((name.clone(), conf));

        let mut children = vec![WithElement::new(name, conf).into()];
        if !self.is_base_case {
            children.push(WithElementChain::default().into());
        }
        children
    }

    fn template(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Borrowed(if self.is_base_case { "%s" } else { "%s, %s" }))
    }

    /// Projections only come into scope once the whole WITH is generated.
    fn modify_schema(&mut self, s: &mut Schema) {
        if let Some(projection) = self.projection.clone() {
            s.projected_variables.push(projection);
        }
    }

    fn no_strategy_reduce(&self, this: &Capturer) -> Option<Clause> {
        this.children().first().cloned().map(Clause::captured)
    }
}

/// `expression AS name`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WithElement {
    pub name: String,
    pub conf: ExpressionConfig,
}

impl WithElement {
    pub fn new(name: String, conf: ExpressionConfig) -> Self {
        Self { name, conf }
    }
}

impl Production for WithElement {
    fn generate(&mut self, _: &mut Seed, _: &mut Schema, _: &Implementation) -> Vec<Clause> {
        vec![Expression::new(self.conf).into()]
    }

    fn template(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Owned(format!("%s AS {}", self.name)))
    }
}
