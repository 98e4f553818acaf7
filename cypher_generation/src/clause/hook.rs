//! A production built from closures, for exercising the renderer and the
//! capturer without going through the grammar.

use std::borrow::Cow;
use std::fmt;
use std::rc::Rc;

use super::{Clause, Production};
use crate::implementation::Implementation;
use crate::model::Schema;
use crate::Seed;

pub type GenerateHook = Rc<dyn Fn(&mut Seed, &mut Schema) -> Vec<Clause>>;
pub type TemplateHook = Rc<dyn Fn() -> String>;
pub type ModifySchemaHook = Rc<dyn Fn(&mut Schema)>;

/// Calls the hooks it was given.
#[derive(Clone, Default)]
pub struct HookClause {
    pub generate: Option<GenerateHook>,
    pub template: Option<TemplateHook>,
    pub modify_schema: Option<ModifySchemaHook>,
}

impl HookClause {
    pub fn with_generate(
        mut self,
        hook: impl Fn(&mut Seed, &mut Schema) -> Vec<Clause> + 'static,
    ) -> Self {
        self.generate = Some(Rc::new(hook));
        self
    }

    pub fn with_template(mut self, hook: impl Fn() -> String + 'static) -> Self {
        self.template = Some(Rc::new(hook));
        self
    }

    pub fn with_modify_schema(mut self, hook: impl Fn(&mut Schema) + 'static) -> Self {
        self.modify_schema = Some(Rc::new(hook));
        self
    }
}

impl fmt::Debug for HookClause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookClause")
            .field("generate", &self.generate.is_some())
            .field("template", &self.template.is_some())
            .field("modify_schema", &self.modify_schema.is_some())
            .finish()
    }
}

/// Hooks compare by identity.
impl PartialEq for HookClause {
    fn eq(&self, other: &Self) -> bool {
        fn same<T: ?Sized>(a: &Option<Rc<T>>, b: &Option<Rc<T>>) -> bool {
            match (a, b) {
                (Some(a), Some(b)) => Rc::ptr_eq(a, b),
                (None, None) => true,
                _ => false,
            }
        }
        same(&self.generate, &other.generate)
            && same(&self.template, &other.template)
            && same(&self.modify_schema, &other.modify_schema)
    }
}

impl Production for HookClause {
    fn generate(&mut self, seed: &mut Seed, s: &mut Schema, _: &Implementation) -> Vec<Clause> {
        match &self.generate {
            Some(hook) => hook(seed, s),
            None => Vec::new(),
        }
    }

    fn template(&self) -> Option<Cow<'_, str>> {
        Some(match &self.template {
            Some(hook) => Cow::Owned(hook()),
            None => Cow::Borrowed(""),
        })
    }

    fn modify_schema(&mut self, s: &mut Schema) {
        if let Some(hook) = &self.modify_schema {
            hook(s);
        }
    }
}
