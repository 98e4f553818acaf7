//! The typed generation context.
//!
//! A [Schema] approximates the database state (labels and properties in use)
//! and holds the lexical scope of the clause being generated (variables, flags
//! constraining what may follow). The abstract graph state is shared between a
//! scope and the nested scopes derived from it with [Schema::new_context] and
//! [Schema::new_sub_context]. The set of used identifiers is shared by every
//! schema of one statement, including copies, so names stay globally unique.

use std::cell::{Ref, RefCell, RefMut};
use std::rc::Rc;

use indexmap::{IndexMap, IndexSet};

use super::types::{PropertyType, StructuralType, LIST_MASK, NON_NULL_MASK};

/// A property of a node or relationship.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Property {
    pub name: String,
    pub ty: PropertyType,
    /// A literal value known to be stored under this property, if any.
    pub value: String,
}

/// A variable evaluating to a property value (integers, strings, lists, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyVariable {
    pub name: String,
    pub ty: PropertyType,
    pub value: String,
}

/// A variable evaluating to a node, relationship or path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructuralVariable {
    pub name: String,
    pub ty: StructuralType,
    /// If unset, the variable is guaranteed to be non-null.
    pub likely_null: bool,
}

/// Labels and properties known to exist in the graph.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GraphState {
    pub properties: IndexMap<PropertyType, Vec<Property>>,
    pub property_type_by_name: IndexMap<String, PropertyType>,
    pub labels: IndexMap<StructuralType, Vec<String>>,
}

#[derive(Debug)]
pub struct Schema {
    graph: Rc<RefCell<GraphState>>,
    used_names: Rc<RefCell<IndexSet<String>>>,

    /// Set once the statement contains an OPTIONAL MATCH.
    pub has_optional_match: bool,
    pub is_in_subquery: bool,
    pub disallow_write_clauses: bool,
    pub cannot_return: bool,
    /// Every clause uses one label expression syntax. `None` until a clause decides.
    pub use_new_label_match_type: Option<bool>,
    /// Whether the unions of the current query are `UNION ALL`. `None` until decided.
    pub is_union_all: Option<bool>,
    /// Expressions may neither evaluate to null nor contain subquery expressions.
    pub is_in_merge_clause: bool,
    pub disallow_aggregate_functions: bool,
    /// `RETURN *` is never generated.
    pub disallow_return_all: bool,

    pub deleted_vars: IndexSet<String>,

    /// The statement has to terminate with a RETURN of the variables to return.
    pub must_return: bool,
    pub property_variables_to_return: Vec<PropertyVariable>,
    pub structural_variables_to_return: Vec<StructuralVariable>,

    pub property_variables_by_name: IndexMap<String, PropertyVariable>,
    pub property_variables_by_type: IndexMap<PropertyType, Vec<PropertyVariable>>,
    pub structural_variables_by_name: IndexMap<String, StructuralVariable>,
    pub structural_variables_by_type: IndexMap<StructuralType, Vec<StructuralVariable>>,

    /// Created by the CREATE clause being generated, not yet usable by its siblings.
    pub just_created_structural_variables: Vec<StructuralVariable>,
    /// Variables projected by the WITH clause being generated.
    pub projected_variables: Vec<(String, super::types::ExpressionConfig)>,

    pub indexes: Vec<String>,
}

impl Default for Schema {
    fn default() -> Self {
        Self::new()
    }
}

impl Schema {
    /// A fresh schema with an empty graph state and a fresh used-names set.
    pub fn new() -> Self {
        Self {
            graph: Rc::default(),
            used_names: Rc::default(),
            has_optional_match: false,
            is_in_subquery: false,
            disallow_write_clauses: false,
            cannot_return: false,
            use_new_label_match_type: None,
            is_union_all: None,
            is_in_merge_clause: false,
            disallow_aggregate_functions: false,
            disallow_return_all: false,
            deleted_vars: IndexSet::new(),
            must_return: false,
            property_variables_to_return: Vec::new(),
            structural_variables_to_return: Vec::new(),
            property_variables_by_name: IndexMap::new(),
            property_variables_by_type: IndexMap::new(),
            structural_variables_by_name: IndexMap::new(),
            structural_variables_by_type: IndexMap::new(),
            just_created_structural_variables: Vec::new(),
            projected_variables: Vec::new(),
            indexes: Vec::new(),
        }
    }

    /// Resets to the initial state. Only used at the very start of a query.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// A deep copy that still shares the used-names set.
    pub fn copy(&self) -> Self {
        Self {
            graph: Rc::new(RefCell::new(self.graph.borrow().clone())),
            used_names: Rc::clone(&self.used_names),
            has_optional_match: self.has_optional_match,
            is_in_subquery: self.is_in_subquery,
            disallow_write_clauses: self.disallow_write_clauses,
            cannot_return: self.cannot_return,
            use_new_label_match_type: self.use_new_label_match_type,
            is_union_all: self.is_union_all,
            is_in_merge_clause: self.is_in_merge_clause,
            disallow_aggregate_functions: self.disallow_aggregate_functions,
            disallow_return_all: self.disallow_return_all,
            deleted_vars: self.deleted_vars.clone(),
            must_return: self.must_return,
            property_variables_to_return: self.property_variables_to_return.clone(),
            structural_variables_to_return: self.structural_variables_to_return.clone(),
            property_variables_by_name: self.property_variables_by_name.clone(),
            property_variables_by_type: self.property_variables_by_type.clone(),
            structural_variables_by_name: self.structural_variables_by_name.clone(),
            structural_variables_by_type: self.structural_variables_by_type.clone(),
            just_created_structural_variables: self.just_created_structural_variables.clone(),
            projected_variables: self.projected_variables.clone(),
            indexes: self.indexes.clone(),
        }
    }

    /// Fresh lexical scope on top of the same graph state and used names.
    /// Entered by CALL subqueries, FOREACH and UNION.
    pub fn new_context(&self) -> Self {
        Self {
            graph: Rc::clone(&self.graph),
            used_names: Rc::clone(&self.used_names),
            disallow_write_clauses: self.disallow_write_clauses,
            use_new_label_match_type: self.use_new_label_match_type,
            is_in_subquery: self.is_in_subquery,
            is_in_merge_clause: self.is_in_merge_clause,
            disallow_aggregate_functions: self.disallow_aggregate_functions,
            disallow_return_all: self.disallow_return_all,
            ..Self::new()
        }
    }

    /// Nested scope keeping the variables in scope but none of the write-scope flags.
    pub fn new_sub_context(&self) -> Self {
        Self {
            deleted_vars: self.deleted_vars.clone(),
            property_variables_by_name: self.property_variables_by_name.clone(),
            property_variables_by_type: self.property_variables_by_type.clone(),
            structural_variables_by_name: self.structural_variables_by_name.clone(),
            structural_variables_by_type: self.structural_variables_by_type.clone(),
            ..self.new_context_without_write_flag()
        }
    }

    fn new_context_without_write_flag(&self) -> Self {
        Self {
            disallow_write_clauses: false,
            ..self.new_context()
        }
    }

    /// Clears the variables in scope, as a projection does.
    pub fn reset_context(&mut self) {
        self.has_optional_match = false;
        self.property_variables_by_name.clear();
        self.property_variables_by_type.clear();
        self.deleted_vars.clear();
        self.structural_variables_by_name.clear();
        self.structural_variables_by_type.clear();
    }

    /// Returns to a scope saved earlier, keeping the current graph state.
    pub fn restore_scope(&mut self, saved: Schema) {
        let graph = Rc::clone(&self.graph);
        *self = saved;
        self.graph = graph;
    }

    /// Whether both schemas share the same graph state.
    pub fn shares_graph_with(&self, other: &Schema) -> bool {
        Rc::ptr_eq(&self.graph, &other.graph)
    }

    pub fn shares_used_names_with(&self, other: &Schema) -> bool {
        Rc::ptr_eq(&self.used_names, &other.used_names)
    }

    pub fn graph(&self) -> Ref<'_, GraphState> {
        self.graph.borrow()
    }

    pub fn graph_mut(&self) -> RefMut<'_, GraphState> {
        self.graph.borrow_mut()
    }

    pub fn is_name_used(&self, name: &str) -> bool {
        self.used_names.borrow().contains(name)
    }

    /// Marks `name` as used. Returns false if it already was.
    pub fn use_name(&self, name: &str) -> bool {
        self.used_names.borrow_mut().insert(name.to_string())
    }

    pub fn used_names_len(&self) -> usize {
        self.used_names.borrow().len()
    }

    /// Inserts a property variable under its exact type and every supertype it
    /// can be looked up by: the any-type of the same list shape and, for
    /// non-null types, the nullable variants.
    pub fn add_property_variable(&mut self, variable: PropertyVariable) {
        let list_mask = variable.ty.bits() & LIST_MASK;
        let any = PropertyType::ANY.with_mask(list_mask);

        if variable.ty != any {
            self.property_variables_by_type
                .entry(any)
                .or_default()
                .push(variable.clone());
        }
        self.property_variables_by_type
            .entry(variable.ty)
            .or_default()
            .push(variable.clone());

        if variable.ty.is_non_null() {
            let nullable = variable.ty.without_mask(NON_NULL_MASK);
            self.property_variables_by_type
                .entry(nullable)
                .or_default()
                .push(variable.clone());
            if nullable != any {
                self.property_variables_by_type
                    .entry(any.with_mask(NON_NULL_MASK))
                    .or_default()
                    .push(variable.clone());
            }
        }
        tracing::trace!(name = %variable.name, ty = ?variable.ty, "added property variable");

        self.property_variables_by_name
            .insert(variable.name.clone(), variable);
    }

    /// Structural counterpart of [Schema::add_property_variable].
    pub fn add_structural_variable(&mut self, variable: StructuralVariable) {
        let list_mask = variable.ty.bits() & LIST_MASK;
        let any = StructuralType::ANY.with_mask(list_mask);

        if variable.ty != any {
            self.structural_variables_by_type
                .entry(any)
                .or_default()
                .push(variable.clone());
        }
        self.structural_variables_by_type
            .entry(variable.ty)
            .or_default()
            .push(variable.clone());

        if variable.ty.bits() & NON_NULL_MASK != 0 {
            let nullable = variable.ty.without_mask(NON_NULL_MASK);
            self.structural_variables_by_type
                .entry(nullable)
                .or_default()
                .push(variable.clone());
            if nullable != any {
                self.structural_variables_by_type
                    .entry(any.with_mask(NON_NULL_MASK))
                    .or_default()
                    .push(variable.clone());
            }
        }
        tracing::trace!(name = %variable.name, ty = ?variable.ty, "added structural variable");

        self.structural_variables_by_name
            .insert(variable.name.clone(), variable);
    }

    pub fn property_variables_of(&self, ty: PropertyType) -> &[PropertyVariable] {
        self.property_variables_by_type
            .get(&ty)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn structural_variables_of(&self, ty: StructuralType) -> &[StructuralVariable] {
        self.structural_variables_by_type
            .get(&ty)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Adds a property to the graph state. A name seen with two different
    /// types degrades to the any-type.
    pub fn add_property(&self, property: Property) {
        let mut graph = self.graph.borrow_mut();
        match graph.property_type_by_name.get(&property.name).copied() {
            Some(existing) if existing != property.ty => {
                graph
                    .property_type_by_name
                    .insert(property.name.clone(), PropertyType::ANY);
            }
            Some(_) => {}
            None => {
                graph
                    .property_type_by_name
                    .insert(property.name.clone(), property.ty);
            }
        }

        if property.ty != PropertyType::ANY {
            graph
                .properties
                .entry(property.ty)
                .or_default()
                .push(property.clone());
        }
        graph
            .properties
            .entry(PropertyType::ANY)
            .or_default()
            .push(property);
    }

    pub fn properties_of(&self, ty: PropertyType) -> Vec<Property> {
        self.graph
            .borrow()
            .properties
            .get(&ty)
            .cloned()
            .unwrap_or_default()
    }

    pub fn property_type_of(&self, name: &str) -> Option<PropertyType> {
        self.graph.borrow().property_type_by_name.get(name).copied()
    }

    /// Registers a label under its structural type and under the any-type.
    pub fn add_label(&self, ty: StructuralType, name: &str) {
        let mut graph = self.graph.borrow_mut();
        if ty != StructuralType::ANY {
            graph.labels.entry(ty).or_default().push(name.to_string());
        }
        graph
            .labels
            .entry(StructuralType::ANY)
            .or_default()
            .push(name.to_string());
    }

    pub fn labels_of(&self, ty: StructuralType) -> Vec<String> {
        self.graph
            .borrow()
            .labels
            .get(&ty)
            .cloned()
            .unwrap_or_default()
    }
}

/// Copies share the used-names set but nothing else.
impl Clone for Schema {
    fn clone(&self) -> Self {
        self.copy()
    }
}

/// Compares by value, including the contents of the shared parts.
impl PartialEq for Schema {
    fn eq(&self, other: &Self) -> bool {
        *self.graph.borrow() == *other.graph.borrow()
            && *self.used_names.borrow() == *other.used_names.borrow()
            && self.has_optional_match == other.has_optional_match
            && self.is_in_subquery == other.is_in_subquery
            && self.disallow_write_clauses == other.disallow_write_clauses
            && self.cannot_return == other.cannot_return
            && self.use_new_label_match_type == other.use_new_label_match_type
            && self.is_union_all == other.is_union_all
            && self.is_in_merge_clause == other.is_in_merge_clause
            && self.disallow_aggregate_functions == other.disallow_aggregate_functions
            && self.disallow_return_all == other.disallow_return_all
            && self.deleted_vars == other.deleted_vars
            && self.must_return == other.must_return
            && self.property_variables_to_return == other.property_variables_to_return
            && self.structural_variables_to_return == other.structural_variables_to_return
            && self.property_variables_by_name == other.property_variables_by_name
            && self.property_variables_by_type == other.property_variables_by_type
            && self.structural_variables_by_name == other.structural_variables_by_name
            && self.structural_variables_by_type == other.structural_variables_by_type
            && self.just_created_structural_variables == other.just_created_structural_variables
            && self.projected_variables == other.projected_variables
            && self.indexes == other.indexes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(name: &str) -> StructuralVariable {
        StructuralVariable {
            name: name.to_string(),
            ty: StructuralType::NODE,
            likely_null: false,
        }
    }

    #[test]
    fn property_variable_fan_out() {
        let mut s = Schema::new();
        let ty = PropertyType::INTEGER.with_mask(NON_NULL_MASK);
        s.add_property_variable(PropertyVariable {
            name: "a".into(),
            ty,
            value: String::new(),
        });

        assert_eq!(s.property_variables_of(ty).len(), 1);
        assert_eq!(s.property_variables_of(PropertyType::INTEGER).len(), 1);
        assert_eq!(s.property_variables_of(PropertyType::ANY).len(), 1);
        assert_eq!(
            s.property_variables_of(PropertyType::ANY.with_mask(NON_NULL_MASK))
                .len(),
            1
        );
        assert!(s
            .property_variables_of(PropertyType::ANY.with_mask(LIST_MASK))
            .is_empty());
        assert!(s.property_variables_by_name.contains_key("a"));
    }

    #[test]
    fn list_variables_stay_in_list_buckets() {
        let mut s = Schema::new();
        s.add_property_variable(PropertyVariable {
            name: "l".into(),
            ty: PropertyType::STRING.with_mask(LIST_MASK),
            value: String::new(),
        });
        assert!(s.property_variables_of(PropertyType::ANY).is_empty());
        assert_eq!(
            s.property_variables_of(PropertyType::ANY.with_mask(LIST_MASK))
                .len(),
            1
        );
    }

    #[test]
    fn structural_variable_fan_out() {
        let mut s = Schema::new();
        s.add_structural_variable(node("n"));
        assert_eq!(s.structural_variables_of(StructuralType::NODE).len(), 1);
        assert_eq!(s.structural_variables_of(StructuralType::ANY).len(), 1);
        assert!(s
            .structural_variables_of(StructuralType::RELATIONSHIP)
            .is_empty());
    }

    #[test]
    fn property_type_widens_to_any() {
        let s = Schema::new();
        s.add_property(Property {
            name: "p".into(),
            ty: PropertyType::INTEGER,
            value: String::new(),
        });
        assert_eq!(s.property_type_of("p"), Some(PropertyType::INTEGER));
        s.add_property(Property {
            name: "p".into(),
            ty: PropertyType::STRING,
            value: String::new(),
        });
        assert_eq!(s.property_type_of("p"), Some(PropertyType::ANY));
        assert_eq!(s.properties_of(PropertyType::ANY).len(), 2);
        assert_eq!(s.properties_of(PropertyType::INTEGER).len(), 1);
    }

    #[test]
    fn copy_is_independent_but_shares_names() {
        let mut s = Schema::new();
        s.add_label(StructuralType::NODE, "L");
        s.add_structural_variable(node("n"));
        s.use_name("n");

        let copy = s.copy();
        assert_eq!(copy, s);
        assert!(!copy.shares_graph_with(&s));
        assert!(copy.shares_used_names_with(&s));

        s.add_label(StructuralType::NODE, "M");
        s.add_structural_variable(node("m"));
        assert_eq!(copy.labels_of(StructuralType::NODE), vec!["L".to_string()]);
        assert!(!copy.structural_variables_by_name.contains_key("m"));

        s.use_name("x");
        assert!(copy.is_name_used("x"));
    }

    #[test]
    fn new_context_shares_graph_and_drops_scope() {
        let mut s = Schema::new();
        s.disallow_write_clauses = true;
        s.must_return = true;
        s.add_structural_variable(node("n"));

        let inner = s.new_context();
        assert!(inner.shares_graph_with(&s));
        assert!(inner.shares_used_names_with(&s));
        assert!(inner.disallow_write_clauses);
        assert!(!inner.must_return);
        assert!(inner.structural_variables_by_name.is_empty());

        inner.add_label(StructuralType::RELATIONSHIP, "R");
        assert_eq!(s.labels_of(StructuralType::ANY), vec!["R".to_string()]);
    }

    #[test]
    fn new_sub_context_keeps_variables() {
        let mut s = Schema::new();
        s.disallow_write_clauses = true;
        s.add_structural_variable(node("n"));
        s.deleted_vars.insert("n".into());

        let mut inner = s.new_sub_context();
        assert!(inner.shares_graph_with(&s));
        assert!(!inner.disallow_write_clauses);
        assert!(inner.structural_variables_by_name.contains_key("n"));
        assert!(inner.deleted_vars.contains("n"));

        inner.add_structural_variable(node("m"));
        assert!(!s.structural_variables_by_name.contains_key("m"));
    }

    #[test]
    fn reset_context_clears_scope() {
        let mut s = Schema::new();
        s.has_optional_match = true;
        s.add_structural_variable(node("n"));
        s.deleted_vars.insert("n".into());
        s.reset_context();
        assert!(!s.has_optional_match);
        assert!(s.structural_variables_by_type.is_empty());
        assert!(s.deleted_vars.is_empty());
    }

    #[test]
    fn restore_scope_keeps_graph() {
        let mut s = Schema::new();
        let saved = s.copy();
        s.add_structural_variable(node("it"));
        s.add_label(StructuralType::NODE, "L");
        s.restore_scope(saved);
        assert!(s.structural_variables_by_name.is_empty());
        assert_eq!(s.labels_of(StructuralType::NODE), vec!["L".to_string()]);
    }
}
