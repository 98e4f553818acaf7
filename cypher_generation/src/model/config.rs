use indexmap::IndexMap;

use super::types::{Function, PropertyType, StructuralType};

/// Per-target knobs adapting the OpenCypher grammar to what a target accepts.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationConfig {
    /// Targets of SET, DELETE and REMOVE are plain node or relationship
    /// variables instead of arbitrary structural expressions. Implies that
    /// NULL is never a valid target.
    pub only_variables_as_write_target: bool,
    /// Deleted nodes and relationships are never referenced again within the query.
    pub disallow_deleted_write_targets: bool,
    /// `WITH *` is invalid with no variables in scope.
    pub asterisk_needs_targets: bool,
    /// Integer division may be inaccurate, which rules out `x` -> `x/1`.
    pub inaccurate_division: bool,
    pub disallowed_property_types: Vec<PropertyType>,
    pub disallowed_functions: Vec<&'static str>,
    /// Rejects queries such as `MATCH () OPTIONAL MATCH () MATCH () RETURN 0`.
    pub disallow_match_after_optional_match: bool,
    pub additional_property_functions: IndexMap<PropertyType, Vec<Function>>,
    pub additional_structural_functions: IndexMap<StructuralType, Vec<Function>>,
    pub additional_aggregation_functions: IndexMap<PropertyType, Vec<Function>>,
    pub additional_map_functions: Vec<Function>,
}

impl GenerationConfig {
    pub fn with_only_variables_as_write_target(mut self, only_variables: bool) -> Self {
        self.only_variables_as_write_target = only_variables;
        self
    }

    pub fn with_disallow_deleted_write_targets(mut self, disallow: bool) -> Self {
        self.disallow_deleted_write_targets = disallow;
        self
    }

    pub fn with_asterisk_needs_targets(mut self, needs_targets: bool) -> Self {
        self.asterisk_needs_targets = needs_targets;
        self
    }

    pub fn with_inaccurate_division(mut self, inaccurate: bool) -> Self {
        self.inaccurate_division = inaccurate;
        self
    }

    pub fn with_disallowed_property_types(mut self, types: Vec<PropertyType>) -> Self {
        self.disallowed_property_types = types;
        self
    }

    pub fn with_disallowed_functions(mut self, functions: Vec<&'static str>) -> Self {
        self.disallowed_functions = functions;
        self
    }

    pub fn with_disallow_match_after_optional_match(mut self, disallow: bool) -> Self {
        self.disallow_match_after_optional_match = disallow;
        self
    }

    pub fn with_additional_property_functions(
        mut self,
        functions: IndexMap<PropertyType, Vec<Function>>,
    ) -> Self {
        self.additional_property_functions = functions;
        self
    }

    pub fn with_additional_structural_functions(
        mut self,
        functions: IndexMap<StructuralType, Vec<Function>>,
    ) -> Self {
        self.additional_structural_functions = functions;
        self
    }

    pub fn with_additional_aggregation_functions(
        mut self,
        functions: IndexMap<PropertyType, Vec<Function>>,
    ) -> Self {
        self.additional_aggregation_functions = functions;
        self
    }

    pub fn with_additional_map_functions(mut self, functions: Vec<Function>) -> Self {
        self.additional_map_functions = functions;
        self
    }

    pub fn is_property_type_allowed(&self, ty: PropertyType) -> bool {
        !self.disallowed_property_types.contains(&ty)
    }

    pub fn is_function_allowed(&self, name: &str) -> bool {
        !self.disallowed_functions.contains(&name)
    }

    /// Property types generation may pick from.
    pub fn allowed_property_types(&self) -> Vec<PropertyType> {
        PropertyType::GENERATABLE
            .into_iter()
            .filter(|ty| self.is_property_type_allowed(*ty))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disallowed_types_are_filtered() {
        let config = GenerationConfig::default()
            .with_disallowed_property_types(vec![PropertyType::FLOAT, PropertyType::POINT]);
        let allowed = config.allowed_property_types();
        assert_eq!(allowed.len(), PropertyType::GENERATABLE.len() - 2);
        assert!(!allowed.contains(&PropertyType::FLOAT));
        assert!(allowed.contains(&PropertyType::BOOLEAN));
    }
}
