//! Function applications and the OpenCypher function tables.

use std::borrow::Cow;

use itertools::Itertools;

use super::util::captured_children;
use super::Expression;
use crate::capture::Capturer;
use crate::clause::{Assembler, Clause, Production};
use crate::implementation::Implementation;
use crate::model::{
    ExpressionConfig, ExpressionType, Function, PropertyType, Schema, StructuralType, LIST_MASK,
};
use crate::Seed;

const ANY: ExpressionConfig = ExpressionConfig::any();
const ANY_LIST: ExpressionConfig = ExpressionConfig::any().list();
const VALUE: ExpressionConfig = ExpressionConfig::property(PropertyType::ANY);
const VALUE_LIST: ExpressionConfig = VALUE.list();
const BOOLEAN: ExpressionConfig = ExpressionConfig::property(PropertyType::BOOLEAN);
const DURATION: ExpressionConfig = ExpressionConfig::property(PropertyType::DURATION);
const FLOAT: ExpressionConfig = ExpressionConfig::property(PropertyType::FLOAT);
const INTEGER: ExpressionConfig = ExpressionConfig::property(PropertyType::INTEGER);
const STRING: ExpressionConfig = ExpressionConfig::property(PropertyType::STRING);
const PERCENTILE: ExpressionConfig = ExpressionConfig::property(PropertyType::PERCENTILE).non_null();
const POSITIVE_INTEGER: ExpressionConfig =
    ExpressionConfig::property(PropertyType::POSITIVE_INTEGER).non_null();
const POSITIVE_INT32: ExpressionConfig =
    ExpressionConfig::property(PropertyType::POSITIVE_INT32).non_null();
const NODE: ExpressionConfig = ExpressionConfig::structural(StructuralType::NODE);
const RELATIONSHIP: ExpressionConfig = ExpressionConfig::structural(StructuralType::RELATIONSHIP);
const PATH: ExpressionConfig = ExpressionConfig::structural(StructuralType::PATH);

static INTEGER_FUNCTIONS: &[Function] = &[
    Function::new("abs", &[INTEGER]),
    Function::new("length", &[PATH]),
    Function::new("sign", &[INTEGER]),
    Function::new("sign", &[FLOAT]),
    Function::new("size", &[ANY_LIST]),
    Function::new("size", &[STRING]),
    Function::nullable("toInteger", &[STRING]),
    Function::new("toInteger", &[INTEGER]),
    Function::new("toInteger", &[FLOAT]),
];

static FLOAT_FUNCTIONS: &[Function] = &[
    Function::new("abs", &[FLOAT]),
    Function::new("acos", &[FLOAT]),
    Function::new("asin", &[FLOAT]),
    Function::new("atan", &[FLOAT]),
    Function::new("atan2", &[FLOAT, FLOAT]),
    Function::new("ceil", &[FLOAT]),
    Function::new("cos", &[FLOAT]),
    Function::new("cot", &[FLOAT]),
    Function::new("degrees", &[FLOAT]),
    Function::new("e", &[]),
    Function::new("exp", &[FLOAT]),
    Function::new("floor", &[FLOAT]),
    Function::new("log", &[FLOAT]),
    Function::new("log10", &[FLOAT]),
    Function::new("pi", &[]),
    Function::new("radians", &[FLOAT]),
    Function::new("round", &[FLOAT]),
    Function::new("sin", &[FLOAT]),
    Function::new("sqrt", &[FLOAT]),
    Function::new("tan", &[FLOAT]),
    Function::nullable("toFloat", &[STRING]),
    Function::new("toFloat", &[INTEGER]),
    Function::new("toFloat", &[FLOAT]),
];

static BOOLEAN_FUNCTIONS: &[Function] = &[
    Function::nullable("toBoolean", &[STRING]),
    Function::new("toBoolean", &[BOOLEAN]),
];

static ANY_FUNCTIONS: &[Function] = &[
    Function::nullable("head", &[VALUE_LIST]),
    Function::nullable("last", &[VALUE_LIST]),
];

static STRING_FUNCTIONS: &[Function] = &[
    Function::new("left", &[STRING, POSITIVE_INTEGER]),
    Function::new("ltrim", &[STRING]),
    Function::new("replace", &[STRING, STRING, STRING]),
    Function::new("reverse", &[STRING]),
    Function::new("right", &[STRING, POSITIVE_INTEGER]),
    Function::new("rtrim", &[STRING]),
    Function::new("substring", &[STRING, POSITIVE_INT32]),
    Function::new("substring", &[STRING, POSITIVE_INT32, POSITIVE_INT32]),
    Function::new("toLower", &[STRING]),
    Function::new("toString", &[VALUE]),
    Function::new("toUpper", &[STRING]),
    Function::new("trim", &[STRING]),
    Function::new("type", &[RELATIONSHIP]),
];

static STRING_LIST_FUNCTIONS: &[Function] = &[
    Function::new("keys", &[NODE]),
    Function::new("keys", &[RELATIONSHIP]),
    Function::new("labels", &[NODE]),
    Function::new("split", &[STRING, STRING]),
];

static ANY_LIST_FUNCTIONS: &[Function] = &[
    Function::new("reverse", &[VALUE_LIST]),
    Function::new("tail", &[VALUE_LIST]),
];

static NODE_FUNCTIONS: &[Function] = &[
    Function::new("endNode", &[RELATIONSHIP]),
    Function::new("startNode", &[RELATIONSHIP]),
];

static NODE_LIST_FUNCTIONS: &[Function] = &[Function::new("nodes", &[PATH])];

static RELATIONSHIP_LIST_FUNCTIONS: &[Function] = &[Function::new("relationships", &[PATH])];

/// Functions returning maps.
static MAP_FUNCTIONS: &[Function] = &[
    Function::new("properties", &[NODE]),
    Function::new("properties", &[RELATIONSHIP]),
];

static COLLECT_FUNCTIONS: &[Function] = &[Function::new("collect", &[ANY])];

static ANY_AGGREGATION_FUNCTIONS: &[Function] =
    &[Function::new("max", &[ANY]), Function::new("min", &[ANY])];

static INTEGER_AGGREGATION_FUNCTIONS: &[Function] = &[
    Function::new("sum", &[INTEGER]),
    Function::new("avg", &[INTEGER]),
    Function::new("percentileDisc", &[INTEGER, PERCENTILE]),
];

static FLOAT_AGGREGATION_FUNCTIONS: &[Function] = &[
    Function::new("sum", &[FLOAT]),
    Function::new("avg", &[FLOAT]),
    Function::new("percentileCont", &[FLOAT, PERCENTILE]),
    Function::new("percentileDisc", &[FLOAT, PERCENTILE]),
    Function::new("stdev", &[FLOAT]),
    Function::new("stdevp", &[FLOAT]),
];

static DURATION_AGGREGATION_FUNCTIONS: &[Function] = &[
    Function::new("sum", &[DURATION]),
    Function::new("avg", &[DURATION]),
];

const STRING_LIST: PropertyType = PropertyType::STRING.with_mask(LIST_MASK);
const ANY_PROPERTY_LIST: PropertyType = PropertyType::ANY.with_mask(LIST_MASK);

/// Built-in functions returning a property of type `ty`.
pub fn property_functions(ty: PropertyType) -> &'static [Function] {
    match ty {
        PropertyType::INTEGER => INTEGER_FUNCTIONS,
        PropertyType::FLOAT => FLOAT_FUNCTIONS,
        PropertyType::BOOLEAN => BOOLEAN_FUNCTIONS,
        PropertyType::ANY => ANY_FUNCTIONS,
        PropertyType::STRING => STRING_FUNCTIONS,
        STRING_LIST => STRING_LIST_FUNCTIONS,
        ANY_PROPERTY_LIST => ANY_LIST_FUNCTIONS,
        _ => &[],
    }
}

/// Built-in functions returning a structural value of type `ty`.
pub fn structural_functions(ty: StructuralType) -> &'static [Function] {
    const NODE_LIST: StructuralType = StructuralType::NODE.with_mask(LIST_MASK);
    const RELATIONSHIP_LIST: StructuralType = StructuralType::RELATIONSHIP.with_mask(LIST_MASK);
    match ty {
        StructuralType::NODE => NODE_FUNCTIONS,
        NODE_LIST => NODE_LIST_FUNCTIONS,
        RELATIONSHIP_LIST => RELATIONSHIP_LIST_FUNCTIONS,
        _ => &[],
    }
}

/// Built-in aggregating functions returning a property of type `ty`.
pub fn aggregation_functions(ty: PropertyType) -> &'static [Function] {
    match ty {
        ANY_PROPERTY_LIST => COLLECT_FUNCTIONS,
        PropertyType::ANY => ANY_AGGREGATION_FUNCTIONS,
        PropertyType::INTEGER => INTEGER_AGGREGATION_FUNCTIONS,
        PropertyType::FLOAT => FLOAT_AGGREGATION_FUNCTIONS,
        PropertyType::DURATION => DURATION_AGGREGATION_FUNCTIONS,
        _ => &[],
    }
}

/// Calls one of the built-in functions or one of the target's additional
/// functions. Functions the target disallows are never called.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FunctionApplicationExpression {
    pub conf: ExpressionConfig,
    target: Option<Function>,
}

impl FunctionApplicationExpression {
    pub fn new(conf: ExpressionConfig) -> Self {
        Self { conf, target: None }
    }

    /// The function called, once generated.
    pub fn function(&self) -> Option<&Function> {
        self.target.as_ref()
    }

    fn fall_back(&mut self) -> Vec<Clause> {
        self.target = None;
        vec![Expression::new(self.conf).into()]
    }
}

impl Production for FunctionApplicationExpression {
    fn generate(&mut self, seed: &mut Seed, s: &mut Schema, imp: &Implementation) -> Vec<Clause> {
        if self.conf.is_constant_expression {
            return self.fall_back();
        }
        let config = imp.config();
        let mask = self.conf.list_mask();

        // Maps are only returned if the target type stays undecided.
        if self.conf.target_type == ExpressionType::Any
            && (!self.conf.allow_maps || seed.boolean_with_probability(0.75))
        {
            self.conf.target_type = ExpressionType::from_index(seed.random_intn(2) + 1);
        }

        let property_type = self.conf.property_type.with_mask(mask);
        let mut targets: Vec<Function> = match self.conf.target_type {
            ExpressionType::PropertyValue => property_functions(property_type)
                .iter()
                .chain(config.additional_property_functions.get(&property_type).into_iter().flatten())
                .cloned()
                .collect(),
            ExpressionType::StructuralValue => {
                let structural_type = self.conf.structural_type.with_mask(mask);
                structural_functions(structural_type)
                    .iter()
                    .chain(
                        config
                            .additional_structural_functions
                            .get(&structural_type)
                            .into_iter()
                            .flatten(),
                    )
                    .cloned()
                    .collect()
            }
            ExpressionType::Any => MAP_FUNCTIONS
                .iter()
                .chain(&config.additional_map_functions)
                .cloned()
                .collect(),
        };

        if self.conf.target_type != ExpressionType::StructuralValue
            && self.conf.can_contain_aggregating_functions
            && !s.disallow_aggregate_functions
            && seed.boolean_with_probability(0.5)
        {
            if self.conf.property_type == PropertyType::INTEGER
                && !self.conf.is_list
                && seed.random_boolean()
            {
                self.target = None;
                return vec![CountFunction::default().into()];
            }
            let aggregations: Vec<Function> = aggregation_functions(property_type)
                .iter()
                .chain(
                    config
                        .additional_aggregation_functions
                        .get(&property_type)
                        .into_iter()
                        .flatten(),
                )
                .cloned()
                .collect();
            if !aggregations.is_empty() {
                targets = aggregations;
                // No nested aggregations.
                self.conf.can_contain_aggregating_functions = false;
            }
        }

        if targets.is_empty() {
            return self.fall_back();
        }
        let function = seed.random_choice(&targets).clone();
        if function.can_always_be_null && self.conf.must_be_non_null {
            return self.fall_back();
        }
        if !config.is_function_allowed(function.name) {
            return self.fall_back();
        }

        let mut arguments = Vec::with_capacity(function.input_types.len());
        for input in function.input_types {
            let mut conf = *input;
            conf.can_contain_aggregating_functions = self.conf.can_contain_aggregating_functions;
            if self.conf.must_be_non_null {
                // Structural values can always be null.
                if conf.target_type == ExpressionType::StructuralValue {
                    return self.fall_back();
                }
                conf.target_type = ExpressionType::PropertyValue;
                conf.must_be_non_null = true;
            }
            arguments.push(Expression::new(conf).into());
        }
        self.target = Some(function);
        arguments
    }

    fn template(&self) -> Option<Cow<'_, str>> {
        Some(match &self.target {
            None => Cow::Borrowed("%s"),
            Some(function) => Cow::Owned(format!(
                "{}({})",
                function.name,
                function.input_types.iter().map(|_| "%s").join(", ")
            )),
        })
    }

    fn is_transformer(&self) -> bool {
        true
    }

    fn transform(
        &self,
        _: &mut Seed,
        _: &mut Schema,
        children: &[Capturer],
        _: &Implementation,
    ) -> Option<Clause> {
        let function = self.target.as_ref()?;
        let argument_type = function.input_types.first().map(|conf| conf.property_type);
        match (function.name, argument_type) {
            ("abs", _) => Some(Clause::assembler(
                "(CASE WHEN (%s) < 0 THEN -(%[1]s) ELSE %[1]s END)",
                captured_children(children),
            )),
            ("toBoolean", Some(PropertyType::BOOLEAN))
            | ("toFloat", Some(PropertyType::FLOAT))
            | ("toInteger", Some(PropertyType::INTEGER)) => {
                Some(Assembler::concat(captured_children(children)).into())
            }
            _ => None,
        }
    }
}

/// `COUNT(*)`, `COUNT(x)` or `COUNT(DISTINCT x)`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CountFunction {
    distinct: bool,
    asterisk: bool,
}

impl Production for CountFunction {
    fn generate(&mut self, seed: &mut Seed, _: &mut Schema, _: &Implementation) -> Vec<Clause> {
        self.distinct = seed.boolean_with_probability(0.33);
        if !self.distinct && seed.random_boolean() {
            self.asterisk = true;
            return Vec::new();
        }
        vec![Expression::default().into()]
    }

    fn template(&self) -> Option<Cow<'_, str>> {
        let distinct = if self.distinct { "DISTINCT " } else { "" };
        let argument = if self.asterisk { "*" } else { "%s" };
        Some(Cow::Owned(format!("COUNT({distinct}{argument})")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::GenerationConfig;
    use crate::render::generate_statement;

    #[test]
    fn tables_are_keyed_by_return_type() {
        assert!(property_functions(PropertyType::STRING.with_mask(LIST_MASK))
            .iter()
            .any(|f| f.name == "labels"));
        assert!(structural_functions(StructuralType::NODE.with_mask(LIST_MASK))
            .iter()
            .all(|f| f.name == "nodes"));
        assert!(property_functions(PropertyType::POINT).is_empty());
        assert!(aggregation_functions(PropertyType::ANY.with_mask(LIST_MASK))
            .iter()
            .any(|f| f.name == "collect"));
    }

    #[test]
    fn disallowed_functions_are_never_called() {
        let imp = Implementation::opencypher().with_config(
            GenerationConfig::default().with_disallowed_functions(vec!["abs", "sign", "length"]),
        );
        for rng_seed in 0..200 {
            let mut s = Schema::new();
            let query = generate_statement(
                &mut Seed::from_rng_seed(rng_seed),
                &mut s,
                FunctionApplicationExpression::new(ExpressionConfig::property(PropertyType::INTEGER))
                    .into(),
                &imp,
                200,
            );
            if let Ok(query) = query {
                assert!(!query.starts_with("abs(") && !query.starts_with("sign("), "{query}");
            }
        }
    }

    #[test]
    fn templates_list_every_argument() {
        let mut application = FunctionApplicationExpression::new(ExpressionConfig::property(PropertyType::FLOAT));
        application.target = Some(Function::new("atan2", &[FLOAT, FLOAT]));
        assert_eq!(application.template().unwrap(), "atan2(%s, %s)");
        application.target = Some(Function::new("pi", &[]));
        assert_eq!(application.template().unwrap(), "pi()");
    }

    #[test]
    fn identity_conversions_drop_the_call() {
        let imp = Implementation::opencypher();
        let mut application = FunctionApplicationExpression::new(ExpressionConfig::property(PropertyType::INTEGER));
        application.target = Some(Function::new("toInteger", &[INTEGER]));
        let children = vec![Capturer::new(Clause::stringer("x"))];
        let transformed = application
            .transform(&mut Seed::replay(Vec::new()), &mut Schema::new(), &children, &imp)
            .unwrap();
        let rendered =
            generate_statement(&mut Seed::replay(Vec::new()), &mut Schema::new(), transformed, &imp, 0)
                .unwrap();
        assert_eq!(rendered, "x");
    }
}
