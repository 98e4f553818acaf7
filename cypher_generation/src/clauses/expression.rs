//! Expressions and variable references.

use std::borrow::Cow;

use super::literal::generate_literal;
use super::util::{
    captured_children, generate_name, generate_property_type, generate_structural_type,
    optional_clause,
};
use super::{
    CaseExpression, CaseExpressionElse, CaseExpressionWhen, Count, Exists, Falsum,
    FunctionApplicationExpression, ListExpression, OperatorApplicationExpression, Predicate,
    PropertyLiteral, Tautum,
};
use crate::capture::Capturer;
use crate::clause::{Clause, Production};
use crate::implementation::Implementation;
use crate::model::{
    ExpressionConfig, ExpressionType, GenerationConfig, PropertyType, Schema, StructuralType,
};
use crate::Seed;

/// Any expression satisfying its config.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Expression {
    pub conf: ExpressionConfig,
}

impl Expression {
    pub fn new(conf: ExpressionConfig) -> Self {
        Self { conf }
    }
}

impl Production for Expression {
    fn generate(&mut self, seed: &mut Seed, s: &mut Schema, imp: &Implementation) -> Vec<Clause> {
        let conf = &mut self.conf;
        // Deciding on types early lets transformations apply higher up.
        if seed.random_boolean() {
            if conf.target_type == ExpressionType::Any && seed.random_boolean() {
                conf.target_type = ExpressionType::from_index(seed.random_intn(2) + 1);
            }
            if conf.property_type == PropertyType::ANY && seed.random_boolean() {
                conf.property_type = generate_property_type(seed, imp.config());
            }
            if conf.structural_type == StructuralType::ANY && seed.random_boolean() {
                conf.structural_type = generate_structural_type(seed);
            }
        }

        let structural = conf.target_type == ExpressionType::StructuralValue;
        if !structural && !conf.is_list && seed.boolean_with_probability(0.75) {
            conf.target_type = ExpressionType::PropertyValue;
            return vec![PropertyLiteral::new(*conf).into()];
        }

        if !structural
            && !conf.must_be_non_null
            && !conf.is_list
            && !conf.is_constant_expression
            && conf.property_type == PropertyType::BOOLEAN
            && seed.boolean_with_probability(0.1)
        {
            return vec![Predicate::new(*conf).into()];
        }

        if conf.is_list {
            return vec![ListExpression::new(*conf).into()];
        }
        if seed.boolean_with_probability(0.25) {
            return vec![FunctionApplicationExpression::new(*conf).into()];
        }
        if seed.boolean_with_probability(0.33) {
            return vec![OperatorApplicationExpression::new(*conf).into()];
        }

        if !conf.is_constant_expression && seed.boolean_with_probability(0.9) {
            if !structural && !s.is_in_merge_clause && seed.boolean_with_probability(0.1) {
                if conf.property_type == PropertyType::ANY {
                    conf.property_type = if seed.random_boolean() {
                        PropertyType::INTEGER
                    } else {
                        PropertyType::BOOLEAN
                    };
                }
                match conf.property_type {
                    PropertyType::INTEGER => return vec![Count::default().into()],
                    PropertyType::BOOLEAN => return vec![Exists::default().into()],
                    _ => {}
                }
            }
            return vec![VariableExpression::new(*conf).into()];
        }
        if conf.is_constant_expression {
            return vec![PropertyLiteral::new(*conf).into()];
        }
        vec![CaseExpression::new(*conf).into()]
    }

    fn is_transformer(&self) -> bool {
        true
    }

    fn transform(
        &self,
        seed: &mut Seed,
        _: &mut Schema,
        children: &[Capturer],
        imp: &Implementation,
    ) -> Option<Clause> {
        let mut conf = self.conf;
        let child = children.first()?;

        if seed.boolean_with_probability(0.1) {
            // Aggregates could change the number of rows returned.
            conf.can_contain_aggregating_functions = false;
            let captured = Clause::captured(child.clone());
            if seed.random_boolean() {
                conf.target_type = ExpressionType::Any;
                conf.property_type = PropertyType::ANY;
                conf.structural_type = StructuralType::ANY;
                let (template, first, second): (_, Clause, Clause) = if seed.random_boolean() {
                    (
                        "(CASE (%s) IS NULL WHEN %s THEN null WHEN %s then (%s) %s %s END)",
                        Tautum::new(conf).into(),
                        Falsum::new(conf).into(),
                    )
                } else {
                    (
                        "(CASE (%s) IS NOT NULL WHEN %s THEN null WHEN %s then (%s) %s %s END)",
                        Falsum::new(conf).into(),
                        Tautum::new(conf).into(),
                    )
                };
                return Some(Clause::assembler(
                    template,
                    vec![
                        captured.clone(),
                        first,
                        second,
                        captured,
                        CaseExpressionWhen::new(conf, false).into(),
                        optional_clause(seed, CaseExpressionElse::new(conf)),
                    ],
                ));
            }
            return Some(Clause::assembler(
                "(CASE WHEN (%s) IS NULL THEN null WHEN (%s) IS NOT NULL then (%s) %s %s END)",
                vec![
                    captured.clone(),
                    captured.clone(),
                    captured,
                    CaseExpressionWhen::new(conf, true).into(),
                    optional_clause(seed, CaseExpressionElse::new(conf)),
                ],
            ));
        }

        let children = captured_children(children);
        if conf.is_list {
            return Some(Clause::assembler(
                *seed.random_choice(&["((%s)+[])", "([]+(%s))"]),
                children,
            ));
        }
        if conf.target_type != ExpressionType::PropertyValue {
            return None;
        }

        match conf.property_type {
            PropertyType::FLOAT if seed.random_boolean() => {
                // -(-(-0.0)) is not -0.0.
                let negatable = matches!(
                    child.clause(),
                    Clause::PropertyLiteral(literal) if literal.value() != "-0.0"
                );
                if negatable && seed.boolean_with_probability(0.5) {
                    return Some(Clause::assembler("(-(-(%s)))", children));
                }
                Some(Clause::assembler("((%s)^1)", children))
            }
            PropertyType::INTEGER if seed.random_boolean() => Some(Clause::assembler(
                *seed.random_choice(&["((%s) + 0)", "(0 + (%s))", "((%s) - 0)"]),
                children,
            )),
            PropertyType::FLOAT | PropertyType::INTEGER => {
                let choices: &[&str] = if imp.config().inaccurate_division {
                    &["((%s) * 1)", "(1 * (%s))"]
                } else {
                    &["((%s) * 1)", "(1 * (%s))", "((%s) / 1)"]
                };
                Some(Clause::assembler(*seed.random_choice(choices), children))
            }
            PropertyType::STRING => Some(Clause::assembler(
                *seed.random_choice(&["((%s)+\"\")", "(\"\"+(%s))"]),
                children,
            )),
            _ => None,
        }
    }

    /// A literal of the same type. Every random choice takes its first option.
    fn no_strategy_reduce(&self, _: &Capturer) -> Option<Clause> {
        let mut seed = Seed::replay(vec![0; 128]);
        let config = GenerationConfig::default();
        let ty = match self.conf.property_type {
            PropertyType::ANY => generate_property_type(&mut seed, &config),
            ty => ty,
        };
        let literal = generate_literal(&mut seed, &config, ty, self.conf.must_be_non_null);
        Some(Clause::stringer(format!("({literal})")))
    }
}

/// A reference to a variable in scope, or to a property of a node or relationship.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VariableExpression {
    pub conf: ExpressionConfig,
    name: String,
    is_property_access: bool,
}

impl VariableExpression {
    pub fn new(conf: ExpressionConfig) -> Self {
        Self {
            conf,
            ..Self::default()
        }
    }
}

impl Production for VariableExpression {
    fn generate(&mut self, seed: &mut Seed, s: &mut Schema, imp: &Implementation) -> Vec<Clause> {
        let config = imp.config();
        let mask = self.conf.masks();

        if self.conf.target_type == ExpressionType::StructuralValue
            || (self.conf.target_type == ExpressionType::Any && seed.random_boolean())
        {
            let available = s.structural_variables_of(self.conf.structural_type.with_mask(mask));
            if !available.is_empty() {
                let name = seed.random_choice(available).name.clone();
                if config.disallow_deleted_write_targets && s.deleted_vars.contains(&name) {
                    return vec![Expression::new(self.conf).into()];
                }
                if self.conf.gets_deleted {
                    tracing::trace!(%name, "variable gets deleted");
                    s.deleted_vars.insert(name.clone());
                }
                self.name = name;
                return Vec::new();
            } else if self.conf.target_type == ExpressionType::StructuralValue {
                self.name = "null".into();
                return Vec::new();
            }
        }

        let ty = self.conf.property_type.with_mask(mask);
        if !self.conf.must_be_non_null && seed.random_boolean() {
            self.is_property_access = true;
            self.name = generate_name(seed);

            let properties = s.properties_of(ty);
            if !properties.is_empty() {
                let property = seed.random_choice(&properties);
                // Only if every property of that name has the requested type.
                if ty == PropertyType::ANY || s.property_type_of(&property.name) == Some(ty) {
                    self.name = property.name.clone();
                }
            }

            let target = if seed.random_boolean() {
                StructuralType::RELATIONSHIP
            } else {
                StructuralType::NODE
            };
            if config.only_variables_as_write_target && s.structural_variables_of(target).is_empty() {
                self.is_property_access = false;
                self.name = "null".into();
                return Vec::new();
            }
            return vec![Expression::new(ExpressionConfig::structural(target)).into()];
        }

        let available = s.property_variables_of(ty);
        if !available.is_empty() {
            self.name = seed.random_choice(available).name.clone();
            return Vec::new();
        }
        vec![Expression::new(self.conf).into()]
    }

    fn template(&self) -> Option<Cow<'_, str>> {
        Some(if self.name.is_empty() {
            Cow::Borrowed("%s")
        } else if self.is_property_access {
            Cow::Owned(format!("%s.{}", self.name))
        } else {
            Cow::Borrowed(&self.name)
        })
    }
}

/// The node or relationship a SET, REMOVE or DELETE writes to.
///
/// With write targets restricted to variables, a candidate variable must be
/// in scope; callers check this before generating one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteTarget {
    pub ty: StructuralType,
    /// Whatever the target evaluates to is deleted.
    pub gets_deleted: bool,
}

impl WriteTarget {
    pub fn new(ty: StructuralType) -> Self {
        Self {
            ty,
            gets_deleted: false,
        }
    }

    pub fn deleted(ty: StructuralType) -> Self {
        Self {
            ty,
            gets_deleted: true,
        }
    }
}

impl Production for WriteTarget {
    fn generate(&mut self, seed: &mut Seed, s: &mut Schema, imp: &Implementation) -> Vec<Clause> {
        if imp.config().only_variables_as_write_target {
            let available = s.structural_variables_of(self.ty);
            if available.is_empty() {
                panic!("no variable of type {:?} in scope to use as a write target", self.ty);
            }
            let name = seed.random_choice(available).name.clone();
            if self.gets_deleted {
                s.deleted_vars.insert(name.clone());
            }
            return vec![Clause::stringer(name)];
        }
        let mut conf = ExpressionConfig::structural(self.ty);
        conf.gets_deleted = self.gets_deleted;
        vec![Expression::new(conf).into()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{PropertyVariable, StructuralVariable};
    use crate::render::generate_statement;

    fn render(clause: impl Into<Clause>, s: &mut Schema, seed: &mut Seed) -> String {
        generate_statement(seed, s, clause.into(), &Implementation::opencypher(), 0).unwrap()
    }

    #[test]
    fn exhausted_seed_renders_a_literal() {
        let mut s = Schema::new();
        let expression = Expression::new(ExpressionConfig::property(PropertyType::INTEGER).non_null());
        assert_eq!(render(expression, &mut s, &mut Seed::replay(Vec::new())), "(0)");
    }

    #[test]
    fn structural_expressions_without_variables_are_null() {
        let mut s = Schema::new();
        let variable = VariableExpression::new(ExpressionConfig::structural(StructuralType::NODE));
        assert_eq!(render(variable, &mut s, &mut Seed::from_rng_seed(1)), "null");
    }

    #[test]
    fn deleted_targets_are_recorded() {
        let mut s = Schema::new();
        s.add_structural_variable(StructuralVariable {
            name: "n".into(),
            ty: StructuralType::NODE,
            likely_null: false,
        });
        let mut conf = ExpressionConfig::structural(StructuralType::NODE);
        conf.gets_deleted = true;
        assert_eq!(
            render(VariableExpression::new(conf), &mut s, &mut Seed::from_rng_seed(2)),
            "n"
        );
        assert!(s.deleted_vars.contains("n"));
    }

    #[test]
    fn non_null_property_variables_are_referenced() {
        let mut s = Schema::new();
        s.add_property_variable(PropertyVariable {
            name: "x".into(),
            ty: PropertyType::INTEGER,
            value: String::new(),
        });
        let conf = ExpressionConfig::property(PropertyType::INTEGER).non_null();
        // Non-null lookups only see variables known to be non-null.
        let rendered = render(VariableExpression::new(conf), &mut s, &mut Seed::replay(Vec::new()));
        assert_ne!(rendered, "x");

        s.add_property_variable(PropertyVariable {
            name: "y".into(),
            ty: PropertyType::INTEGER.with_mask(crate::model::NON_NULL_MASK),
            value: String::new(),
        });
        let rendered = render(VariableExpression::new(conf), &mut s, &mut Seed::replay(Vec::new()));
        assert_eq!(rendered, "y");
    }

    #[test]
    #[should_panic(expected = "write target")]
    fn write_targets_require_candidates() {
        let imp = Implementation::opencypher().with_config(
            GenerationConfig::default().with_only_variables_as_write_target(true),
        );
        let mut s = Schema::new();
        let _ = generate_statement(
            &mut Seed::replay(Vec::new()),
            &mut s,
            WriteTarget::new(StructuralType::NODE).into(),
            &imp,
            0,
        );
    }

    #[test]
    fn reduction_keeps_the_type() {
        let expression = Expression::new(ExpressionConfig::property(PropertyType::INTEGER).non_null());
        let capturer = Capturer::new(expression.clone());
        assert_eq!(expression.no_strategy_reduce(&capturer), Some(Clause::stringer("(0)")));
    }
}
