use std::borrow::Cow;

use super::util::{captured_children, generate_expression_conf, generate_property_type};
use super::Expression;
use crate::capture::Capturer;
use crate::clause::{Clause, Production};
use crate::implementation::Implementation;
use crate::model::{ExpressionConfig, ExpressionType, PropertyType, Schema};
use crate::Seed;

/// A unary or binary operator applied to subexpressions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OperatorApplicationExpression {
    pub conf: ExpressionConfig,
    operator: &'static str,
}

impl OperatorApplicationExpression {
    pub fn new(conf: ExpressionConfig) -> Self {
        Self {
            conf,
            operator: "",
        }
    }

    fn apply(&mut self, operator: &'static str, operands: &[ExpressionConfig]) -> Vec<Clause> {
        self.operator = operator;
        operands.iter().map(|conf| Expression::new(*conf).into()).collect()
    }

    /// A random operand config inheriting the constness and aggregation flags.
    fn operand_conf(&self, seed: &mut Seed, imp: &Implementation) -> ExpressionConfig {
        let mut conf = generate_expression_conf(seed, imp.config());
        conf.is_constant_expression = self.conf.is_constant_expression;
        conf.can_contain_aggregating_functions = self.conf.can_contain_aggregating_functions;
        conf
    }
}

impl Production for OperatorApplicationExpression {
    fn generate(&mut self, seed: &mut Seed, _: &mut Schema, imp: &Implementation) -> Vec<Clause> {
        // Operators never evaluate to structural values.
        if self.conf.target_type == ExpressionType::StructuralValue {
            return vec![Expression::new(self.conf).into()];
        }
        self.conf.target_type = ExpressionType::PropertyValue;
        let conf = self.conf;

        if conf.is_list {
            return self.apply("%s+%s", &[conf, conf]);
        }
        if self.conf.property_type == PropertyType::ANY {
            self.conf.property_type = generate_property_type(seed, imp.config());
        }
        let conf = self.conf;

        match conf.property_type {
            PropertyType::STRING => self.apply("%s+%s", &[conf, conf]),
            PropertyType::BOOLEAN => match seed.random_intn(3) {
                0 => {
                    if seed.boolean_with_probability(0.25) {
                        return self.apply("NOT %s", &[conf]);
                    }
                    let operator = *seed.random_choice(&["%s AND %s", "%s OR %s", "%s XOR %s"]);
                    self.apply(operator, &[conf, conf])
                }
                1 => {
                    if seed.random_boolean() {
                        let operator = *seed.random_choice(&["%s IS NULL", "%s IS NOT NULL"]);
                        let operand = self.operand_conf(seed, imp);
                        return self.apply(operator, &[operand]);
                    }
                    let operator = *seed.random_choice(&[
                        "%s=%s", "%s<>%s", "%s<%s", "%s>%s", "%s<=%s", "%s>=%s",
                    ]);
                    if conf.must_be_non_null {
                        // Comparing lists, points or durations easily yields null.
                        let mut operand = self.operand_conf(seed, imp);
                        if operand.property_type == PropertyType::POINT
                            || operand.property_type == PropertyType::DURATION
                        {
                            operand.property_type = PropertyType::INTEGER;
                        }
                        operand.target_type = ExpressionType::PropertyValue;
                        operand.must_be_non_null = true;
                        operand.is_list = false;
                        return self.apply(operator, &[operand, operand]);
                    }
                    let first = self.operand_conf(seed, imp);
                    let second = self.operand_conf(seed, imp);
                    self.apply(operator, &[first, second])
                }
                _ => {
                    self.conf.property_type = PropertyType::STRING;
                    let operator = *seed.random_choice(&[
                        "%s STARTS WITH %s",
                        "%s ENDS WITH %s",
                        "%s CONTAINS %s",
                        "%s =~ %s",
                    ]);
                    let operand = self.conf;
                    self.apply(operator, &[operand, operand])
                }
            },
            PropertyType::FLOAT if seed.boolean_with_probability(0.25) => {
                self.apply("%s^%s", &[conf, conf])
            }
            PropertyType::FLOAT | PropertyType::INTEGER => {
                let operator = *seed.random_choice(&["%s+%s", "%s-%s", "%s*%s", "%s/%s", "%s%%%s"]);
                self.apply(operator, &[conf, conf])
            }
            _ => vec![Expression::new(conf).into()],
        }
    }

    fn template(&self) -> Option<Cow<'_, str>> {
        Some(if self.operator.is_empty() {
            Cow::Borrowed("%s")
        } else {
            Cow::Owned(format!("({})", self.operator))
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
        let template = match self.operator {
            "%s AND %s" => "(NOT (NOT (%s) OR NOT (%s)))",
            "%s OR %s" => "(NOT (NOT (%s) AND NOT (%s)))",
            "%s IS NULL" => "(NOT (%s IS NOT NULL))",
            "%s IS NOT NULL" => "(NOT (%s IS NULL))",
            _ => return None,
        };
        Some(Clause::assembler(template, captured_children(children)))
    }
}
