//! Literal values.

use std::borrow::Cow;

use super::util::generate_property_type;
use super::{Expression, Falsum, Tautum};
use crate::capture::Capturer;
use crate::clause::{Clause, Production};
use crate::implementation::Implementation;
use crate::model::{ExpressionConfig, GenerationConfig, PropertyType, Schema};
use crate::Seed;

/// A literal of the configured property type, or `null` if it may be null.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyLiteral {
    pub conf: ExpressionConfig,
    value: String,
}

impl PropertyLiteral {
    pub fn new(conf: ExpressionConfig) -> Self {
        Self {
            conf,
            value: String::new(),
        }
    }

    /// The generated literal. `%s` for strings, which render through a child.
    pub fn value(&self) -> &str {
        &self.value
    }
}

impl Production for PropertyLiteral {
    fn generate(&mut self, seed: &mut Seed, _: &mut Schema, imp: &Implementation) -> Vec<Clause> {
        if self.conf.property_type == PropertyType::ANY {
            self.conf.property_type = generate_property_type(seed, imp.config());
        }
        if self.conf.property_type.base() == PropertyType::STRING {
            self.value = "%s".into();
            return vec![StringLiteral.into()];
        }
        self.value = generate_literal(
            seed,
            imp.config(),
            self.conf.property_type,
            self.conf.must_be_non_null,
        );
        Vec::new()
    }

    fn template(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Owned(format!("({})", self.value)))
    }

    fn is_transformer(&self) -> bool {
        true
    }

    fn transform(
        &self,
        seed: &mut Seed,
        _: &mut Schema,
        _: &[Capturer],
        _: &Implementation,
    ) -> Option<Clause> {
        // Nulls and aggregates break every identity below.
        let mut conf = self.conf;
        conf.must_be_non_null = true;
        conf.can_contain_aggregating_functions = false;

        match self.value.as_str() {
            "true" => {
                if seed.random_boolean() {
                    return Some(Clause::assembler(
                        "((%s)=(%[1]s))",
                        vec![Expression::new(conf).into()],
                    ));
                }
                // null OR true is true.
                conf.must_be_non_null = false;
                Some(Clause::assembler(
                    *seed.random_choice(&["(%s OR %s)", "(%[2]s OR %[1]s)"]),
                    vec![Expression::new(conf).into(), Tautum::new(conf).into()],
                ))
            }
            "false" => {
                conf.must_be_non_null = false;
                Some(Clause::assembler(
                    *seed.random_choice(&["(%s AND %s)", "(%[2]s AND %[1]s)"]),
                    vec![Expression::new(conf).into(), Falsum::new(conf).into()],
                ))
            }
            // Not 0.0, a negative factor would turn it into -0.0.
            "0" => Some(Clause::assembler(
                *seed.random_choice(&["(%s * 0)", "(0 * %s)"]),
                vec![Expression::new(conf).into()],
            )),
            "null" => transform_null(seed, conf),
            _ => None,
        }
    }
}

fn transform_null(seed: &mut Seed, conf: ExpressionConfig) -> Option<Clause> {
    let ty = conf.property_type.base();
    if ty == PropertyType::BOOLEAN {
        if seed.random_boolean() {
            if seed.random_boolean() {
                if seed.random_boolean() {
                    return Some(Clause::assembler(
                        *seed.random_choice(&["(null AND %s)", "(%s AND null)"]),
                        vec![Tautum::default().into()],
                    ));
                }
                return Some(Clause::assembler(
                    *seed.random_choice(&["(null OR %s)", "(%s OR null)"]),
                    vec![Falsum::default().into()],
                ));
            }
            return Some(Clause::assembler(
                *seed.random_choice(&["(null XOR %s)", "(%s XOR null)"]),
                vec![Expression::new(conf).into()],
            ));
        }
        return Some(Clause::assembler(
            *seed.random_choice(&[
                "(null = %s)",
                "(%s = null)",
                "(null <> %s)",
                "(%s <> null)",
                "(null < %s)",
                "(%s < null)",
                "(null > %s)",
                "(%s > null)",
                "(null >= %s)",
                "(%s >= null)",
                "(null <= %s)",
                "(%s <= null)",
            ]),
            vec![Expression::default().into()],
        ));
    }

    if ty == PropertyType::FLOAT && seed.boolean_with_probability(0.25) {
        return Some(Clause::assembler(
            *seed.random_choice(&["(%s^null)", "(null^%s)"]),
            vec![Expression::new(conf).into()],
        ));
    }
    if ty == PropertyType::FLOAT || ty == PropertyType::INTEGER {
        if seed.boolean_with_probability(0.2) {
            return Some(Clause::stringer("(-null)"));
        }
        return Some(Clause::assembler(
            *seed.random_choice(&[
                "(%s+null)",
                "(null+%s)",
                "(%s-null)",
                "(null-%s)",
                "(%s*null)",
                "(null*%s)",
                "(%s/null)",
                "(null/%s)",
            ]),
            vec![Expression::new(conf).into()],
        ));
    }
    None
}

/// A double quoted string of printable ASCII, without quotes or backslashes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StringLiteral;

impl Production for StringLiteral {
    fn generate(&mut self, seed: &mut Seed, _: &mut Schema, _: &Implementation) -> Vec<Clause> {
        let mut literal = String::from("\"");
        while !seed.random_boolean() {
            let c = (seed.random_intn(127 - 32) + 32) as u8 as char;
            if c != '"' && c != '\\' {
                literal.push(c);
            }
        }
        literal.push('"');
        vec![Clause::stringer(literal)]
    }

    fn no_strategy_reduce(&self, _: &Capturer) -> Option<Clause> {
        Some(Clause::stringer("\"\""))
    }
}

/// Renders a literal of `ty`. Any-typed literals pick a concrete type first.
pub(crate) fn generate_literal(
    seed: &mut Seed,
    config: &GenerationConfig,
    ty: PropertyType,
    must_be_non_null: bool,
) -> String {
    let ty = match ty.base() {
        PropertyType::ANY => generate_property_type(seed, config),
        ty => ty,
    };
    if seed.random_boolean() {
        if let Some(literal) = generate_interesting_literal(seed, ty, must_be_non_null) {
            return literal;
        }
    }

    match ty {
        PropertyType::BOOLEAN => {
            if seed.random_boolean() {
                "true".into()
            } else {
                "false".into()
            }
        }
        PropertyType::DATE => "date('2000-01-01')".into(),
        PropertyType::DATETIME => "datetime('2015-06-24T12:50:35.556+0100')".into(),
        PropertyType::DURATION => "duration(\"P1Y\")".into(),
        PropertyType::FLOAT => format_float(f64::from_bits(seed.random_i64() as u64)),
        PropertyType::INTEGER => seed.random_i64().to_string(),
        PropertyType::LOCAL_DATE_TIME => "localdatetime('2015185T19:32:24')".into(),
        PropertyType::LOCAL_TIME => "localtime('12:50:35.556')".into(),
        PropertyType::POINT => {
            let x = seed.random_i64();
            let y = seed.random_i64();
            format!("point({{x: {x}, y: {y}}})")
        }
        PropertyType::STRING => "\"\"".into(),
        PropertyType::TIME => "time('125035.556+0100')".into(),
        PropertyType::POSITIVE_INTEGER => seed.random_positive_i64().to_string(),
        PropertyType::PERCENTILE => {
            let f = f64::from_bits(seed.random_positive_i64() as u64);
            format_float((f - f.round_ties_even()).abs())
        }
        PropertyType::INT32 => (seed.random_i64() as i32).to_string(),
        PropertyType::POSITIVE_INT32 => (seed.random_positive_i64() % 2_147_483_648).to_string(),
        other => panic!("cannot generate a literal of type {other:?}"),
    }
}

/// Edge case values of numeric types, or `null`. `None` for types without edge cases.
fn generate_interesting_literal(
    seed: &mut Seed,
    ty: PropertyType,
    must_be_non_null: bool,
) -> Option<String> {
    if !must_be_non_null && seed.boolean_with_probability(0.25) {
        return Some("null".into());
    }
    let choices: &[&str] = match ty {
        PropertyType::FLOAT => &[
            "0.0",
            "-0.0",
            "1.0",
            "-1.0",
            "1.7976931348623157E308",
            "-1.7976931348623157E308",
            "4.9E-324",
            "-4.9E-324",
        ],
        PropertyType::INTEGER => &["0", "1", "-1", "9223372036854775807"],
        PropertyType::POSITIVE_INTEGER => &["0", "1", "9223372036854775807"],
        PropertyType::PERCENTILE => &["0.0", "1.0"],
        PropertyType::INT32 => &["0", "1", "-1", "2147483647", "-2147483648"],
        PropertyType::POSITIVE_INT32 => &["0", "1", "2147483647"],
        _ => return None,
    };
    Some(seed.random_choice(choices).to_string())
}

/// Floats as Cypher reads them. Non-finite values have no literal.
fn format_float(f: f64) -> String {
    if f.is_nan() {
        "(0.0/0.0)".into()
    } else if f == f64::INFINITY {
        "(1.0/0.0)".into()
    } else if f == f64::NEG_INFINITY {
        "(-1.0/0.0)".into()
    } else {
        format!("{f:?}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::generate_statement;

    fn render(clause: Clause, bytes: Vec<u8>) -> String {
        let imp = Implementation::opencypher();
        generate_statement(&mut Seed::replay(bytes), &mut Schema::new(), clause, &imp, 0).unwrap()
    }

    #[test]
    fn exhausted_seed_gives_null_unless_non_null() {
        let nullable = PropertyLiteral::new(ExpressionConfig::property(PropertyType::INTEGER));
        assert_eq!(render(nullable.into(), Vec::new()), "(null)");

        let non_null = PropertyLiteral::new(ExpressionConfig::property(PropertyType::INTEGER).non_null());
        assert_eq!(render(non_null.into(), Vec::new()), "(0)");
    }

    #[test]
    fn strings_render_through_string_literals() {
        let literal = PropertyLiteral::new(ExpressionConfig::property(PropertyType::STRING));
        assert_eq!(render(literal.into(), Vec::new()), "(\"\")");
    }

    #[test]
    fn string_literals_drop_quotes() {
        // Two characters, '"' (34) and 'a' (97), then stop.
        let mut bytes = vec![1, 2, 0, 0, 0, 0, 0, 0, 0];
        bytes.extend([1, 65, 0, 0, 0, 0, 0, 0, 0]);
        bytes.push(0);
        assert_eq!(render(StringLiteral.into(), bytes), "\"a\"");
    }

    #[test]
    fn floats_are_valid_literals() {
        assert_eq!(format_float(1.0), "1.0");
        assert_eq!(format_float(-0.0), "-0.0");
        assert_eq!(format_float(f64::NAN), "(0.0/0.0)");
        assert_eq!(format_float(f64::NEG_INFINITY), "(-1.0/0.0)");
    }

    #[test]
    fn percentiles_stay_in_range() {
        let config = GenerationConfig::default();
        let mut seed = Seed::from_rng_seed(11);
        for _ in 0..200 {
            let literal = generate_literal(&mut seed, &config, PropertyType::PERCENTILE, true);
            if let Ok(value) = literal.parse::<f64>() {
                assert!((0.0..=1.0).contains(&value), "{literal}");
            }
        }
    }

    #[test]
    fn zero_transforms_to_a_product() {
        let mut literal = PropertyLiteral::new(ExpressionConfig::property(PropertyType::INTEGER));
        literal.value = "0".into();
        let mut seed = Seed::replay(Vec::new());
        let transformed = literal
            .transform(&mut seed, &mut Schema::new(), &[], &Implementation::opencypher())
            .unwrap();
        let rendered = render(transformed, Vec::new());
        assert!(rendered.starts_with('(') && rendered.ends_with(" * 0)"), "{rendered}");
    }
}
