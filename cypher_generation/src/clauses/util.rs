//! Helpers shared across the clause library: identifiers, expression configs
//! and the bookkeeping several productions have in common.

use super::Expression;
use crate::capture::Capturer;
use crate::clause::Clause;
use crate::implementation::Implementation;
use crate::model::{
    ExpressionConfig, ExpressionType, GenerationConfig, PropertyType, PropertyVariable, Schema,
    StructuralType, StructuralVariable,
};
use crate::Seed;

/// Identifiers that would be parsed as keywords.
const RESERVED: &[&str] = &[
    "all", "and", "any", "as", "asc", "by", "call", "case", "collect", "contains", "count",
    "create", "delete", "desc", "detach", "distinct", "do", "else", "end", "ends", "exists",
    "false", "for", "foreach", "from", "if", "in", "is", "limit", "match", "merge", "none", "not",
    "null", "of", "on", "optional", "or", "order", "remove", "return", "set", "single", "skip",
    "starts", "then", "to", "true", "union", "unwind", "use", "when", "where", "with", "xor",
    "yield",
];

const FIRST_CHARS: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
const CHARS: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// A random identifier. Not necessarily unused.
pub(crate) fn generate_name(seed: &mut Seed) -> String {
    let mut name = String::new();
    name.push(*seed.random_choice(FIRST_CHARS) as char);
    while !seed.random_boolean() {
        name.push(*seed.random_choice(CHARS) as char);
    }
    if RESERVED.contains(&name.as_str()) {
        name.push('_');
    }
    name
}

/// An identifier no other identifier of the statement uses, marked as used.
pub(crate) fn generate_unique_name(seed: &mut Seed, s: &Schema) -> String {
    let name = generate_name(seed);
    if s.use_name(&name) {
        return name;
    }
    let mut suffix = 1usize;
    loop {
        let candidate = format!("{name}_{suffix}");
        if s.use_name(&candidate) {
            return candidate;
        }
        suffix += 1;
    }
}

/// Names a node or relationship in a pattern. Nodes sometimes reuse a bound,
/// non-null node variable; everything else binds a fresh variable.
pub(crate) fn generate_structure_name(
    seed: &mut Seed,
    s: &mut Schema,
    ty: StructuralType,
    likely_null: bool,
) -> String {
    if ty == StructuralType::NODE && seed.boolean_with_probability(0.25) {
        let reusable: Vec<&StructuralVariable> = s
            .structural_variables_of(ty)
            .iter()
            .filter(|v| !v.likely_null && !s.deleted_vars.contains(&v.name))
            .collect();
        if !reusable.is_empty() {
            return seed.random_choice(&reusable).name.clone();
        }
    }
    let name = generate_unique_name(seed, s);
    s.add_structural_variable(StructuralVariable {
        name: name.clone(),
        ty,
        likely_null,
    });
    name
}

/// Half of the time the name of a property known to exist, otherwise a fresh one.
pub(crate) fn generate_property_name(seed: &mut Seed, s: &Schema) -> String {
    let known = s.properties_of(PropertyType::ANY);
    if !known.is_empty() && seed.random_boolean() {
        return seed.random_choice(&known).name.clone();
    }
    generate_unique_name(seed, s)
}

pub(crate) fn generate_property_type(seed: &mut Seed, config: &GenerationConfig) -> PropertyType {
    let allowed = config.allowed_property_types();
    *seed.random_choice(&allowed)
}

pub(crate) fn generate_structural_type(seed: &mut Seed) -> StructuralType {
    *seed.random_choice(&[
        StructuralType::NODE,
        StructuralType::RELATIONSHIP,
        StructuralType::PATH,
    ])
}

/// A random expression config, as used for iterators and free-standing
/// subexpressions.
pub(crate) fn generate_expression_conf(seed: &mut Seed, config: &GenerationConfig) -> ExpressionConfig {
    let mut conf = ExpressionConfig::any();
    conf.target_type = ExpressionType::from_index(seed.random_intn(3));
    if conf.target_type != ExpressionType::StructuralValue && seed.random_boolean() {
        conf.property_type = generate_property_type(seed, config);
    }
    if conf.target_type != ExpressionType::PropertyValue && seed.random_boolean() {
        conf.structural_type = generate_structural_type(seed);
    }
    conf.is_list = seed.boolean_with_probability(0.2);
    conf
}

/// Binds `name` to whatever an expression of `conf` evaluates to.
pub(crate) fn add_variable_to_schema(s: &mut Schema, name: &str, conf: ExpressionConfig) {
    match conf.target_type {
        ExpressionType::StructuralValue => s.add_structural_variable(StructuralVariable {
            name: name.to_string(),
            ty: conf.structural_type.with_mask(conf.list_mask()),
            likely_null: !conf.must_be_non_null,
        }),
        ExpressionType::PropertyValue | ExpressionType::Any => {
            s.add_property_variable(PropertyVariable {
                name: name.to_string(),
                ty: conf.property_type.with_mask(conf.masks()),
                value: String::new(),
            })
        }
    }
}

/// Every clause of a statement uses the same label expression syntax.
pub(crate) fn decide_on_label_match_type(seed: &mut Seed, s: &mut Schema) {
    if s.use_new_label_match_type.is_none() {
        s.use_new_label_match_type = Some(seed.random_boolean());
    }
}

/// Decides on the columns the current query has to return. At least one.
pub(crate) fn populate_variables_to_return(seed: &mut Seed, s: &mut Schema, config: &GenerationConfig) {
    s.must_return = true;
    s.property_variables_to_return.clear();
    s.structural_variables_to_return.clear();
    loop {
        let name = generate_unique_name(seed, s);
        if seed.random_boolean() {
            let ty = generate_property_type(seed, config);
            s.property_variables_to_return
                .push(PropertyVariable { name, ty, value: String::new() });
        } else {
            let ty = generate_structural_type(seed);
            s.structural_variables_to_return
                .push(StructuralVariable { name, ty, likely_null: true });
        }
        if seed.random_boolean() {
            break;
        }
    }
}

/// Either nothing or `clause`.
pub(crate) fn optional_clause(seed: &mut Seed, clause: impl Into<Clause>) -> Clause {
    if seed.random_boolean() {
        Clause::empty()
    } else {
        clause.into()
    }
}

/// `clause` with the passed probability, nothing otherwise. Exhausted
/// replays get nothing.
pub(crate) fn optional_clause_with_probability(
    seed: &mut Seed,
    clause: impl Into<Clause>,
    probability: f64,
) -> Clause {
    if seed.boolean_with_probability(1.0 - probability) {
        Clause::empty()
    } else {
        clause.into()
    }
}

/// Fully generates an expression up front, so it can be reused verbatim.
pub(crate) fn generate_expression_ast(
    conf: ExpressionConfig,
    seed: &mut Seed,
    s: &mut Schema,
    imp: &Implementation,
) -> Capturer {
    let mut expression = Capturer::new(Expression::new(conf));
    expression.generate_ast(seed, s, imp);
    expression
}

/// Hands generated children to a replacement clause, keeping what they generated.
pub(crate) fn captured_children(children: &[Capturer]) -> Vec<Clause> {
    children.iter().cloned().map(Clause::captured).collect()
}

/// Whether any variable, property or structural, is in scope.
pub(crate) fn has_variables(s: &Schema) -> bool {
    !s.property_variables_by_name.is_empty() || !s.structural_variables_by_name.is_empty()
}

/// Whether SET, REMOVE and DELETE have something to write to. Without the
/// variable restriction any expression will do.
pub(crate) fn has_write_targets(s: &Schema, config: &GenerationConfig) -> bool {
    !config.only_variables_as_write_target
        || !s.structural_variables_of(StructuralType::NODE).is_empty()
        || !s.structural_variables_of(StructuralType::RELATIONSHIP).is_empty()
}

/// The type a property write targets. Falls back to relationships when
/// restricted to variables and no node is bound.
pub(crate) fn write_target_type(seed: &mut Seed, s: &Schema, config: &GenerationConfig) -> StructuralType {
    if config.only_variables_as_write_target {
        let nodes = s.structural_variables_of(StructuralType::NODE).len();
        let relationships = s.structural_variables_of(StructuralType::RELATIONSHIP).len();
        if nodes == 0 || (relationships != 0 && seed.random_boolean()) {
            return StructuralType::RELATIONSHIP;
        }
        StructuralType::NODE
    } else if seed.random_boolean() {
        StructuralType::RELATIONSHIP
    } else {
        StructuralType::NODE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exhausted_seed_terminates() {
        let s = Schema::new();
        let mut seed = Seed::replay(Vec::new());
        assert_eq!(generate_name(&mut seed), "a");
        assert_eq!(generate_unique_name(&mut seed, &s), "a");
        assert_eq!(generate_unique_name(&mut seed, &s), "a_1");
        assert_eq!(generate_unique_name(&mut seed, &s), "a_2");
    }

    #[test]
    fn keywords_are_never_names() {
        // "in": 'i' then one more char 'n', then stop.
        let mut seed = Seed::replay(vec![8, 0, 0, 0, 0, 0, 0, 0, 1, 13, 0, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(generate_name(&mut seed), "in_");
    }

    #[test]
    fn structure_names_bind_variables() {
        let mut s = Schema::new();
        let mut seed = Seed::from_rng_seed(4);
        let name = generate_structure_name(&mut seed, &mut s, StructuralType::RELATIONSHIP, true);
        let bound = &s.structural_variables_by_name[&name];
        assert_eq!(bound.ty, StructuralType::RELATIONSHIP);
        assert!(bound.likely_null);
        assert!(s.is_name_used(&name));
    }

    #[test]
    fn returned_columns_are_never_empty() {
        let mut s = Schema::new();
        let mut seed = Seed::replay(Vec::new());
        populate_variables_to_return(&mut seed, &mut s, &GenerationConfig::default());
        assert!(s.must_return);
        assert_eq!(
            s.property_variables_to_return.len() + s.structural_variables_to_return.len(),
            1
        );
    }

    #[test]
    fn variables_land_in_their_buckets() {
        let mut s = Schema::new();
        add_variable_to_schema(&mut s, "p", ExpressionConfig::property(PropertyType::INTEGER).list());
        add_variable_to_schema(&mut s, "n", ExpressionConfig::structural(StructuralType::NODE));
        assert_eq!(
            s.property_variables_by_name["p"].ty,
            PropertyType::INTEGER.with_mask(crate::model::LIST_MASK)
        );
        assert!(s.structural_variables_by_name["n"].likely_null);
    }
}
