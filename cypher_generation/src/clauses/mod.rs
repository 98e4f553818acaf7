//! The OpenCypher grammar.
//!
//! Every production of the grammar is a [Production](crate::Production)
//! implementor in one of the modules below. Productions that can be
//! rewritten into an equivalent also implement `transform`, and productions
//! with an obviously smaller counterpart suggest it through
//! `no_strategy_reduce`.

mod call_subquery;
mod case;
mod create;
mod delete;
mod expression;
mod foreach;
mod function;
mod index;
mod label;
mod list;
mod literal;
mod matching;
mod merge;
mod name;
mod operator;
mod path;
mod predicate;
mod projection;
mod property;
mod remove;
mod root;
mod set;
mod subquery;
mod transformation;
mod union;
mod unwind;
mod util;
mod with;

pub use call_subquery::{CallSubquery, CallSubqueryClause, CallSubqueryWith};
pub use case::{
    CaseExpression, CaseExpressionElse, CaseExpressionWhen, GenericCaseExpression,
    SimpleCaseExpression,
};
pub use create::{
    Create, CreateClause, CreateElement, CreateElementChain, CreateExistingNode, CreateNewNode,
    CreateNode, CreatePathElement,
};
pub use delete::{Delete, DeleteClause, DeleteElementChain};
pub use expression::{Expression, VariableExpression, WriteTarget};
pub use foreach::{Foreach, ForeachClause, ForeachCommand, ForeachVariable};
pub use function::{
    aggregation_functions, property_functions, structural_functions, CountFunction,
    FunctionApplicationExpression,
};
pub use index::{ConstraintProperty, ConstraintPropertyChain};
pub use label::{ExistingLabel, Label, LabelMatch, LabelName, Labels, NewLabel, OptionalLabelMatch};
pub use list::{
    ListComprehension, ListComprehensionPrefix, ListComprehensionSuffix, ListExpression,
    ListLiteral, ListLiteralItem,
};
pub use literal::{PropertyLiteral, StringLiteral};
pub use matching::{
    Match, MatchClause, MatchElementChain, OptionalWhereClause, WhereClause, WhereExpression,
};
pub use merge::{Merge, MergeClause};
pub use name::{OptionalStructureName, PropertyName, StructureName};
pub use operator::OperatorApplicationExpression;
pub use path::{
    CyclicPath, MatchNode, MatchRelationship, PathPatternExpression, ReversiblePath,
    TransformablePath,
};
pub use predicate::{Predicate, PredicatePrefix};
pub use projection::{
    OptionalLimit, OptionalOrderBy, OptionalSkip, OrderByExpression, OrderByExpressionChain,
    PredeterminedReturn, Return, ReturnElement, ReturnElementChain,
};
pub use property::{
    ExistingProperty, NewProperty, OptionalProperties, OptionalPropertyMatch, Properties,
    PropertiesMatch, PropertyChain,
};
pub use remove::{
    Remove, RemoveClause, RemoveLabelExpression, RemovePropertyExpression, RemoveSubclause,
};
pub use root::{Index, OptionalWriteQuery, ReadClause, RootClause, WriteClause};
pub use set::{Set, SetClause, SetExpression, SetLabelExpression, SetPropertyExpression};
pub use subquery::{
    Collect, Count, Exists, SimpleSubqueryExpressionBody, SubqueryExpression,
    SubqueryExpressionBody, SubqueryExpressionBodyPart,
};
pub use transformation::{
    DeadCode, Falsum, FalsumPartition, NonexistentPattern, Tautum, TautumPartition,
};
pub use union::{Union, UnionClause};
pub use unwind::{Unwind, UnwindClause};
pub use with::{With, WithClause, WithElement, WithElementChain};

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::capture::Capturer;
    use crate::clause::ClauseKind;
    use crate::implementation::Target;
    use crate::model::Schema;
    use crate::render::generate_captured_statement;
    use crate::Seed;
    use strum::IntoEnumIterator;

    fn contains_kind(capturer: &Capturer, kind: ClauseKind) -> bool {
        capturer.clause().kind() == kind || capturer.children().iter().any(|c| contains_kind(c, kind))
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn every_target_generates(rng_seed in any::<u64>()) {
            for target in Target::iter() {
                let imp = target.implementation();
                let mut seed = Seed::from_rng_seed(rng_seed);
                let mut root = Capturer::new(RootClause);
                let mut s = Schema::new();
                if let Ok(statement) = generate_captured_statement(&mut seed, &mut s, &mut root, &imp, 5000) {
                    prop_assert!(!statement.trim().is_empty(), "{} rendered nothing", target);
                }
                prop_assert!(!contains_kind(&root, ClauseKind::Hook), "{} generated a test hook", target);
            }
        }
    }
}
