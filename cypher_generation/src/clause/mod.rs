//! The clause model.
//!
//! A [Clause] is one grammar production. Generating it yields its children,
//! which the renderer expands recursively and interpolates into the clause's
//! template. Every production implements [Production]; capabilities other than
//! `generate` default to "absent".

use std::borrow::Cow;

use crate::capture::Capturer;
use crate::clauses::*;
use crate::implementation::{memgraph, neo4j, Implementation};
use crate::model::Schema;
use crate::Seed;

mod helpers;
#[cfg(test)]
mod hook;
pub mod template;

pub use helpers::{Assembler, EmptyClause, Stringer, TransformedClause};
#[cfg(test)]
pub(crate) use hook::HookClause;

/// Capabilities of a single grammar production.
pub trait Production {
    /// Generates the children of this clause. May read and mutate the schema.
    fn generate(&mut self, seed: &mut Seed, s: &mut Schema, imp: &Implementation) -> Vec<Clause>;

    /// How rendered children are combined. `None` concatenates them.
    fn template(&self) -> Option<Cow<'_, str>> {
        None
    }

    /// Runs after every child has been rendered.
    fn modify_schema(&mut self, _s: &mut Schema) {}

    /// Whether [Production::transform] may produce an equivalent clause.
    fn is_transformer(&self) -> bool {
        false
    }

    /// Returns a semantically equivalent clause, given the schema this clause
    /// was first generated with and its generated children.
    ///
    /// The schema is the one the replacement will be generated with, so
    /// changes to it carry over.
    fn transform(
        &self,
        _seed: &mut Seed,
        _s: &mut Schema,
        _children: &[Capturer],
        _imp: &Implementation,
    ) -> Option<Clause> {
        None
    }

    /// A smaller clause to try in place of `this` during reduction.
    fn no_strategy_reduce(&self, _this: &Capturer) -> Option<Clause> {
        None
    }
}

macro_rules! clauses {
    ($($(#[$meta:meta])* $variant:ident($ty:ty)),* $(,)?) => {
        /// Every production of the grammar, including the target specific ones.
        #[derive(Debug, Clone, PartialEq, strum::EnumDiscriminants)]
        #[strum_discriminants(name(ClauseKind), derive(Hash, strum::Display))]
        pub enum Clause {
            $($(#[$meta])* $variant($ty),)*
            /// A node that keeps its generation result across renders.
            Captured(Box<Capturer>),
        }

        impl Clause {
            fn production(&self) -> &dyn Production {
                match self {
                    $($(#[$meta])* Clause::$variant(c) => c,)*
                    Clause::Captured(c) => c.as_ref(),
                }
            }

            fn production_mut(&mut self) -> &mut dyn Production {
                match self {
                    $($(#[$meta])* Clause::$variant(c) => c,)*
                    Clause::Captured(c) => c.as_mut(),
                }
            }
        }

        $(
            $(#[$meta])*
            impl From<$ty> for Clause {
                fn from(clause: $ty) -> Self {
                    Clause::$variant(clause)
                }
            }
        )*
    };
}

clauses! {
    Empty(EmptyClause),
    Stringer(Stringer),
    Assembler(Assembler),
    #[cfg(test)]
    Hook(HookClause),
    Transformed(TransformedClause),

    RootClause(RootClause),
    ReadClause(ReadClause),
    WriteClause(WriteClause),
    OptionalWriteQuery(OptionalWriteQuery),
    Index(Index),
    ConstraintPropertyChain(ConstraintPropertyChain),
    ConstraintProperty(ConstraintProperty),

    Match(Match),
    MatchClause(MatchClause),
    MatchElementChain(MatchElementChain),
    OptionalWhereClause(OptionalWhereClause),
    WhereClause(WhereClause),
    WhereExpression(WhereExpression),

    PathPatternExpression(PathPatternExpression),
    MatchNode(MatchNode),
    MatchRelationship(MatchRelationship),
    TransformablePath(TransformablePath),
    ReversiblePath(ReversiblePath),
    CyclicPath(CyclicPath),

    Labels(Labels),
    Label(Label),
    LabelName(LabelName),
    NewLabel(NewLabel),
    ExistingLabel(ExistingLabel),
    LabelMatch(LabelMatch),
    OptionalLabelMatch(OptionalLabelMatch),

    StructureName(StructureName),
    OptionalStructureName(OptionalStructureName),
    PropertyName(PropertyName),

    Create(Create),
    CreateClause(CreateClause),
    CreateElementChain(CreateElementChain),
    CreateElement(CreateElement),
    CreatePathElement(CreatePathElement),
    CreateNode(CreateNode),
    CreateNewNode(CreateNewNode),
    CreateExistingNode(CreateExistingNode),

    Delete(Delete),
    DeleteClause(DeleteClause),
    DeleteElementChain(DeleteElementChain),
    WriteTarget(WriteTarget),

    Set(Set),
    SetClause(SetClause),
    SetExpression(SetExpression),
    SetPropertyExpression(SetPropertyExpression),
    SetLabelExpression(SetLabelExpression),

    Remove(Remove),
    RemoveClause(RemoveClause),
    RemoveSubclause(RemoveSubclause),
    RemovePropertyExpression(RemovePropertyExpression),
    RemoveLabelExpression(RemoveLabelExpression),

    Merge(Merge),
    MergeClause(MergeClause),

    Properties(Properties),
    PropertyChain(PropertyChain),
    OptionalProperties(OptionalProperties),
    NewProperty(NewProperty),
    ExistingProperty(ExistingProperty),
    OptionalPropertyMatch(OptionalPropertyMatch),
    PropertiesMatch(PropertiesMatch),

    PropertyLiteral(PropertyLiteral),
    StringLiteral(StringLiteral),

    Expression(Expression),
    VariableExpression(VariableExpression),
    OperatorApplicationExpression(OperatorApplicationExpression),
    FunctionApplicationExpression(FunctionApplicationExpression),
    CountFunction(CountFunction),

    Predicate(Predicate),
    PredicatePrefix(PredicatePrefix),

    CaseExpression(CaseExpression),
    SimpleCaseExpression(SimpleCaseExpression),
    GenericCaseExpression(GenericCaseExpression),
    CaseExpressionWhen(CaseExpressionWhen),
    CaseExpressionElse(CaseExpressionElse),

    ListExpression(ListExpression),
    ListLiteral(ListLiteral),
    ListLiteralItem(ListLiteralItem),
    ListComprehension(ListComprehension),
    ListComprehensionPrefix(ListComprehensionPrefix),
    ListComprehensionSuffix(ListComprehensionSuffix),

    Return(Return),
    ReturnElementChain(ReturnElementChain),
    ReturnElement(ReturnElement),
    PredeterminedReturn(PredeterminedReturn),
    OptionalOrderBy(OptionalOrderBy),
    OrderByExpressionChain(OrderByExpressionChain),
    OrderByExpression(OrderByExpression),
    OptionalSkip(OptionalSkip),
    OptionalLimit(OptionalLimit),

    With(With),
    WithClause(WithClause),
    WithElementChain(WithElementChain),
    WithElement(WithElement),

    Unwind(Unwind),
    UnwindClause(UnwindClause),

    CallSubquery(CallSubquery),
    CallSubqueryClause(CallSubqueryClause),
    CallSubqueryWith(CallSubqueryWith),

    Union(Union),
    UnionClause(UnionClause),

    Foreach(Foreach),
    ForeachClause(ForeachClause),
    ForeachVariable(ForeachVariable),
    ForeachCommand(ForeachCommand),

    Exists(Exists),
    Count(Count),
    Collect(Collect),
    SimpleSubqueryExpressionBody(SimpleSubqueryExpressionBody),
    SubqueryExpression(SubqueryExpression),
    SubqueryExpressionBody(SubqueryExpressionBody),
    SubqueryExpressionBodyPart(SubqueryExpressionBodyPart),

    Tautum(Tautum),
    Falsum(Falsum),
    TautumPartition(TautumPartition),
    FalsumPartition(FalsumPartition),
    DeadCode(DeadCode),
    NonexistentPattern(NonexistentPattern),

    MemgraphIndex(memgraph::Index),
    MemgraphIndexOnLabel(memgraph::IndexOnLabel),
    MemgraphIndexOnProperty(memgraph::IndexOnProperty),
    MemgraphConstraint(memgraph::Constraint),

    Neo4jRootClause(neo4j::RootClause),
    Runtime(neo4j::Runtime),
    Neo4jIndex(neo4j::Index),
    IndexOnProperties(neo4j::IndexOnProperties),
    IndexOnPropertiesProperties(neo4j::IndexOnPropertiesProperties),
    IndexOnLabels(neo4j::IndexOnLabels),
    Neo4jIndexOnProperty(neo4j::IndexOnProperty),
    Neo4jConstraint(neo4j::Constraint),
    NodeConstraint(neo4j::NodeConstraint),
    RelationshipConstraint(neo4j::RelationshipConstraint),
}

impl Clause {
    pub fn kind(&self) -> ClauseKind {
        ClauseKind::from(self)
    }

    /// Shorthand for a [Stringer] clause.
    pub fn stringer(value: impl AsRef<str>) -> Self {
        Stringer::new(value.as_ref()).into()
    }

    /// Shorthand for an [Assembler] clause.
    pub fn assembler(template: impl Into<String>, children: Vec<Clause>) -> Self {
        Assembler::new(template, children).into()
    }

    pub fn empty() -> Self {
        EmptyClause.into()
    }

    /// Wraps a (copy of a) capturer so it renders with its captured result.
    pub fn captured(capturer: Capturer) -> Self {
        Clause::Captured(Box::new(capturer))
    }

    pub fn as_captured(&self) -> Option<&Capturer> {
        match self {
            Clause::Captured(c) => Some(c),
            _ => None,
        }
    }
}

impl From<Capturer> for Clause {
    fn from(capturer: Capturer) -> Self {
        Clause::captured(capturer)
    }
}

impl Production for Clause {
    fn generate(&mut self, seed: &mut Seed, s: &mut Schema, imp: &Implementation) -> Vec<Clause> {
        self.production_mut().generate(seed, s, imp)
    }

    fn template(&self) -> Option<Cow<'_, str>> {
        self.production().template()
    }

    fn modify_schema(&mut self, s: &mut Schema) {
        self.production_mut().modify_schema(s)
    }

    fn is_transformer(&self) -> bool {
        self.production().is_transformer()
    }

    fn transform(
        &self,
        seed: &mut Seed,
        s: &mut Schema,
        children: &[Capturer],
        imp: &Implementation,
    ) -> Option<Clause> {
        self.production().transform(seed, s, children, imp)
    }

    fn no_strategy_reduce(&self, this: &Capturer) -> Option<Clause> {
        self.production().no_strategy_reduce(this)
    }
}
