pub mod config;
pub mod schema;
pub mod types;

pub use config::GenerationConfig;
pub use schema::{GraphState, Property, PropertyVariable, Schema, StructuralVariable};
pub use types::{
    ExpressionConfig, ExpressionType, Function, PropertyType, StructuralType, LIST_MASK,
    NON_NULL_MASK,
};
