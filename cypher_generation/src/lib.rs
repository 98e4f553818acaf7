//! Grammar-driven generation of OpenCypher statements.
//!
//! Statements are generated from a tree of [Clause]s, each drawing its
//! decisions from a [Seed] and keeping the typed [Schema] up to date so that
//! what follows stays valid. Wrapping clauses in [Capturer]s freezes what they
//! generated, which lets strategies transform or shrink single nodes of a
//! statement while everything else renders unchanged.

pub mod capture;
pub mod clause;
pub mod clauses;
pub mod implementation;
pub mod model;
pub mod render;
pub mod seed;

pub use capture::Capturer;
pub use clause::{Clause, ClauseKind, Production};
pub use implementation::{Implementation, Target};
pub use model::Schema;
pub use render::{generate_captured_statement, generate_statement, GenerationError};
pub use seed::{Seed, SeedError};
