use std::{fs, path::Path, str::FromStr};

use anyhow::Context;
use cypher_generation::Target;
use garde::Validate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::dbms::ErrorMessageRegex;
use crate::mock::MockDriver;
use crate::runner::SessionConfig;
use crate::strategy::FuzzingStrategy;

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Validate)]
#[serde(deny_unknown_fields, default)]
pub struct FuzzProfile {
    /// Dialect the statements are generated for: `mock`, `memgraph` or `neo4j`
    #[garde(custom(known_target))]
    pub target: String,
    #[garde(skip)]
    pub strategy: FuzzingStrategy,
    /// Node budget per statement, 0 for unlimited
    #[garde(range(min = 0, max = 100_000))]
    pub max_ast_nodes: i64,
    #[garde(range(min = 1, max = 4096))]
    pub max_statements: usize,
    /// Repeat reductions until they stop changing the statements
    #[garde(skip)]
    pub full_reduction: bool,
    /// Error messages matching one of these are expected and not bugs
    #[garde(custom(valid_patterns))]
    pub ignored_errors: Vec<String>,
    /// Error messages matching one of these are bugs that were reported already
    #[garde(custom(valid_patterns))]
    pub reported_errors: Vec<String>,
    #[garde(dive)]
    pub mock: MockProfile,
}

impl Default for FuzzProfile {
    fn default() -> Self {
        Self {
            target: Target::Mock.to_string(),
            strategy: FuzzingStrategy::default(),
            max_ast_nodes: 500,
            max_statements: 64,
            full_reduction: false,
            ignored_errors: Vec::new(),
            reported_errors: Vec::new(),
            mock: MockProfile::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Validate)]
#[serde(deny_unknown_fields, default)]
pub struct MockProfile {
    /// Statements after which the mock ends a query
    #[garde(range(min = 1, max = 1024))]
    pub statements_per_query: usize,
    /// Answer every statement with its own text
    #[garde(skip)]
    pub echo: bool,
}

impl Default for MockProfile {
    fn default() -> Self {
        Self {
            statements_per_query: 4,
            echo: false,
        }
    }
}

impl MockProfile {
    pub fn driver(&self) -> MockDriver {
        let db = MockDriver::new(self.statements_per_query);
        if self.echo {
            db.echoing()
        } else {
            db
        }
    }
}

impl FuzzProfile {
    pub fn parse(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let contents =
            fs::read_to_string(path).with_context(|| format!("failed to read profile {}", path.display()))?;
        let profile: FuzzProfile = serde_json::from_str(&contents).context("failed to parse JSON profile")?;
        profile.validate()?;
        Ok(profile)
    }

    pub fn target(&self) -> anyhow::Result<Target> {
        Target::from_str(&self.target).with_context(|| format!("unknown target `{}`", self.target))
    }

    pub fn error_message_regex(&self) -> anyhow::Result<ErrorMessageRegex> {
        ErrorMessageRegex::new(&self.ignored_errors, &self.reported_errors)
            .context("invalid error message pattern")
    }

    pub fn session_config(&self) -> anyhow::Result<SessionConfig> {
        Ok(SessionConfig {
            target: self.target()?,
            strategy: self.strategy,
            max_ast_nodes: self.max_ast_nodes,
            max_statements: self.max_statements,
            regex: self.error_message_regex()?,
        })
    }

    /// The JSON schema of profile files.
    pub fn json_schema() -> String {
        let schema = schemars::schema_for!(FuzzProfile);
        // A derived schema always serializes.
        serde_json::to_string_pretty(&schema).unwrap_or_default()
    }
}

fn known_target(value: &String, _: &()) -> garde::Result {
    Target::from_str(value)
        .map(|_| ())
        .map_err(|_| garde::Error::new(format!("`{value}` is not one of mock, memgraph, neo4j")))
}

fn valid_patterns(value: &Vec<String>, _: &()) -> garde::Result {
    for pattern in value {
        if let Err(e) = regex::Regex::new(pattern) {
            return Err(garde::Error::new(format!("`{pattern}` is not a valid pattern: {e}")));
        }
    }
    Ok(())
}
