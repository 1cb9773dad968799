//! Boundary to the external image-processing engine.
//!
//! The orchestration code only needs one capability: submit a named macro with
//! string-keyed parameters and block until it completes or fails.

mod fiji;

use std::collections::BTreeMap;
use std::fmt::Debug;

pub use fiji::FijiEngine;

use crate::error::EngineError;

/// A named macro body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacroScript {
    name: String,
    source: String,
}

impl MacroScript {
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Names declared with `#@ String <name>` script parameters.
    pub fn parameter_names(&self) -> Vec<&str> {
        self.source
            .lines()
            .filter_map(|line| line.trim().strip_prefix("#@"))
            .filter_map(|decl| decl.split_whitespace().nth(1))
            .collect()
    }
}

/// Named string arguments of one macro run, ordered by key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MacroArgs(BTreeMap<String, String>);

impl MacroArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.0.insert(key.into(), value.to_string());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Executes macros against the engine. Calls block, with no timeout and no retry.
pub trait MacroEngine: Debug {
    fn run_macro(&self, script: &MacroScript, args: &MacroArgs) -> Result<(), EngineError>;
}

impl<E: MacroEngine + ?Sized> MacroEngine for &E {
    fn run_macro(&self, script: &MacroScript, args: &MacroArgs) -> Result<(), EngineError> {
        (**self).run_macro(script, args)
    }
}
