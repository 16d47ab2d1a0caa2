//! Options module: configuration for predicate parsing and compilation.
//!
//! This module provides MatcherOptions and its builder.

use serde::{Deserialize, Serialize};

/// Largest bit position accepted by default; positions are stored as 32-bit signed ints upstream.
pub const DEFAULT_MAX_BIT_POSITION: u32 = i32::MAX as u32;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
#[non_exhaustive]
pub struct MatcherOptions {
    /// Accept the deprecated `$bitsSet` / `$bitsClear` spellings.
    pub allow_legacy_operators: bool,
    pub max_bit_position: u32,
}

impl Default for MatcherOptions {
    fn default() -> Self {
        Self {
            allow_legacy_operators: true,
            max_bit_position: DEFAULT_MAX_BIT_POSITION,
        }
    }
}

impl MatcherOptions {
    pub fn builder() -> MatcherOptionsBuilder {
        MatcherOptionsBuilder::new()
    }
}

#[derive(Debug, Default)]
pub struct MatcherOptionsBuilder {
    options: MatcherOptions,
}

impl MatcherOptionsBuilder {
    pub fn new() -> Self {
        Self { options: MatcherOptions::default() }
    }
    pub fn allow_legacy_operators(mut self, allow: bool) -> Self {
        self.options.allow_legacy_operators = allow;
        self
    }
    pub fn max_bit_position(mut self, max: u32) -> Self {
        self.options.max_bit_position = max;
        self
    }
    pub fn build(self) -> MatcherOptions {
        self.options
    }
}
