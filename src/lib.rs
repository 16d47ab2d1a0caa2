//! Bitfilter: bit-test predicate evaluation for document queries.
//!
//! Decides, for one stored field value and one bitmask, whether a document satisfies
//! `$bitsAllSet`, `$bitsAllClear`, `$bitsAnySet` or `$bitsAnyClear` (plus the legacy
//! `$bitsSet` / `$bitsClear` spellings). Values may be signed 64-bit integers, read as
//! two's complement, or binary blobs of any length; masks may be integers, lists of bit
//! positions, or blobs.
//!
//! # Architecture
//! - Document model and field access (`types`, `context`)
//! - Mask parsing, validation and normalization (`mask`)
//! - Field value classification (`extract`)
//! - The four bit relations (`eval`)
//! - Predicate parsing into an AST (`expr`)
//! - Compilation to closures and execution (`compiler`, `filter`)
//!
//! No index can answer a bit test, so a compiled filter reports itself as a residual filter and
//! is run against every candidate document the scan produces.

mod types;
mod context;
mod options;
mod mask;
mod extract;
mod eval;
mod expr;
mod compiler;
mod filter;

pub use types::*;
pub use context::*;
pub use options::*;
pub use mask::*;
pub use extract::*;
pub use eval::*;
pub use expr::*;
pub use compiler::*;
pub use filter::*;

use thiserror::Error;

/// Unified error type for Bitfilter operations. Every variant is raised while compiling a
/// query; evaluating a compiled filter cannot fail.
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum BitfilterError {
    #[error("{operator}: {source}")]
    InvalidOperand {
        operator: String,
        source: ValidationError,
    },
    #[error("Parse error: {0}")]
    ParseError(String),
}
