//! flagfold: rewrites integer literals used as bit flags into symbolic enum flag expressions
//!
//! This library parses C#-style sources, finds the places where a `[Flags]`
//! enum is handled as a plain integer, and rewrites those integers into
//! `Enum.A | Enum.B` expressions or `x.HasFlag(...)` tests.

pub mod analysis;
pub mod cli;
pub mod config;
pub mod converter;
pub mod error;
pub mod flags;
pub mod locator;
pub mod rewrite;
pub mod syntax;

pub use converter::{rewrite_expression, Converter, RunSummary, SourceDocument};
pub use error::{Error as FlagfoldError, Result as FlagfoldResult};

// Re-export commonly used types
pub use analysis::{Classifier, Outcome};
pub use config::ConvertOptions;
pub use flags::{Decomposition, FlagEntry, FlagSet};
pub use rewrite::{Diagnostic, DiagnosticKind, RunContext};
