//! Rewriting: run state, the change ledger, the engine and mutation sinks

pub mod context;
pub mod engine;
pub mod sink;

pub use context::{ChangeLedger, Diagnostic, DiagnosticKind, Location, RunContext, Severity};
pub use engine::{RewriteEngine, RewriteOutcome};
pub use sink::{MutationSink, SinkError, TextEdit, TextEditSink};
