//! Flag set model
//!
//! A flag set is an ordered list of named integer entries built once per run
//! from declaration text. It maps integers back onto entries (`resolve`) and
//! renders the result as qualified, `|`-joined symbol names (`render`).

pub mod declaration;
pub mod flag_set;

pub use flag_set::{Decomposition, FlagEntry, FlagSet, FlagSetIdentity};
