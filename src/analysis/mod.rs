//! Expression analysis
//!
//! This module answers the questions the rewrite engine asks about an
//! expression:
//! - Constant folding of integer, char, string and boolean expressions
//! - Static types of identifiers, as bound by the locator
//! - Ambiguity and duplicate-bit guards
//! - Classification of literals that stand for flag values

pub mod classifier;
pub mod constant_folding;
pub mod guards;
pub mod oracle;
pub mod semantic;

pub use classifier::{Classifier, Outcome};
pub use constant_folding::{ConstantFolder, ConstantValue, NameResolver};
pub use guards::{DuplicateBits, GuardVerdict};
pub use oracle::{ConstantOracle, OracleAdapter, SemanticOracle, TypeHandle};
pub use semantic::SemanticModel;
