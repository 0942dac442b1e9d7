use miette::Diagnostic;
use thiserror::Error;

/// Result type for conversion operations
pub type Result<T> = std::result::Result<T, Error>;

/// Fatal error types for a flag conversion run
///
/// Per-node problems (unresolved bits, ambiguous expressions, ...) are not
/// errors in this sense: they are recorded as diagnostics on the run context
/// and the run carries on with the next candidate.
#[derive(Error, Debug, Diagnostic, Clone, PartialEq)]
pub enum Error {
    #[error("I/O error: {0}")]
    #[diagnostic(code(flagfold::io_error))]
    Io(String),

    #[error("Parse error at {line}:{column}: {message}")]
    #[diagnostic(code(flagfold::parse_error))]
    Parse {
        line: usize,
        column: usize,
        message: String,
    },

    #[error("No valid enum declaration has been provided")]
    #[diagnostic(
        code(flagfold::no_flag_set),
        help("the flag declaration must contain an `enum Name {{ ... }}` block")
    )]
    NoFlagSet,

    #[error("Enum {name} has no members")]
    #[diagnostic(code(flagfold::empty_flag_set))]
    EmptyFlagSet { name: String },

    #[error("Invalid enum member {member}: {message}")]
    #[diagnostic(code(flagfold::invalid_entry))]
    InvalidEntry { member: String, message: String },

    #[error("No matching enum {name} found in the input sources")]
    #[diagnostic(code(flagfold::flag_set_not_found))]
    FlagSetNotFound { name: String },

    #[error("The provided enum and the enum {name} in {location} do not match")]
    #[diagnostic(code(flagfold::identity_mismatch))]
    IdentityMismatch { name: String, location: String },

    #[error("Invalid configuration: {message}")]
    #[diagnostic(code(flagfold::config_error))]
    Config { message: String },

    #[error("Could not apply edits to {document}: {message}")]
    #[diagnostic(code(flagfold::sink_error))]
    Sink { document: String, message: String },

    #[error("Internal error: {message}")]
    #[diagnostic(code(flagfold::internal_error))]
    Internal { message: String },
}

impl Error {
    /// Create a parse error at a line/column position
    pub fn parse(line: usize, column: usize, message: impl Into<String>) -> Self {
        Error::Parse {
            line,
            column,
            message: message.into(),
        }
    }

    /// Create an invalid entry error
    pub fn invalid_entry(member: impl Into<String>, message: impl Into<String>) -> Self {
        Error::InvalidEntry {
            member: member.into(),
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Error::Internal {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Config {
            message: err.to_string(),
        }
    }
}
