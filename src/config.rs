//! Conversion options
//!
//! Options come from an optional JSON file and are then overridden by command
//! line flags (see `cli::convert::ConvertArgs::to_options`).

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

/// A call whose argument at `argument` is always a bit mask of the flag set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BitArgumentFunction {
    pub name: String,
    pub argument: usize,
}

impl FromStr for BitArgumentFunction {
    type Err = Error;

    /// `NAME:INDEX`, e.g. `SetBit:1`
    fn from_str(s: &str) -> Result<Self> {
        let (name, index) = s.rsplit_once(':').ok_or_else(|| Error::Config {
            message: format!("expected NAME:INDEX, got `{}`", s),
        })?;
        let argument = index.trim().parse::<usize>().map_err(|e| Error::Config {
            message: format!("invalid argument index in `{}`: {}", s, e),
        })?;
        if name.trim().is_empty() {
            return Err(Error::Config {
                message: format!("missing function name in `{}`", s),
            });
        }
        Ok(Self {
            name: name.trim().to_string(),
            argument,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvertOptions {
    /// Method emitted for has-flag tests, e.g. `x.HasFlag(F.A)`
    pub has_flag_method: String,
    /// Pure conversion calls that may wrap a literal or the subject
    pub conversion_calls: Vec<String>,
    /// Identifiers of stateless static classes
    pub static_containers: Vec<String>,
    pub bit_argument_functions: Vec<BitArgumentFunction>,
    /// Prefix for emitted names; defaults to the containing types plus the enum name
    pub qualifier: Option<String>,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            has_flag_method: "HasFlag".to_string(),
            conversion_calls: [
                "Asc_C",
                "erfz25",
                "erfz25.Asc_C",
                "Conversions",
                "ToInteger",
                "ToShort",
                "ToChar",
                "ToString",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            static_containers: ["Conversions", "Math", "Convert"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            bit_argument_functions: Vec::new(),
            qualifier: None,
        }
    }
}

impl ConvertOptions {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("cannot read {}: {}", path.display(), e),
        })?;
        let options = Self::from_json_str(&text)?;
        log::debug!("Loaded options from {}", path.display());
        Ok(options)
    }

    pub fn bit_argument_index(&self, function: &str) -> Option<usize> {
        self.bit_argument_functions
            .iter()
            .find(|f| f.name == function)
            .map(|f| f.argument)
    }

    pub fn is_static_container(&self, name: &str) -> bool {
        self.static_containers.iter().any(|c| c == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let options = ConvertOptions::from_json_str(
            r#"{ "has_flag_method": "Contains", "bit_argument_functions": [{ "name": "SetBit", "argument": 1 }] }"#,
        )
        .unwrap();
        assert_eq!(options.has_flag_method, "Contains");
        assert_eq!(options.bit_argument_index("SetBit"), Some(1));
        assert!(options.conversion_calls.contains(&"ToInteger".to_string()));
        assert!(options.is_static_container("Math"));
    }

    #[test]
    fn test_bit_argument_from_str() {
        let f: BitArgumentFunction = "SetBit:1".parse().unwrap();
        assert_eq!(f.name, "SetBit");
        assert_eq!(f.argument, 1);
        assert!("NoIndex".parse::<BitArgumentFunction>().is_err());
        assert!(":2".parse::<BitArgumentFunction>().is_err());
    }
}
