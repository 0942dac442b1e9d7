use super::utils::read_file;
use crate::error::{Error, Result};
use crate::flags::{Decomposition, FlagSet};
use std::path::Path;

/// Run the resolve subcommand
pub fn resolve(flags_path: &Path, numbers: &[String], qualifier: Option<&str>) -> Result<()> {
    let mut flag_set = FlagSet::build(&read_file(flags_path)?)?;
    let qualifier = qualifier.map_or_else(|| flag_set.type_qualifier(), str::to_string);
    flag_set.set_qualifier(qualifier);

    for text in numbers {
        let number = parse_number(text)?;
        println!("{} => {}", text, describe(&flag_set, number));
    }
    Ok(())
}

fn describe(flag_set: &FlagSet, number: i64) -> String {
    let decomposition = flag_set.resolve(number);
    match &decomposition {
        Decomposition::Unresolved { missing_bits, .. } => {
            let partial = flag_set.render(&decomposition);
            if partial.is_empty() {
                format!("unresolved (no entry for bit(s) {:?})", missing_bits)
            } else {
                format!("unresolved (no entry for bit(s) {:?}; resolved part: {})", missing_bits, partial)
            }
        }
        _ => flag_set.render(&decomposition),
    }
}

/// Decimal, `0x` hex or `0b` binary
pub fn parse_number(text: &str) -> Result<i64> {
    let cleaned = text.trim().replace('_', "");
    let parsed = if let Some(hex) = cleaned.strip_prefix("0x").or_else(|| cleaned.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16)
    } else if let Some(bin) = cleaned.strip_prefix("0b").or_else(|| cleaned.strip_prefix("0B")) {
        i64::from_str_radix(bin, 2)
    } else {
        cleaned.parse::<i64>()
    };
    parsed.map_err(|e| Error::Config {
        message: format!("invalid number `{}`: {}", text, e),
    })
}
