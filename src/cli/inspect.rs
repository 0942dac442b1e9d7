use super::utils::read_file;
use crate::error::{Error, Result};
use crate::flags::FlagSet;
use std::fmt::Write;
use std::path::Path;

/// Run the inspect subcommand
pub fn inspect(flags_path: &Path, format: &str) -> Result<()> {
    let flag_set = FlagSet::build(&read_file(flags_path)?)?;

    let output = match format {
        "json" => serde_json::to_string_pretty(&flag_set).map_err(|e| Error::Internal {
            message: format!("Failed to serialize flag set to JSON: {}", e),
        })?,
        "text" => render_text(&flag_set),
        other => {
            return Err(Error::Config {
                message: format!("unknown format `{}` (expected json or text)", other),
            })
        }
    };
    println!("{}", output);
    Ok(())
}

fn render_text(flag_set: &FlagSet) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "enum {}{}",
        flag_set.metadata_name(),
        if flag_set.has_flags_attribute() { " [Flags]" } else { "" }
    );
    for entry in flag_set.entries() {
        match entry.bit {
            Some(bit) => {
                let _ = writeln!(out, "  {} = {} (bit {})", entry.name, entry.value, bit);
            }
            None => {
                let _ = writeln!(out, "  {} = {:#x}", entry.name, entry.value);
            }
        }
    }
    if !flag_set.has_zero_entry() {
        out.push_str("  (no zero entry)\n");
    }
    out.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_text_lists_bits() {
        let flag_set = FlagSet::build("[Flags] enum F { A = 1, B = 2, AB = A | B }").unwrap();
        let text = render_text(&flag_set);
        assert!(text.starts_with("enum F [Flags]"));
        assert!(text.contains("  B = 2 (bit 1)"));
        assert!(text.contains("  AB = 0x3"));
        assert!(text.ends_with("(no zero entry)"));
    }
}
