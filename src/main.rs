use clap::{Parser, Subcommand};
use miette::{miette, Result};
use std::path::PathBuf;

use flagfold::cli;
use flagfold::config::BitArgumentFunction;

#[derive(Parser)]
#[command(name = "flagfold")]
#[command(about = "Rewrites integer literals used as bit flags into symbolic enum flag expressions")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rewrite flag literals in C# sources
    Convert {
        /// File containing the enum declaration
        #[arg(long)]
        flags: PathBuf,

        /// Source files or directories
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// JSON options file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Name of the emitted has-flag method
        #[arg(long)]
        has_flag_method: Option<String>,

        /// Call whose argument is always a bit mask, as NAME:INDEX (repeatable)
        #[arg(long = "bit-argument")]
        bit_arguments: Vec<BitArgumentFunction>,

        /// Prefix for emitted names (defaults to the containing types and the enum name)
        #[arg(long)]
        qualifier: Option<String>,

        /// Directory for rewritten files
        #[arg(short, long, conflicts_with = "in_place")]
        output_dir: Option<PathBuf>,

        /// Overwrite the input files
        #[arg(long)]
        in_place: bool,

        /// Analyze only, write nothing
        #[arg(long)]
        dry_run: bool,

        /// Summary format (text, json)
        #[arg(long, default_value = "text")]
        report: String,

        /// Directory to save a timestamped diagnostic log in
        #[arg(long)]
        save_log: Option<PathBuf>,
    },

    /// Print the parsed flag set
    Inspect {
        /// File containing the enum declaration
        #[arg(long)]
        flags: PathBuf,

        /// Output format (json, text)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Print the decomposition of numbers
    Resolve {
        /// File containing the enum declaration
        #[arg(long)]
        flags: PathBuf,

        /// Numbers to resolve (decimal, 0x hex or 0b binary)
        #[arg(required = true, allow_hyphen_values = true)]
        numbers: Vec<String>,

        /// Prefix for emitted names
        #[arg(long)]
        qualifier: Option<String>,
    },
}

fn main() -> Result<()> {
    // Initialize logging
    env_logger::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Convert {
            flags,
            inputs,
            config,
            has_flag_method,
            bit_arguments,
            qualifier,
            output_dir,
            in_place,
            dry_run,
            report,
            save_log,
        } => {
            let args = cli::convert::ConvertArgs {
                flags_path: flags,
                inputs,
                config_path: config,
                has_flag_method,
                bit_arguments,
                qualifier,
                output_dir,
                in_place,
                dry_run,
                report,
                save_log,
            };
            cli::convert::convert(&args).map(|_| ()).map_err(|e| miette!("{}", e))
        }
        Commands::Inspect { flags, format } => cli::inspect::inspect(&flags, &format).map_err(|e| miette!("{}", e)),
        Commands::Resolve {
            flags,
            numbers,
            qualifier,
        } => cli::resolve::resolve(&flags, &numbers, qualifier.as_deref()).map_err(|e| miette!("{}", e)),
    }
}
