use super::utils::{collect_sources, read_file, write_output, InputSource};
use crate::config::{BitArgumentFunction, ConvertOptions};
use crate::converter::{Converter, RunSummary, SourceDocument};
use crate::error::{Error, Result};
use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

/// Arguments for the convert command
#[derive(Debug, Clone)]
pub struct ConvertArgs {
    pub flags_path: PathBuf,
    pub inputs: Vec<PathBuf>,
    pub config_path: Option<PathBuf>,
    pub has_flag_method: Option<String>,
    pub bit_arguments: Vec<BitArgumentFunction>,
    pub qualifier: Option<String>,
    pub output_dir: Option<PathBuf>,
    pub in_place: bool,
    pub dry_run: bool,
    pub report: String,
    pub save_log: Option<PathBuf>,
}

impl ConvertArgs {
    /// Config file first, then command line overrides
    pub fn to_options(&self) -> Result<ConvertOptions> {
        let mut options = match &self.config_path {
            Some(path) => ConvertOptions::from_json_file(path)?,
            None => ConvertOptions::default(),
        };
        if let Some(method) = &self.has_flag_method {
            options.has_flag_method = method.clone();
        }
        for function in &self.bit_arguments {
            options.bit_argument_functions.retain(|f| f.name != function.name);
            options.bit_argument_functions.push(function.clone());
        }
        if self.qualifier.is_some() {
            options.qualifier = self.qualifier.clone();
        }
        Ok(options)
    }
}

/// Run the convert subcommand
pub fn convert(args: &ConvertArgs) -> Result<RunSummary> {
    let options = args.to_options()?;
    let declaration = read_file(&args.flags_path)?;

    let sources = collect_sources(&args.inputs)?;
    if sources.is_empty() {
        return Err(Error::Config {
            message: "no input sources given".to_string(),
        });
    }
    let documents = sources
        .iter()
        .map(|source| SourceDocument::from_path(&source.path))
        .collect::<Result<Vec<_>>>()?;

    let mut converter = Converter::new(options);
    let summary = converter.run(&declaration, &documents)?;

    if !args.dry_run {
        write_documents(args, &sources, &summary)?;
    }

    match args.report.as_str() {
        "json" => {
            let json = serde_json::to_string_pretty(&summary).map_err(|e| Error::Internal {
                message: format!("Failed to serialize summary to JSON: {}", e),
            })?;
            write_output(&json, None)?;
        }
        "text" => write_output(&text_report(&summary), None)?,
        other => {
            return Err(Error::Config {
                message: format!("unknown report format `{}` (expected json or text)", other),
            })
        }
    }

    if let Some(dir) = &args.save_log {
        let path = save_log(dir, &summary)?;
        log::info!("Saved log to {}", path.display());
    }

    Ok(summary)
}

/// Changed documents go back in place, into the output directory, or to stdout
fn write_documents(args: &ConvertArgs, sources: &[InputSource], summary: &RunSummary) -> Result<()> {
    let targets = match &args.output_dir {
        Some(dir) if !args.in_place => output_paths(dir, sources)?,
        _ => Vec::new(),
    };

    for (index, document) in summary.documents.iter().enumerate() {
        if !document.is_changed() {
            continue;
        }
        if args.in_place {
            write_output(&document.rewritten, Some(Path::new(&document.name)))?;
        } else if let Some(target) = targets.get(index) {
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            write_output(&document.rewritten, Some(target))?;
        } else if args.report == "text" {
            write_output(&format!("// {}\n{}", document.name, document.rewritten), None)?;
        }
    }
    Ok(())
}

/// Output path of every input under `dir`; two inputs may not share one
fn output_paths(dir: &Path, sources: &[InputSource]) -> Result<Vec<PathBuf>> {
    let mut claimed: HashMap<PathBuf, &Path> = HashMap::new();
    let mut targets = Vec::with_capacity(sources.len());
    for source in sources {
        let target = dir.join(&source.relative);
        if let Some(previous) = claimed.insert(target.clone(), &source.path) {
            return Err(Error::Config {
                message: format!(
                    "{} and {} would both be written to {}",
                    previous.display(),
                    source.path.display(),
                    target.display()
                ),
            });
        }
        targets.push(target);
    }
    Ok(targets)
}

fn text_report(summary: &RunSummary) -> String {
    let mut out = String::new();
    for diagnostic in &summary.diagnostics {
        let _ = writeln!(out, "{}", diagnostic);
    }
    let _ = writeln!(out, "Replaced {} nodes", summary.replaced);
    let _ = writeln!(out, "Warnings: {}", summary.warnings);
    let _ = write!(out, "Errors: {}", summary.errors);
    out
}

/// Write the diagnostics to `<dir>/<timestamp>.txt`
fn save_log(dir: &Path, summary: &RunSummary) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let stamp = chrono::Local::now().format("%Y-%m-%d %H-%M-%S");
    let path = dir.join(format!("{}.txt", stamp));
    std::fs::write(&path, text_report(summary))?;
    Ok(path)
}
