//! dbmlkit CLI - DBML schema toolkit

mod args;
mod config;
mod output;

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use dbmlkit_core::{Schema, Target};
use miette::{IntoDiagnostic, Result};
use tracing_subscriber::EnvFilter;

use crate::args::{Args, Command};
use crate::config::Config;

fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.verbose, args.quiet);

    match run(args) {
        Ok(has_errors) => {
            if has_errors {
                ExitCode::from(1)
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(e) => {
            eprintln!("Error: {:?}", e);
            ExitCode::from(2)
        }
    }
}

fn init_tracing(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, _) => "debug",
    };
    let filter = if verbose > 0 || quiet {
        EnvFilter::new(level)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Expand glob patterns; plain paths are kept as given
fn expand(patterns: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for pattern in patterns {
        let pattern_str = pattern.display().to_string();
        if pattern_str.contains(['*', '?', '[']) {
            for path in glob::glob(&pattern_str).into_diagnostic()?.flatten() {
                files.push(path);
            }
        } else {
            files.push(pattern.clone());
        }
    }
    if files.is_empty() {
        miette::bail!("No schema files matched. Pass DBML files or configure `schema` in dbmlkit.toml");
    }
    Ok(files)
}

/// Parse one file. `None` means the error was already reported.
fn load(path: &Path) -> Result<Option<Schema>> {
    let content = fs::read_to_string(path).into_diagnostic()?;
    match dbmlkit_core::parse_str(&content) {
        Ok(schema) => {
            tracing::info!(file = %path.display(), tables = schema.len(), "schema loaded");
            Ok(Some(schema))
        }
        Err(e) => {
            output::print_error(&path.display().to_string(), e);
            Ok(None)
        }
    }
}

fn render(schema: &Schema, target: Target) -> std::result::Result<String, dbmlkit_core::Error> {
    Ok(match target {
        Target::Sql => schema.sql()?,
        Target::Dbml => schema.dbml()?,
        Target::Json => serde_json::to_string_pretty(schema).map_err(std::io::Error::from)?,
    })
}

/// Render every file to one target; documents are separated by a blank line.
fn convert(files: &[PathBuf], target: Target, out: Option<&Path>) -> Result<bool> {
    let mut documents = Vec::new();
    let mut has_errors = false;

    for path in expand(files)? {
        let Some(schema) = load(&path)? else {
            has_errors = true;
            continue;
        };
        match render(&schema, target) {
            Ok(text) => documents.push(text),
            Err(e) => {
                output::print_error(&path.display().to_string(), e);
                has_errors = true;
            }
        }
    }

    let mut text = documents.join("\n\n");
    text.push('\n');
    match out {
        Some(out) => fs::write(out, text).into_diagnostic()?,
        None => print!("{}", text),
    }
    Ok(has_errors)
}

fn run(args: Args) -> Result<bool> {
    let quiet = args.quiet;
    match args.command {
        Command::Sql { files, output } => convert(&files, Target::Sql, output.as_deref()),

        Command::Dbml { files, output } => convert(&files, Target::Dbml, output.as_deref()),

        Command::Check { files } => {
            let files = expand(&files)?;
            let mut failed = 0;
            for path in &files {
                if load(path)?.is_none() {
                    failed += 1;
                }
            }

            if !quiet {
                if failed > 0 {
                    eprintln!();
                    eprintln!("Found errors in {} of {} file(s)", failed, files.len());
                } else {
                    eprintln!("All {} file(s) passed validation", files.len());
                }
            }
            Ok(failed > 0)
        }

        Command::Schema { files, json } => {
            let mut has_errors = false;
            for path in expand(&files)? {
                let Some(schema) = load(&path)? else {
                    has_errors = true;
                    continue;
                };
                if json {
                    println!("{}", output::json(&schema)?);
                } else {
                    print!("{}", output::summary(&schema));
                }
            }
            Ok(has_errors)
        }

        Command::Build {
            files,
            config: config_path,
            out_dir,
            targets,
        } => {
            let config = if let Some(path) = config_path {
                Config::from_file(&path)?
            } else {
                Config::find_and_load()?.unwrap_or_default()
            };

            let targets: Vec<Target> = targets.into_iter().map(Target::from).collect();
            let config = config.merge_with_args(&files, &out_dir, &targets);
            let targets = config.parsed_targets()?;

            let schema_files: Vec<PathBuf> = config.schema.iter().map(PathBuf::from).collect();
            let out_dir = PathBuf::from(&config.out_dir);
            fs::create_dir_all(&out_dir).into_diagnostic()?;

            let mut has_errors = false;
            for path in expand(&schema_files)? {
                let Some(schema) = load(&path)? else {
                    has_errors = true;
                    continue;
                };
                let stem = path
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "schema".to_string());

                for target in &targets {
                    let text = match render(&schema, *target) {
                        Ok(text) => text,
                        Err(e) => {
                            output::print_error(&path.display().to_string(), e);
                            has_errors = true;
                            continue;
                        }
                    };
                    let out = out_dir.join(format!("{}.{}", stem, target.extension()));
                    fs::write(&out, format!("{}\n", text)).into_diagnostic()?;
                    if !quiet {
                        eprintln!("wrote {}", out.display());
                    }
                }
            }
            Ok(has_errors)
        }
    }
}
