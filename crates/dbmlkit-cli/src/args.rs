//! CLI argument definitions

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use dbmlkit_core::Target;

#[derive(Parser)]
#[command(name = "dbmlkit")]
#[command(author, version, about = "DBML schema toolkit: render SQL DDL and canonical DBML")]
#[command(propagate_version = true)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Render DBML files as SQL DDL
    Sql {
        /// DBML files (supports glob patterns)
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Write to this file instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Rewrite DBML files in canonical form
    Dbml {
        /// DBML files (supports glob patterns)
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Write to this file instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Parse and resolve DBML files, reporting any error
    Check {
        /// DBML files (supports glob patterns)
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Display schema information
    Schema {
        /// DBML files (supports glob patterns)
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Dump the resolved schema as JSON
        #[arg(long)]
        json: bool,
    },

    /// Render every configured target into the output directory
    Build {
        /// DBML files, overriding the configured `schema` list
        files: Vec<PathBuf>,

        /// Configuration file (defaults to the nearest dbmlkit.toml)
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Output directory
        #[arg(long = "out-dir", value_name = "DIR")]
        out_dir: Option<PathBuf>,

        /// Targets to render
        #[arg(short, long = "target", value_enum, value_delimiter = ',')]
        targets: Vec<TargetArg>,
    },
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum TargetArg {
    /// SQL DDL
    Sql,
    /// Canonical DBML
    Dbml,
    /// JSON dump of the resolved schema
    Json,
}

impl From<TargetArg> for Target {
    fn from(arg: TargetArg) -> Self {
        match arg {
            TargetArg::Sql => Target::Sql,
            TargetArg::Dbml => Target::Dbml,
            TargetArg::Json => Target::Json,
        }
    }
}
