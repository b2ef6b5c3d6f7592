//! Command-line parsing for the breeding-value engine.
//!
//! The goal of this module is to keep **argument parsing** and **command
//! dispatch** separate from the estimation code.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(
    name = "pedigree",
    version,
    about = "Dairy-cattle breeding-value estimation and index ranking"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the full pipeline: lookup, trends, fill, scoring, genomic merge, ranking.
    Score(ScoreArgs),
    /// Manage the weight-profile store.
    #[command(subcommand)]
    Profiles(ProfilesCmd),
    /// Assemble auxiliary report tables from disjoint source files.
    Collate(CollateArgs),
}

/// Options for a scoring run.
#[derive(Debug, Parser, Clone)]
pub struct ScoreArgs {
    /// Animal input table (CSV).
    #[arg(long)]
    pub animals: PathBuf,

    /// Reference trait table (CSV with `BULL NAAB` / `BULL REG` key columns).
    #[arg(long)]
    pub reference: PathBuf,

    /// Optional genomic evaluation table (CSV). A missing file skips the
    /// genomic merge; it is not an error.
    #[arg(long)]
    pub genomic: Option<PathBuf>,

    /// Traits to score (comma-separated). Defaults to the standard set.
    #[arg(long, value_delimiter = ',')]
    pub traits: Vec<String>,

    /// Weight profile used by the ranking stage.
    #[arg(long, default_value = "nm-default")]
    pub profile: String,

    /// Weight-profile store (JSON).
    #[arg(long, default_value = "profiles.json")]
    pub profiles_file: PathBuf,

    /// Number of ranking rows printed to the terminal.
    #[arg(long, default_value_t = 10)]
    pub top_n: usize,

    /// Export the full output table to this CSV path.
    #[arg(long)]
    pub export: Option<PathBuf>,

    /// Include per-role ancestor source columns in the export.
    #[arg(long, default_value_t = false)]
    pub wide: bool,

    /// Suppress progress output.
    #[arg(long, default_value_t = false)]
    pub quiet: bool,
}

/// Weight-profile management.
#[derive(Debug, Subcommand)]
pub enum ProfilesCmd {
    /// List profile names (built-ins are marked).
    List(ProfilesFileArgs),
    /// Validate and save a user-defined profile.
    Save(SaveProfileArgs),
    /// Delete a user-defined profile (built-ins are protected).
    Delete(DeleteProfileArgs),
}

#[derive(Debug, Parser, Clone)]
pub struct ProfilesFileArgs {
    /// Weight-profile store (JSON).
    #[arg(long, default_value = "profiles.json")]
    pub file: PathBuf,
}

#[derive(Debug, Parser, Clone)]
pub struct SaveProfileArgs {
    #[command(flatten)]
    pub store: ProfilesFileArgs,

    /// Profile name.
    #[arg(long)]
    pub name: String,

    /// Weights as `TRAIT=WEIGHT` pairs, e.g. `NM$=60,SCS=-40`.
    /// Sum of absolute weights must equal 100.
    #[arg(long, value_delimiter = ',')]
    pub weights: Vec<String>,
}

#[derive(Debug, Parser, Clone)]
pub struct DeleteProfileArgs {
    #[command(flatten)]
    pub store: ProfilesFileArgs,

    /// Profile name.
    #[arg(long)]
    pub name: String,
}

/// Options for report-table collation.
#[derive(Debug, Parser, Clone)]
pub struct CollateArgs {
    /// Table specs `NAME=PATH:COL1+COL2`, repeatable.
    #[arg(long = "table")]
    pub tables: Vec<String>,

    /// Directory the assembled tables are written to.
    #[arg(long, default_value = "collated")]
    pub out_dir: PathBuf,
}
