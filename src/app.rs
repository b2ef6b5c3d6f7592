//! Command dispatch: wire CLI arguments into the library modules.

pub mod pipeline;

use std::collections::BTreeMap;
use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use clap::Parser;

use crate::cli::{
    Cli, CollateArgs, Command, DeleteProfileArgs, ProfilesCmd, ProfilesFileArgs, SaveProfileArgs,
    ScoreArgs,
};
use crate::collate::{TableSpec, collate_tables};
use crate::domain::{CancelFlag, DEFAULT_TRAITS, ProgressSink, RunConfig, WeightProfile};
use crate::error::{ErrorKind, PipelineError};
use crate::io::export::{WritePrompt, render_output, write_output_csv};
use crate::io::ingest::{load_animal_records, load_genomic_table};
use crate::rank::{BUILTIN_PROFILE_NAMES, ProfileStore, default_reference_sd};
use crate::reference::CsvReferenceStore;
use crate::report::{format_ranking_table, format_run_summary};

/// Entry point used by the binary.
pub fn run() -> Result<(), PipelineError> {
    let cli = Cli::parse();
    match cli.command {
        Command::Score(args) => run_score(args),
        Command::Profiles(cmd) => run_profiles(cmd),
        Command::Collate(args) => run_collate(args),
    }
}

fn run_score(args: ScoreArgs) -> Result<(), PipelineError> {
    let config = RunConfig {
        animals_path: args.animals,
        reference_path: args.reference,
        genomic_path: args.genomic,
        profiles_path: args.profiles_file,
        traits: if args.traits.is_empty() {
            DEFAULT_TRAITS.iter().map(|s| s.to_string()).collect()
        } else {
            args.traits
        },
        profile: args.profile,
        top_n: args.top_n,
        export_path: args.export,
        wide_export: args.wide,
    };

    // Input files are validated before any stage runs.
    require_file(&config.animals_path)?;
    require_file(&config.reference_path)?;

    let ingest = load_animal_records(&config.animals_path)?;
    for e in &ingest.row_errors {
        eprintln!(
            "warning: line {}: {}{}",
            e.line,
            e.id.as_deref().map(|id| format!("[{id}] ")).unwrap_or_default(),
            e.message
        );
    }

    let store = CsvReferenceStore::open(&config.reference_path)?;

    // An absent genomic file skips the merge; a malformed one is fatal.
    let genomic = match &config.genomic_path {
        Some(path) => match load_genomic_table(path) {
            Ok(table) => Some(table),
            Err(e) if e.kind() == ErrorKind::MissingInputFile => {
                eprintln!("note: genomic table '{}' not found; skipping merge", path.display());
                None
            }
            Err(e) => return Err(e),
        },
        None => None,
    };

    let profiles = ProfileStore::load(&config.profiles_path)?;
    let profile = profiles.get(&config.profile).ok_or_else(|| {
        PipelineError::new(
            ErrorKind::InvalidInput,
            format!("No weight profile named '{}'.", config.profile),
        )
    })?;

    let progress: Box<dyn ProgressSink> = if args.quiet {
        Box::new(crate::domain::NullProgress)
    } else {
        Box::new(ConsoleProgress)
    };

    let output = pipeline::run_pipeline(
        &ingest.animals,
        &config.traits,
        &store,
        genomic.as_ref(),
        &profile,
        &default_reference_sd(),
        progress.as_ref(),
        &CancelFlag::new(),
    )?;

    print!(
        "{}",
        format_run_summary(&ingest, &config.traits, &profile, &output)
    );
    println!();
    print!("{}", format_ranking_table(&output.ranking, config.top_n));

    if let Some(path) = &config.export_path {
        let text = render_output(
            &output.scores,
            &output.filled,
            Some(&output.ranking),
            config.wide_export,
        );
        write_output_csv(path, &text, &ConsolePrompt)?;
        println!("\nExported {} rows to {}", ingest.animals.len(), path.display());
    }

    Ok(())
}

fn run_profiles(cmd: ProfilesCmd) -> Result<(), PipelineError> {
    match cmd {
        ProfilesCmd::List(ProfilesFileArgs { file }) => {
            let store = ProfileStore::load(&file)?;
            for name in store.names() {
                let marker = if BUILTIN_PROFILE_NAMES.contains(&name) {
                    " (built-in)"
                } else {
                    ""
                };
                println!("{name}{marker}");
            }
            Ok(())
        }
        ProfilesCmd::Save(SaveProfileArgs { store, name, weights }) => {
            let mut profiles = ProfileStore::load(&store.file)?;
            profiles.save_profile(WeightProfile {
                name: name.clone(),
                weights: parse_weight_pairs(&weights)?,
            })?;
            profiles.persist()?;
            println!("Saved profile '{name}'.");
            Ok(())
        }
        ProfilesCmd::Delete(DeleteProfileArgs { store, name }) => {
            let mut profiles = ProfileStore::load(&store.file)?;
            profiles.delete_profile(&name)?;
            profiles.persist()?;
            println!("Deleted profile '{name}'.");
            Ok(())
        }
    }
}

fn run_collate(args: CollateArgs) -> Result<(), PipelineError> {
    if args.tables.is_empty() {
        return Err(PipelineError::new(
            ErrorKind::InvalidInput,
            "No tables requested; pass at least one `--table NAME=PATH:COL1+COL2`.",
        ));
    }

    let specs: Vec<TableSpec> = args
        .tables
        .iter()
        .map(|raw| parse_table_spec(raw))
        .collect::<Result<_, _>>()?;

    let tables = collate_tables(&specs)?;

    fs::create_dir_all(&args.out_dir).map_err(|e| {
        PipelineError::new(
            ErrorKind::ExportFailed,
            format!("Failed to create '{}': {e}", args.out_dir.display()),
        )
    })?;

    for table in &tables {
        let path = args.out_dir.join(format!("{}.csv", table.name));
        let mut text = table.header.join(",");
        text.push('\n');
        for row in &table.rows {
            text.push_str(&row.join(","));
            text.push('\n');
        }
        fs::write(&path, text).map_err(|e| {
            PipelineError::new(
                ErrorKind::ExportFailed,
                format!("Failed to write '{}': {e}", path.display()),
            )
        })?;
        println!("Wrote {} ({} rows)", path.display(), table.rows.len());
    }

    Ok(())
}

fn require_file(path: &Path) -> Result<(), PipelineError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(PipelineError::new(
            ErrorKind::MissingInputFile,
            format!("Required input file '{}' does not exist.", path.display()),
        ))
    }
}

/// Parse `TRAIT=WEIGHT` pairs from the CLI.
fn parse_weight_pairs(pairs: &[String]) -> Result<BTreeMap<String, f64>, PipelineError> {
    let mut weights = BTreeMap::new();
    for pair in pairs {
        let Some((name, value)) = pair.split_once('=') else {
            return Err(PipelineError::new(
                ErrorKind::InvalidInput,
                format!("Invalid weight '{pair}'. Expected `TRAIT=WEIGHT`."),
            ));
        };
        let weight: f64 = value.trim().parse().map_err(|_| {
            PipelineError::new(
                ErrorKind::InvalidInput,
                format!("Invalid weight value '{value}' for trait '{name}'."),
            )
        })?;
        weights.insert(name.trim().to_string(), weight);
    }
    Ok(weights)
}

/// Parse a `NAME=PATH:COL1+COL2` table spec.
fn parse_table_spec(raw: &str) -> Result<TableSpec, PipelineError> {
    let invalid = || {
        PipelineError::new(
            ErrorKind::InvalidInput,
            format!("Invalid table spec '{raw}'. Expected `NAME=PATH:COL1+COL2`."),
        )
    };

    let (name, rest) = raw.split_once('=').ok_or_else(invalid)?;
    let (path, cols) = rest.rsplit_once(':').ok_or_else(invalid)?;
    let columns: Vec<String> = cols
        .split('+')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect();
    if name.trim().is_empty() || path.is_empty() || columns.is_empty() {
        return Err(invalid());
    }

    Ok(TableSpec {
        name: name.trim().to_string(),
        source: PathBuf::from(path),
        columns,
    })
}

/// Prints progress lines to stderr so stdout stays machine-readable.
struct ConsoleProgress;

impl ProgressSink for ConsoleProgress {
    fn report(&self, percent: f64, message: &str) {
        eprintln!("[{percent:5.1}%] {message}");
    }
}

/// Asks on stderr whether a failed destination write should be retried.
struct ConsolePrompt;

impl WritePrompt for ConsolePrompt {
    fn should_retry(&self, path: &Path, attempt: u32, error: &std::io::Error) -> bool {
        eprint!(
            "Output '{}' cannot be written (attempt {attempt}: {error}). \
             Close any program holding it open and retry? [y/N] ",
            path.display()
        );
        let _ = std::io::stderr().flush();

        let mut line = String::new();
        if std::io::stdin().read_line(&mut line).is_err() {
            return false;
        }
        line.trim().eq_ignore_ascii_case("y")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weight_pairs_parse_signed_values() {
        let pairs = vec!["NM$=60".to_string(), "SCS=-40".to_string()];
        let weights = parse_weight_pairs(&pairs).unwrap();
        assert_eq!(weights["NM$"], 60.0);
        assert_eq!(weights["SCS"], -40.0);

        assert!(parse_weight_pairs(&["oops".to_string()]).is_err());
    }

    #[test]
    fn table_specs_parse_name_path_and_columns() {
        let spec = parse_table_spec("herd=data/herd.csv:id+NM$").unwrap();
        assert_eq!(spec.name, "herd");
        assert_eq!(spec.source, PathBuf::from("data/herd.csv"));
        assert_eq!(spec.columns, vec!["id", "NM$"]);

        assert!(parse_table_spec("no-columns=path.csv:").is_err());
        assert!(parse_table_spec("missing-path").is_err());
    }
}
