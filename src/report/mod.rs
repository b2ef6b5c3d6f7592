//! Formatted terminal output for a run.
//!
//! We keep formatting code in one place so:
//! - the estimation code stays clean and testable
//! - output changes are localized (important for future snapshot tests)

use crate::app::pipeline::RunOutput;
use crate::domain::{AncestorRole, Provenance, RankedResult, WeightProfile};
use crate::io::ingest::AnimalIngest;

/// Format the full run summary (dataset stats + provenance mix + ranking head).
pub fn format_run_summary(
    ingest: &AnimalIngest,
    traits: &[String],
    profile: &WeightProfile,
    output: &RunOutput,
) -> String {
    let mut out = String::new();

    out.push_str("=== pedigree - breeding-value estimation ===\n");
    out.push_str(&format!(
        "Animals: {} used ({} rows read, {} skipped)\n",
        ingest.animals.len(),
        ingest.rows_read,
        ingest.row_errors.len()
    ));
    out.push_str(&format!("Traits: {}\n", traits.join(", ")));
    out.push_str(&format!(
        "Reference: {} ancestors resolved\n",
        output.lookup_hits
    ));
    out.push_str(&format!(
        "Genomic overlay: {}\n",
        if output.genomic_applied { "applied" } else { "none" }
    ));
    out.push_str(&format!("Profile: {}\n", profile.name));

    out.push_str("\nProvenance mix (per trait, sire column):\n");
    for t in traits {
        let Some(column) = output.filled.column(t, AncestorRole::Sire) else {
            continue;
        };
        let mut real = 0usize;
        let mut year = 0usize;
        let mut default = 0usize;
        for v in column {
            match v.source {
                Provenance::Real => real += 1,
                Provenance::YearEstimate => year += 1,
                Provenance::Default => default += 1,
            }
        }
        out.push_str(&format!(
            "  {t:<10} real={real} year-estimate={year} default={default}\n"
        ));
    }

    out
}

/// Format the top-N ranking as a fixed-width table.
pub fn format_ranking_table(ranking: &[RankedResult], top_n: usize) -> String {
    let mut out = String::new();
    out.push_str(&format!("{:>5}  {:<20}  {:>12}\n", "rank", "animal", "index"));
    for r in ranking.iter().take(top_n) {
        out.push_str(&format!(
            "{:>5}  {:<20}  {:>12.2}\n",
            r.rank, r.animal_id, r.index
        ));
    }
    if ranking.len() > top_n {
        out.push_str(&format!("  ... {} more\n", ranking.len() - top_n));
    }
    out
}
