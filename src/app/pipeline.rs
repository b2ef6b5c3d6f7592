//! Six-stage estimation/ranking pipeline.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! reference lookup -> trend estimation -> provenance fill -> pedigree
//! scoring -> genomic merge -> index ranking.
//!
//! Stages execute strictly in sequence because each depends on the full
//! output of the previous one; the pipeline is a pure function of its
//! inputs and holds no cross-call state. The cancellation flag is checked
//! between stages only.

use std::collections::HashMap;

use crate::domain::{
    AnchorValues, AnimalRecord, CancelFlag, ProgressSink, RankedResult, StageProgress,
    WeightProfile,
};
use crate::error::{ErrorKind, PipelineError};
use crate::fill::{FilledTraits, fill_ancestor_values};
use crate::rank::rank_population;
use crate::reference::{ReferenceStore, ancestor_queries, load_anchor_values, lookup_traits};
use crate::score::{GenomicTable, ScoreTable, merge_genomic, score_pedigree};
use crate::trend::build_role_trends;

/// All computed outputs of a single run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub anchors: AnchorValues,
    /// Distinct ancestor identifiers resolved by the reference lookup.
    pub lookup_hits: usize,
    pub filled: FilledTraits,
    pub scores: ScoreTable,
    pub genomic_applied: bool,
    pub ranking: Vec<RankedResult>,
}

/// Execute the full pipeline and return the computed outputs.
#[allow(clippy::too_many_arguments)]
pub fn run_pipeline(
    animals: &[AnimalRecord],
    traits: &[String],
    store: &dyn ReferenceStore,
    genomic: Option<&GenomicTable>,
    profile: &WeightProfile,
    reference_sd: &HashMap<String, f64>,
    progress: &dyn ProgressSink,
    cancel: &CancelFlag,
) -> Result<RunOutput, PipelineError> {
    // 1) Batched reference lookup (both id schemes) + anchor values.
    checkpoint(cancel, "reference lookup")?;
    progress.report(0.0, "reference lookup");
    let anchors = load_anchor_values(store, traits)?;
    let queries = ancestor_queries(animals);
    let lookups = lookup_traits(
        store,
        &queries,
        traits,
        &StageProgress::new(progress, 0.0, 30.0),
    )?;

    // 2) Yearly trend curves per (role, trait).
    checkpoint(cancel, "trend estimation")?;
    progress.report(30.0, "trend estimation");
    let trends = build_role_trends(animals, traits, &lookups, &anchors);

    // 3) Provenance fill: one defined value per (animal, role, trait).
    checkpoint(cancel, "provenance fill")?;
    let filled = fill_ancestor_values(
        animals,
        traits,
        &lookups,
        &trends,
        &anchors,
        &StageProgress::new(progress, 40.0, 70.0),
    );

    // 4) Pedigree scores from the fixed-weight blend.
    checkpoint(cancel, "pedigree scoring")?;
    progress.report(70.0, "pedigree scoring");
    let mut scores = score_pedigree(animals, traits, &filled, &anchors)?;

    // 5) Genomic overlay, when a table was supplied.
    checkpoint(cancel, "genomic merge")?;
    let genomic_applied = match genomic {
        Some(table) if !table.is_empty() => {
            progress.report(80.0, "genomic merge");
            merge_genomic(&mut scores, table);
            true
        }
        _ => false,
    };

    // 6) Composite index + population ranking.
    checkpoint(cancel, "index ranking")?;
    progress.report(90.0, "index ranking");
    let ranking = rank_population(&scores, profile, reference_sd);
    progress.report(100.0, "done");

    Ok(RunOutput {
        anchors,
        lookup_hits: lookups.len(),
        filled,
        scores,
        genomic_applied,
        ranking,
    })
}

fn checkpoint(cancel: &CancelFlag, stage: &str) -> Result<(), PipelineError> {
    if cancel.is_cancelled() {
        return Err(PipelineError::new(
            ErrorKind::Cancelled,
            format!("Run cancelled before stage: {stage}."),
        ));
    }
    Ok(())
}
