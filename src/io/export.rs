//! Export the scored/ranked output table to CSV.
//!
//! One row per animal (input order), columns = trait scores plus one
//! provenance column per trait, then index and rank when the ranking stage
//! ran. Wide exports additionally carry the per-role ancestor sources, so
//! downstream reporting can show the full fallback chain.
//!
//! A destination locked by another process (spreadsheet still open) is
//! retried through a caller-supplied prompt rather than silently failing or
//! silently overwriting.

use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::domain::{AncestorRole, RankedResult};
use crate::error::{ErrorKind, PipelineError};
use crate::fill::FilledTraits;
use crate::score::ScoreTable;

/// Decides whether a failed destination write should be retried.
///
/// Invoked once per failed attempt; returning `false` turns the failure into
/// `ErrorKind::ExportFailed`.
pub trait WritePrompt {
    fn should_retry(&self, path: &Path, attempt: u32, error: &std::io::Error) -> bool;
}

/// Never retries; the first failure is final.
pub struct NoRetry;

impl WritePrompt for NoRetry {
    fn should_retry(&self, _path: &Path, _attempt: u32, _error: &std::io::Error) -> bool {
        false
    }
}

/// Render the output table as CSV text.
pub fn render_output(
    scores: &ScoreTable,
    filled: &FilledTraits,
    ranking: Option<&[RankedResult]>,
    wide: bool,
) -> String {
    let mut out = String::new();

    out.push_str("animal_id");
    for t in &scores.traits {
        out.push_str(&format!(",{t},{t}_provenance"));
        if wide {
            for role in AncestorRole::ALL {
                out.push_str(&format!(",{t}_{}_src", role.display_name()));
            }
        }
    }
    if ranking.is_some() {
        out.push_str(",index,rank");
    }
    out.push('\n');

    let ranked_by_id: HashMap<&str, &RankedResult> = ranking
        .unwrap_or(&[])
        .iter()
        .map(|r| (r.animal_id.as_str(), r))
        .collect();

    for (idx, id) in scores.animal_ids.iter().enumerate() {
        out.push_str(id);
        for t in &scores.traits {
            match scores.score(t, idx) {
                Some(s) => out.push_str(&format!(",{:.4},{}", s.value, s.source.label())),
                None => out.push_str(",,"),
            }
            if wide {
                for role in AncestorRole::ALL {
                    match filled.value(t, role, idx) {
                        Some(v) => out.push_str(&format!(",{}", v.source.label())),
                        None => out.push(','),
                    }
                }
            }
        }
        if ranking.is_some() {
            match ranked_by_id.get(id.as_str()) {
                Some(r) => out.push_str(&format!(",{:.4},{}", r.index, r.rank)),
                None => out.push_str(",,"),
            }
        }
        out.push('\n');
    }

    out
}

/// Write rendered output to `path`, retrying through `prompt` while the
/// destination is unwritable.
pub fn write_output_csv(
    path: &Path,
    content: &str,
    prompt: &dyn WritePrompt,
) -> Result<(), PipelineError> {
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        let result = File::create(path).and_then(|mut f| f.write_all(content.as_bytes()));
        match result {
            Ok(()) => return Ok(()),
            Err(e) => {
                if prompt.should_retry(path, attempt, &e) {
                    continue;
                }
                return Err(PipelineError::new(
                    ErrorKind::ExportFailed,
                    format!(
                        "Failed to write output '{}' after {attempt} attempt(s): {e}",
                        path.display()
                    ),
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        AnchorValues, AnimalRecord, NullProgress, ScoreSource, TraitScore,
    };
    use crate::fill::fill_ancestor_values;
    use crate::score::ScoreTable;
    use crate::trend::RoleTrends;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fixture() -> (ScoreTable, FilledTraits) {
        let animals = vec![AnimalRecord {
            id: "A1".to_string(),
            sire_id: None,
            mgs_id: None,
            mmgs_id: None,
            sire_scheme: None,
            mgs_scheme: None,
            mmgs_scheme: None,
            birth_year: None,
            dam_birth_year: None,
            mgd_birth_year: None,
        }];
        let traits = vec!["NM$".to_string()];
        let anchors = AnchorValues::new(HashMap::from([("NM$".to_string(), 50.0)]));
        let filled = fill_ancestor_values(
            &animals,
            &traits,
            &HashMap::new(),
            &RoleTrends::default(),
            &anchors,
            &NullProgress,
        );
        let scores = ScoreTable::from_columns(
            vec!["A1".to_string()],
            vec![(
                "NM$".to_string(),
                vec![TraitScore { value: 50.0, source: ScoreSource::Pedigree }],
            )],
        );
        (scores, filled)
    }

    #[test]
    fn render_includes_provenance_and_rank_columns() {
        let (scores, filled) = fixture();
        let ranking = vec![RankedResult {
            animal_id: "A1".to_string(),
            index: 25.0,
            rank: 1,
        }];
        let text = render_output(&scores, &filled, Some(&ranking), false);
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("animal_id,NM$,NM$_provenance,index,rank"));
        assert_eq!(lines.next(), Some("A1,50.0000,Pedigree,25.0000,1"));
    }

    #[test]
    fn wide_render_carries_per_role_sources() {
        let (scores, filled) = fixture();
        let text = render_output(&scores, &filled, None, true);
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("animal_id,NM$,NM$_provenance,NM$_sire_src,NM$_mgs_src,NM$_mmgs_src")
        );
        assert_eq!(lines.next(), Some("A1,50.0000,Pedigree,Default,Default,Default"));
    }

    #[test]
    fn unwritable_destination_surfaces_export_failed() {
        let (scores, filled) = fixture();
        let text = render_output(&scores, &filled, None, false);
        let bad = Path::new("/nonexistent-dir/out.csv");

        let err = write_output_csv(bad, &text, &NoRetry).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ExportFailed);
    }

    struct CountingPrompt(AtomicU32);

    impl WritePrompt for CountingPrompt {
        fn should_retry(&self, _path: &Path, attempt: u32, _error: &std::io::Error) -> bool {
            self.0.fetch_add(1, Ordering::Relaxed);
            attempt < 3
        }
    }

    #[test]
    fn prompt_is_consulted_once_per_failed_attempt() {
        let (scores, filled) = fixture();
        let text = render_output(&scores, &filled, None, false);
        let prompt = CountingPrompt(AtomicU32::new(0));

        let err = write_output_csv(Path::new("/nonexistent-dir/out.csv"), &text, &prompt);
        assert!(err.is_err());
        assert_eq!(prompt.0.load(Ordering::Relaxed), 3);
    }
}
