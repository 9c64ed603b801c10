//! Score extraction for ticket creation.

use std::collections::BTreeSet;

use registry::{Individual, IndividualId, MatchHit};

use crate::config::ScoreSource;

/// Lowest and highest score of a match list.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreBounds {
    pub min: f64,
    pub max: f64,
}

impl Default for ScoreBounds {
    fn default() -> Self {
        Self { min: 0.0, max: 0.0 }
    }
}

/// Min/max of the `score` field, `0.0` for both when `hits` is empty.
pub fn score_bounds(hits: &[MatchHit]) -> ScoreBounds {
    let mut scores = hits.iter().map(|hit| hit.score);
    let Some(first) = scores.next() else {
        return ScoreBounds::default();
    };
    scores.fold(ScoreBounds { min: first, max: first }, |bounds, score| ScoreBounds {
        min: bounds.min.min(score),
        max: bounds.max.max(score),
    })
}

/// The hits a ticket's score bounds are computed over.
pub fn score_hits(main: &Individual, duplicates: &[IndividualId], source: ScoreSource) -> Vec<MatchHit> {
    let hits = main.golden_record_matches();
    match source {
        ScoreSource::MainGoldenRecord => hits.to_vec(),
        ScoreSource::PossibleDuplicates => {
            let wanted: BTreeSet<&IndividualId> = duplicates.iter().collect();
            hits.iter()
                .filter(|hit| wanted.contains(&hit.hit_id))
                .cloned()
                .collect()
        }
    }
}
