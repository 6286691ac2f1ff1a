//! Hash similarity and candidate ranking.

use super::hash::{ImageHash, HASH_BITS};

/// `1 - hamming(a, b) / 64`, always in `[0, 1]`. Exactly `1.0` only for equal hashes.
pub fn similarity(a: ImageHash, b: ImageHash) -> f32 {
    1.0 - a.distance(&b) as f32 / HASH_BITS as f32
}

/// One scored template.
#[derive(Clone, Debug, PartialEq)]
pub struct Candidate<'a> {
    pub key: &'a str,
    pub distance: u32,
    pub similarity: f32,
}

/// Best and second-best candidates of a comparison.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Ranking<'a> {
    pub best: Option<Candidate<'a>>,
    pub second: Option<Candidate<'a>>,
}

/// Scores `live` against every candidate and keeps the top two.
///
/// On equal distance the earlier candidate stays ahead.
pub fn rank<'a, I>(live: ImageHash, candidates: I) -> Ranking<'a>
where
    I: IntoIterator<Item = (&'a str, ImageHash)>,
{
    let mut ranking = Ranking::default();
    for (key, hash) in candidates {
        let distance = live.distance(&hash);
        let candidate = Candidate {
            key,
            distance,
            similarity: similarity(live, hash),
        };
        match &ranking.best {
            Some(best) if best.distance <= distance => {
                if ranking
                    .second
                    .as_ref()
                    .is_none_or(|second| distance < second.distance)
                {
                    ranking.second = Some(candidate);
                }
            }
            _ => {
                ranking.second = ranking.best.take();
                ranking.best = Some(candidate);
            }
        }
    }
    ranking
}

/// How a category decides whether its best candidate counts as a match.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum AcceptRule {
    /// Bit-exact hash equality.
    Exact,
    /// Best candidate wins if its similarity reaches the floor.
    Best { min_similarity: f32 },
}

impl AcceptRule {
    pub fn accepts(&self, candidate: &Candidate<'_>) -> bool {
        match self {
            AcceptRule::Exact => candidate.distance == 0,
            AcceptRule::Best { min_similarity } => candidate.similarity >= *min_similarity,
        }
    }
}
