//! Non-dominated sorting and crowding distance.

use crate::objectives::{ObjectiveScores, SiteEvaluation};
use std::cmp::Ordering;

/// A ranked candidate within one generation.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SiteCandidate {
    pub evaluation: SiteEvaluation,
    /// Pareto front index, 1 = non-dominated.
    pub rank: usize,
    /// Normalised crowding distance within the candidate's front.
    pub crowding_distance: f64,
    /// Aggregate score plus the crowding tiebreak.
    pub score: f64,
    /// Candidates this one dominates.
    pub dominates_count: usize,
    /// Candidates that dominate this one.
    pub dominated_by_count: usize,
}

impl SiteCandidate {
    pub fn new(evaluation: SiteEvaluation) -> Self {
        let score = evaluation.aggregate_score;
        Self {
            evaluation,
            rank: 0,
            crowding_distance: 0.0,
            score,
            dominates_count: 0,
            dominated_by_count: 0,
        }
    }

    pub fn location(&self) -> (f64, f64) {
        (self.evaluation.latitude, self.evaluation.longitude)
    }

    /// Selection order: lower rank first, then higher score.
    pub fn compare(&self, other: &SiteCandidate) -> Ordering {
        self.rank
            .cmp(&other.rank)
            .then_with(|| other.score.partial_cmp(&self.score).unwrap_or(Ordering::Equal))
    }
}

/// Fast non-dominated sort.
///
/// Returns the front of every entry (1-based) and the per-entry
/// (dominates, dominated-by) counts.
pub fn non_dominated_sort(objectives: &[ObjectiveScores]) -> (Vec<usize>, Vec<(usize, usize)>) {
    let n = objectives.len();
    let mut dominated: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut domination_count = vec![0usize; n];

    for i in 0..n {
        for j in (i + 1)..n {
            if objectives[i].dominates(&objectives[j]) {
                dominated[i].push(j);
                domination_count[j] += 1;
            } else if objectives[j].dominates(&objectives[i]) {
                dominated[j].push(i);
                domination_count[i] += 1;
            }
        }
    }
    let counts = (0..n).map(|i| (dominated[i].len(), domination_count[i])).collect();

    let mut ranks = vec![0usize; n];
    let mut remaining = domination_count;
    let mut front: Vec<usize> = (0..n).filter(|&i| remaining[i] == 0).collect();
    let mut rank = 1;
    while !front.is_empty() {
        let mut next = Vec::new();
        for &i in &front {
            ranks[i] = rank;
            for &j in &dominated[i] {
                remaining[j] -= 1;
                if remaining[j] == 0 {
                    next.push(j);
                }
            }
        }
        front = next;
        rank += 1;
    }
    (ranks, counts)
}

/// Crowding distance of each member of one front.
///
/// Per objective, members are sorted and each interior member gains the gap
/// between its neighbours over the objective's range, capped at 1.0.
/// Boundary members get 1.0 per objective; constant objectives add nothing.
pub fn crowding_distance(objectives: &[ObjectiveScores], front: &[usize]) -> Vec<f64> {
    let mut distance = vec![0.0; front.len()];
    if front.len() <= 2 {
        return vec![ObjectiveScores::COUNT as f64; front.len()];
    }
    for m in 0..ObjectiveScores::COUNT {
        let value = |slot: usize| objectives[front[slot]].as_array()[m];
        let mut order: Vec<usize> = (0..front.len()).collect();
        order.sort_by(|&a, &b| value(a).partial_cmp(&value(b)).unwrap_or(Ordering::Equal));

        let (Some(&low), Some(&high)) = (order.first(), order.last()) else {
            continue;
        };
        let range = value(high) - value(low);
        if range <= 0.0 {
            continue;
        }
        distance[low] += 1.0;
        distance[high] += 1.0;
        for w in order.windows(3) {
            distance[w[1]] += ((value(w[2]) - value(w[0])) / range).min(1.0);
        }
    }
    distance
}

/// Rank candidates, apply the crowding tiebreak, and sort them best first.
pub fn rank_candidates(candidates: &mut Vec<SiteCandidate>, crowding_bonus: f64) {
    let objectives: Vec<ObjectiveScores> = candidates.iter().map(|c| c.evaluation.objectives).collect();
    let (ranks, counts) = non_dominated_sort(&objectives);

    let max_rank = ranks.iter().copied().max().unwrap_or(0);
    for rank in 1..=max_rank {
        let front: Vec<usize> = (0..candidates.len()).filter(|&i| ranks[i] == rank).collect();
        let distances = crowding_distance(&objectives, &front);
        for (&index, distance) in front.iter().zip(distances) {
            let candidate = &mut candidates[index];
            candidate.rank = rank;
            candidate.crowding_distance = distance;
            candidate.score = candidate.evaluation.aggregate_score + crowding_bonus * distance.min(1.0);
            (candidate.dominates_count, candidate.dominated_by_count) = counts[index];
        }
    }

    let mut indexed: Vec<(usize, SiteCandidate)> = candidates.drain(..).enumerate().collect();
    indexed.sort_by(|(ia, a), (ib, b)| a.compare(b).then(ia.cmp(ib)));
    candidates.extend(indexed.into_iter().map(|(_, c)| c));
}
