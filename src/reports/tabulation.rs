// Plurality tally for a single concluded election.

use crate::model::election::Candidate;
use itertools::Itertools;
use std::cmp::Reverse;

/// One candidate's place in the tally.
#[derive(Debug, Clone, PartialEq)]
pub struct Standing<'a> {
    /// Position of the candidate in the election's candidate list.
    pub index: usize,
    pub candidate: &'a Candidate,
    pub percentage: f64,
    pub is_winner: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tally<'a> {
    pub total_votes: u64,
    /// Descending by vote count; equal counts keep their original order.
    pub ranked: Vec<Standing<'a>>,
    /// Indices of every candidate tied at the maximum, in original order.
    pub winners: Vec<usize>,
}

impl<'a> Tally<'a> {
    pub fn winning_candidates(&self) -> impl Iterator<Item = &Standing<'a>> {
        self.ranked.iter().filter(|s| s.is_winner)
    }

    pub fn is_tie(&self) -> bool {
        self.winners.len() > 1
    }
}

/// Vote share of `votes` out of `total_votes`, rounded to one decimal place.
pub fn percentage(votes: u64, total_votes: u64) -> f64 {
    if total_votes == 0 {
        return 0.0;
    }
    let raw = votes as f64 / total_votes as f64 * 100.0;
    (raw * 10.0).round() / 10.0
}

/// Tabulate one election. Pure: no I/O, same input gives the same output.
pub fn tally(candidates: &[Candidate]) -> Tally<'_> {
    let total_votes: u64 = candidates.iter().map(|c| c.vote_count).sum();
    let max_votes = candidates.iter().map(|c| c.vote_count).max();

    let winners: Vec<usize> = match max_votes {
        Some(max) => candidates
            .iter()
            .positions(|c| c.vote_count == max)
            .collect(),
        None => Vec::new(),
    };

    let ranked = candidates
        .iter()
        .enumerate()
        .sorted_by_key(|(_, c)| Reverse(c.vote_count))
        .map(|(index, candidate)| Standing {
            index,
            candidate,
            percentage: percentage(candidate.vote_count, total_votes),
            is_winner: Some(candidate.vote_count) == max_votes,
        })
        .collect();

    Tally {
        total_votes,
        ranked,
        winners,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidates(counts: &[(&str, u64)]) -> Vec<Candidate> {
        counts
            .iter()
            .map(|(id, votes)| Candidate::new(*id, *votes))
            .collect()
    }

    #[test]
    fn two_way_tie_for_first() {
        let c = candidates(&[("A", 10), ("B", 10), ("C", 5)]);
        let t = tally(&c);
        assert_eq!(t.total_votes, 25);
        assert_eq!(t.winners, vec![0, 1]);
        assert!(t.is_tie());
        let shares: Vec<f64> = t.ranked.iter().map(|s| s.percentage).collect();
        assert_eq!(shares, vec![40.0, 40.0, 20.0]);
    }

    #[test]
    fn single_candidate_without_votes_still_wins() {
        let c = candidates(&[("A", 0)]);
        let t = tally(&c);
        assert_eq!(t.total_votes, 0);
        assert_eq!(t.winners, vec![0]);
        assert_eq!(t.ranked[0].percentage, 0.0);
    }

    #[test]
    fn empty_election_has_no_winner() {
        let t = tally(&[]);
        assert_eq!(t.total_votes, 0);
        assert!(t.winners.is_empty());
        assert!(t.ranked.is_empty());
    }

    #[test]
    fn all_zero_votes_ties_everyone() {
        let c = candidates(&[("A", 0), ("B", 0), ("C", 0)]);
        let t = tally(&c);
        assert_eq!(t.winners, vec![0, 1, 2]);
        assert!(t.ranked.iter().all(|s| s.percentage == 0.0));
    }

    #[test]
    fn ranking_is_stable_for_equal_counts() {
        let c = candidates(&[("A", 1), ("B", 7), ("C", 1), ("D", 7), ("E", 3)]);
        let order: Vec<&str> = tally(&c)
            .ranked
            .iter()
            .map(|s| s.candidate.description.as_str())
            .collect();
        assert_eq!(order, vec!["B", "D", "E", "A", "C"]);
    }

    #[test]
    fn totals_and_winners_hold_for_many_shapes() {
        // Deterministic pseudo-random vote counts.
        let mut seed: u64 = 0x9e37_79b9;
        for len in 1..40usize {
            let c: Vec<Candidate> = (0..len)
                .map(|i| {
                    seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                    Candidate::new(format!("c{}", i), (seed >> 33) % 50)
                })
                .collect();
            let t = tally(&c);
            let max = c.iter().map(|c| c.vote_count).max().unwrap();
            assert_eq!(t.total_votes, c.iter().map(|c| c.vote_count).sum::<u64>());
            assert!(!t.winners.is_empty());
            assert!(t.winners.iter().all(|&i| c[i].vote_count == max));
            if t.total_votes > 0 {
                let sum: f64 = t.ranked.iter().map(|s| s.percentage).sum();
                assert!((sum - 100.0).abs() <= 0.05 * len as f64, "sum was {}", sum);
            }
        }
    }
}
