use crate::cache::ResolvedName;
use crate::model::election::{Election, ElectionId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub mod tabulation;

use tabulation::tally;

/// What the results view renders for one concluded election.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevealReport {
    pub election: ElectionId,
    pub subject: String,
    pub total_votes: u64,
    /// Ranked rows, highest vote count first.
    pub rows: Vec<CandidateRow>,
    pub summary: ResultSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateRow {
    pub identifier: String,
    pub display_name: String,
    /// Set when the name lookup failed and `display_name` is the fallback.
    pub unresolved: bool,
    pub vote_count: u64,
    pub percentage: f64,
    pub is_winner: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultSummary {
    pub winners: Vec<String>,
    pub tie: bool,
    pub num_candidates: usize,
}

impl RevealReport {
    /// Combine an election's tally with the names settled for it. Candidates
    /// with no settled name show their identifier.
    pub fn build(election: &Election, names: &[ResolvedName]) -> Self {
        let by_identifier: HashMap<&str, &ResolvedName> = names
            .iter()
            .filter(|n| n.key.election == election.id)
            .map(|n| (n.key.identifier.as_str(), n))
            .collect();

        let t = tally(&election.candidates);
        let rows: Vec<CandidateRow> = t
            .ranked
            .iter()
            .map(|standing| {
                let identifier = standing.candidate.description.clone();
                let (display_name, unresolved) = match by_identifier.get(identifier.as_str()) {
                    Some(resolved) => (resolved.name.clone(), resolved.fallback),
                    None => (identifier.clone(), true),
                };
                CandidateRow {
                    identifier,
                    display_name,
                    unresolved,
                    vote_count: standing.candidate.vote_count,
                    percentage: standing.percentage,
                    is_winner: standing.is_winner,
                }
            })
            .collect();

        let winners = rows
            .iter()
            .filter(|r| r.is_winner)
            .map(|r| r.display_name.clone())
            .collect();

        RevealReport {
            election: election.id.clone(),
            subject: election.subject.clone(),
            total_votes: t.total_votes,
            summary: ResultSummary {
                winners,
                tie: t.is_tie(),
                num_candidates: rows.len(),
            },
            rows,
        }
    }

    pub fn row(&self, identifier: &str) -> Option<&CandidateRow> {
        self.rows.iter().find(|r| r.identifier == identifier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::NameKey;
    use crate::model::election::Candidate;
    use chrono::{TimeZone, Utc};

    fn election() -> Election {
        Election {
            id: ElectionId::new("e-1"),
            subject: "Treasurer".to_string(),
            start_time: Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap(),
            end_time: Utc.with_ymd_and_hms(2024, 5, 2, 8, 0, 0).unwrap(),
            candidates: vec![
                Candidate::new("u-1", 3),
                Candidate::new("u-2", 9),
                Candidate::new("u-3", 9),
            ],
        }
    }

    fn resolved(election: &str, id: &str, name: &str, fallback: bool) -> ResolvedName {
        ResolvedName {
            key: NameKey::new(ElectionId::new(election), id),
            name: name.to_string(),
            fallback,
        }
    }

    #[test]
    fn joins_names_onto_ranked_rows() {
        let names = vec![
            resolved("e-1", "u-1", "Ada", false),
            resolved("e-1", "u-2", "Unknown", true),
            resolved("e-1", "u-3", "Grace", false),
        ];
        let report = RevealReport::build(&election(), &names);

        let order: Vec<&str> = report.rows.iter().map(|r| r.display_name.as_str()).collect();
        assert_eq!(order, vec!["Unknown", "Grace", "Ada"]);
        assert!(report.row("u-2").unwrap().unresolved);
        assert_eq!(report.summary.winners, vec!["Unknown", "Grace"]);
        assert!(report.summary.tie);
        assert_eq!(report.total_votes, 21);
    }

    #[test]
    fn ignores_names_settled_for_another_election() {
        let names = vec![resolved("e-2", "u-1", "Someone Else", false)];
        let report = RevealReport::build(&election(), &names);
        let row = report.row("u-1").unwrap();
        assert_eq!(row.display_name, "u-1");
        assert!(row.unresolved);
    }
}
