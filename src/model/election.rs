use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::convert::TryFrom;
use std::fmt;

/// Identifier the platform assigns to an election.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElectionId(pub String);

impl ElectionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ElectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque reference to a voter who picked a candidate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VoterRef(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    /// Opaque identifier of the candidate; resolved to a display name on reveal.
    pub description: String,
    pub vote_count: u64,
    #[serde(default)]
    pub voters: Vec<VoterRef>,
}

impl Candidate {
    pub fn new(description: impl Into<String>, vote_count: u64) -> Self {
        Self {
            description: description.into(),
            vote_count,
            voters: Vec::new(),
        }
    }
}

/// A concluded election as delivered by the remote source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Election {
    pub id: ElectionId,
    pub subject: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub candidates: Vec<Candidate>,
}

/// The page sizes the election listing accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum PageSize {
    Six,
    Twelve,
    TwentyFour,
    FortyEight,
}

impl PageSize {
    pub const ALL: [PageSize; 4] = [
        PageSize::Six,
        PageSize::Twelve,
        PageSize::TwentyFour,
        PageSize::FortyEight,
    ];

    pub fn get(self) -> u32 {
        match self {
            PageSize::Six => 6,
            PageSize::Twelve => 12,
            PageSize::TwentyFour => 24,
            PageSize::FortyEight => 48,
        }
    }
}

impl Default for PageSize {
    fn default() -> Self {
        PageSize::Six
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("unsupported page size {0}, expected one of 6, 12, 24, 48")]
pub struct InvalidPageSize(pub u32);

impl TryFrom<u32> for PageSize {
    type Error = InvalidPageSize;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            6 => Ok(PageSize::Six),
            12 => Ok(PageSize::Twelve),
            24 => Ok(PageSize::TwentyFour),
            48 => Ok(PageSize::FortyEight),
            other => Err(InvalidPageSize(other)),
        }
    }
}

impl From<PageSize> for u32 {
    fn from(size: PageSize) -> u32 {
        size.get()
    }
}

impl fmt::Display for PageSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.get())
    }
}

/// Server-authoritative pagination metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationState {
    pub current_page: u32,
    pub items_per_page: PageSize,
    pub total_pages: u32,
    pub total_items: u64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl Default for PaginationState {
    fn default() -> Self {
        Self {
            current_page: 1,
            items_per_page: PageSize::default(),
            total_pages: 0,
            total_items: 0,
            has_next: false,
            has_prev: false,
        }
    }
}

/// One page of concluded elections together with its pagination metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionPage {
    pub elections: Vec<Election>,
    pub pagination: PaginationState,
}

impl ElectionPage {
    pub fn find(&self, id: &ElectionId) -> Option<&Election> {
        self.elections.iter().find(|e| &e.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_size_rejects_unlisted_values() {
        assert_eq!(PageSize::try_from(12), Ok(PageSize::Twelve));
        assert_eq!(PageSize::try_from(10), Err(InvalidPageSize(10)));
    }

    #[test]
    fn decodes_wire_page() {
        let json = r#"{
            "elections": [{
                "id": "e-1",
                "subject": "Board chair",
                "startTime": "2024-03-01T09:00:00Z",
                "endTime": "2024-03-02T09:00:00Z",
                "candidates": [
                    {"description": "u-17", "voteCount": 4, "voters": ["v-1", "v-2"]},
                    {"description": "u-23", "voteCount": 0}
                ]
            }],
            "pagination": {
                "currentPage": 2,
                "itemsPerPage": 12,
                "totalPages": 3,
                "totalItems": 30,
                "hasNext": true,
                "hasPrev": true
            }
        }"#;
        let page: ElectionPage = serde_json::from_str(json).unwrap();
        assert_eq!(page.pagination.current_page, 2);
        assert_eq!(page.pagination.items_per_page, PageSize::Twelve);
        let election = page.find(&ElectionId::new("e-1")).unwrap();
        assert_eq!(election.candidates[0].voters.len(), 2);
        assert!(election.candidates[1].voters.is_empty());
    }

    #[test]
    fn rejects_wire_page_size_outside_allowed_set() {
        let json = r#"{"currentPage":1,"itemsPerPage":7,"totalPages":1,"totalItems":1,"hasNext":false,"hasPrev":false}"#;
        assert!(serde_json::from_str::<PaginationState>(json).is_err());
    }
}
