use chrono::{Duration, TimeZone, Utc};
use election_reveal::model::election::{Candidate, Election, ElectionId, VoterRef};
use election_reveal::source::fake::FakeSource;

const NAMES: [(&str, &str); 8] = [
    ("u-101", "Ada Lovelace"),
    ("u-102", "Grace Hopper"),
    ("u-103", "Alan Turing"),
    ("u-104", "Katherine Johnson"),
    ("u-105", "Edsger Dijkstra"),
    ("u-106", "Barbara Liskov"),
    ("u-107", "Donald Knuth"),
    ("u-108", "Frances Allen"),
];

const SUBJECTS: [&str; 9] = [
    "Student council president",
    "Club treasurer",
    "Sports day captain",
    "Library committee chair",
    "Event coordinator",
    "Yearbook editor",
    "Debate team lead",
    "Robotics club secretary",
    "Orchestra representative",
];

/// Offline stand-in for the platform API, used with `--demo`.
pub async fn demo_source() -> FakeSource {
    let first_close = Utc.with_ymd_and_hms(2024, 9, 2, 17, 0, 0).unwrap();
    let elections = SUBJECTS
        .iter()
        .enumerate()
        .map(|(i, subject)| {
            let candidates = (0..3 + i % 3)
                .map(|j| {
                    let (id, _) = NAMES[(i + j) % NAMES.len()];
                    // Every third election ends in a tie for first place.
                    let votes = if i % 3 == 0 && j < 2 { 12 } else { ((i * 7 + j * 5) % 11) as u64 };
                    let mut candidate = Candidate::new(id, votes);
                    candidate.voters = (0..votes)
                        .map(|v| VoterRef(format!("voter-{}-{}-{}", i, j, v)))
                        .collect();
                    candidate
                })
                .collect();
            let end_time = first_close + Duration::days(i as i64 * 7);
            Election {
                id: ElectionId::new(format!("election-{}", i + 1)),
                subject: subject.to_string(),
                start_time: end_time - Duration::days(3),
                end_time,
                candidates,
            }
        })
        .collect();

    let source = FakeSource::new(elections);
    for (id, name) in NAMES.iter() {
        source.set_name(id, name).await;
    }
    // One account the directory no longer knows about.
    source.fail_name("u-108").await;
    source
}
