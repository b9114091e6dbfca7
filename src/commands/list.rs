use colored::Colorize;
use election_reveal::model::election::PageSize;
use election_reveal::pagination::PageOutcome;
use election_reveal::reports::tabulation::tally;
use election_reveal::{EngineError, ResultsEngine};

pub async fn list(engine: &ResultsEngine, page: u32, size: PageSize) -> Result<(), EngineError> {
    println!(
        "🔍 Loading concluded elections, page {} ({} per page)",
        page.to_string().cyan(),
        size.to_string().cyan()
    );

    if let PageOutcome::Superseded = engine.load(page, size).await? {
        return Ok(());
    }

    let snapshot = engine.pages.snapshot();
    let state = snapshot.pagination;

    if snapshot.elections.is_empty() {
        println!("📭 No concluded elections on this page");
    }

    for election in &snapshot.elections {
        let t = tally(&election.candidates);
        let status = if t.is_tie() {
            format!("tie between {} candidates", t.winners.len()).yellow()
        } else if t.winners.is_empty() {
            "no candidates".to_string().dimmed()
        } else {
            "decided".to_string().green()
        };
        println!(
            "  📊 {} [{}] ended {}: {} candidates, {} votes, {}",
            election.subject.bright_white().bold(),
            election.id,
            election.end_time.format("%Y-%m-%d %H:%M"),
            election.candidates.len(),
            t.total_votes.to_string().bright_yellow(),
            status
        );
    }

    println!(
        "📄 Page {} of {} ({} elections){}{}",
        state.current_page.to_string().bright_green(),
        state.total_pages,
        state.total_items,
        if state.has_prev { ", has previous" } else { "" },
        if state.has_next { ", has next" } else { "" }
    );
    Ok(())
}
