use colored::Colorize;
use election_reveal::model::election::{ElectionId, PageSize};
use election_reveal::reports::RevealReport;
use election_reveal::reveal::metrics::MetricsCollector;
use election_reveal::reveal::Phase;
use election_reveal::{EngineError, ResultsEngine};
use tokio::sync::broadcast::error::RecvError;

pub async fn reveal(
    engine: &ResultsEngine,
    page: u32,
    size: PageSize,
    election: &ElectionId,
) -> Result<(), EngineError> {
    engine.load(page, size).await?;

    let mut updates = engine.reveal.subscribe();
    let token = engine.select(election).await?;
    println!("🎬 Revealing results for {}", election.to_string().bright_cyan());

    let follow = async {
        loop {
            match updates.recv().await {
                Ok(update) if update.token == token => match update.phase {
                    Phase::Countdown { remaining } if remaining > 0 => {
                        println!("  ⏳ {}", remaining.to_string().bright_yellow().bold())
                    }
                    Phase::Resolving => println!("  🔎 Resolving candidate names..."),
                    Phase::Results | Phase::Cancelled | Phase::Idle => break,
                    _ => {}
                },
                Ok(_) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break,
            }
        }
    };

    tokio::select! {
        _ = follow => {}
        _ = tokio::signal::ctrl_c() => {
            println!("  ✋ Cancelling reveal");
            engine.reveal.cancel().await?;
        }
    }

    let view = engine.reveal.wait_settled(token).await?;
    match (&view.phase, &view.report) {
        (Phase::Results, Some(report)) => print_report(report),
        (phase, _) => println!("❌ Reveal ended in {} without results", phase),
    }

    MetricsCollector::print_summary(&engine.reveal.metrics().await?);
    Ok(())
}

fn print_report(report: &RevealReport) {
    println!(
        "\n{} {}",
        "🏆".bold(),
        report.subject.bright_white().bold()
    );
    println!("{}", "=".repeat(50).bright_cyan());
    for row in &report.rows {
        let name = if row.unresolved {
            row.display_name.red()
        } else if row.is_winner {
            row.display_name.bright_green().bold()
        } else {
            row.display_name.normal()
        };
        println!(
            "{} {:<30} {:>6} votes {:>5.1}%",
            if row.is_winner { "👑" } else { "  " },
            name,
            row.vote_count,
            row.percentage
        );
    }
    println!("{}", "-".repeat(50).bright_cyan());
    println!(
        "{}: {}",
        "Total votes".bright_white().bold(),
        report.total_votes.to_string().bright_green().bold()
    );
    if report.summary.tie {
        println!(
            "{}: {}",
            "Tie".bright_yellow().bold(),
            report.summary.winners.join(", ")
        );
    }
}
