//! Stage timing for reveal sessions.
use super::SessionToken;
use crate::model::election::ElectionId;
use chrono::{DateTime, Utc};
use instant::Instant;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Records kept before the oldest are dropped.
const RECORDED_LIMIT: usize = 256;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevealMetrics {
    pub token: SessionToken,
    pub election: ElectionId,
    pub stage: RevealStage,
    pub duration_ms: u64,
    pub names_requested: Option<u64>,
    pub fallbacks: Option<u64>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RevealStage {
    Countdown,
    Resolution,
    Cancelled,
    Complete,
}

impl std::fmt::Display for RevealStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RevealStage::Countdown => write!(f, "countdown"),
            RevealStage::Resolution => write!(f, "resolution"),
            RevealStage::Cancelled => write!(f, "cancelled"),
            RevealStage::Complete => write!(f, "complete"),
        }
    }
}

/// Timers are keyed by session and stage; `Complete` and `Cancelled` close the
/// session-wide timer started by [`MetricsCollector::start_session`]. Only the
/// most recent records are kept.
pub struct MetricsCollector {
    stage_timers: HashMap<(SessionToken, RevealStage), Instant>,
    sessions: HashMap<SessionToken, (ElectionId, Instant)>,
    recorded: Vec<RevealMetrics>,
    limit: usize,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::with_limit(RECORDED_LIMIT)
    }
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(limit: usize) -> Self {
        Self {
            stage_timers: HashMap::new(),
            sessions: HashMap::new(),
            recorded: Vec::new(),
            limit: limit.max(1),
        }
    }

    /// Start the session-wide timer; later calls for the same token keep the first start.
    pub fn start_session(&mut self, token: SessionToken, election: &ElectionId) {
        self.sessions
            .entry(token)
            .or_insert_with(|| (election.clone(), Instant::now()));
    }

    /// Start timing a stage
    pub fn start_stage(&mut self, token: SessionToken, stage: RevealStage) {
        self.stage_timers.insert((token, stage), Instant::now());
    }

    /// End timing a stage and record metrics
    pub fn end_stage(
        &mut self,
        token: SessionToken,
        stage: RevealStage,
        names_requested: Option<u64>,
        fallbacks: Option<u64>,
    ) -> Option<RevealMetrics> {
        let election = self.sessions.get(&token)?.0.clone();
        let duration = self
            .stage_timers
            .remove(&(token, stage))
            .map(|start| start.elapsed().as_millis() as u64)?;

        Some(self.record(token, election, stage, duration, names_requested, fallbacks))
    }

    /// Close the session-wide timer with a terminal stage.
    pub fn end_session(&mut self, token: SessionToken, stage: RevealStage) -> Option<RevealMetrics> {
        // Stages still open belong to a session that did not finish them.
        self.stage_timers.retain(|(t, _), _| *t != token);
        let (election, start) = self.sessions.remove(&token)?;
        let duration = start.elapsed().as_millis() as u64;
        Some(self.record(token, election, stage, duration, None, None))
    }

    fn record(
        &mut self,
        token: SessionToken,
        election: ElectionId,
        stage: RevealStage,
        duration_ms: u64,
        names_requested: Option<u64>,
        fallbacks: Option<u64>,
    ) -> RevealMetrics {
        let metrics = RevealMetrics {
            token,
            election,
            stage,
            duration_ms,
            names_requested,
            fallbacks,
            timestamp: Utc::now(),
        };
        self.recorded.push(metrics.clone());
        if self.recorded.len() > self.limit {
            let excess = self.recorded.len() - self.limit;
            self.recorded.drain(..excess);
        }
        metrics
    }

    pub fn recorded(&self) -> &[RevealMetrics] {
        &self.recorded
    }

    /// Print performance summary
    pub fn print_summary(metrics: &[RevealMetrics]) {
        use colored::*;

        println!("\n{}", "📊 Reveal Timing Summary".bright_cyan().bold());
        println!("{}", "=".repeat(50).bright_cyan());

        for metric in metrics {
            let stage_color = match metric.stage {
                RevealStage::Countdown => "yellow",
                RevealStage::Resolution => "blue",
                RevealStage::Cancelled => "red",
                RevealStage::Complete => "bright_green",
            };

            println!(
                "{} [{}]: {} ms{}",
                metric.stage.to_string().color(stage_color),
                metric.election,
                metric.duration_ms.to_string().bright_white(),
                match (metric.names_requested, metric.fallbacks) {
                    (Some(names), Some(fallbacks)) if fallbacks > 0 => format!(
                        " ({} names, {} unresolved)",
                        names.to_string().bright_yellow(),
                        fallbacks.to_string().bright_red()
                    ),
                    (Some(names), _) => format!(" ({} names)", names.to_string().bright_yellow()),
                    _ => String::new(),
                }
            );
        }

        println!();
    }
}
