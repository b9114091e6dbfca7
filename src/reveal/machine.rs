//! Reveal state machine.
//!
//! All state changes go through [`RevealMachine::apply`]. The machine performs no
//! I/O: it returns the [`Effect`]s the driver must carry out. Every timer tick
//! and every resolution result carries the [`SessionToken`] of the session that
//! asked for it, and anything addressed to a session other than the live one is
//! dropped.

use crate::cache::{NameKey, ResolvedName};
use crate::model::election::{Election, ElectionId};
use crate::reports::tabulation::tally;
use crate::reports::RevealReport;
use std::fmt;
use tracing::{debug, info};

use super::{Result, RevealError};

pub type SessionToken = u64;

#[derive(Debug, Clone, PartialEq)]
pub enum Phase {
    Idle,
    Countdown { remaining: u32 },
    Resolving,
    Results,
    Cancelled,
}

impl Phase {
    /// The session has stopped moving on its own.
    pub fn is_settled(&self) -> bool {
        matches!(self, Phase::Idle | Phase::Results | Phase::Cancelled)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Idle => write!(f, "idle"),
            Phase::Countdown { remaining } => write!(f, "countdown({})", remaining),
            Phase::Resolving => write!(f, "resolving"),
            Phase::Results => write!(f, "results"),
            Phase::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Event {
    Select(Election),
    Tick(SessionToken),
    Settled(SessionToken, Vec<ResolvedName>),
    Cancel,
    Close,
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::Select(_) => "select",
            Event::Tick(_) => "tick",
            Event::Settled(..) => "settled",
            Event::Cancel => "cancel",
            Event::Close => "close",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RevealUpdate {
    pub token: SessionToken,
    pub phase: Phase,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    StartCountdown(SessionToken),
    StopCountdown(SessionToken),
    Resolve(SessionToken, Vec<NameKey>),
    AbandonResolution(SessionToken),
    Publish(RevealUpdate),
}

#[derive(Debug, Clone)]
pub struct RevealSession {
    pub token: SessionToken,
    pub election: Election,
    /// Indices of the candidates tied for the most votes.
    pub winners: Vec<usize>,
    pub phase: Phase,
    pub report: Option<RevealReport>,
}

/// Snapshot of the machine for observers.
#[derive(Debug, Clone, PartialEq)]
pub struct RevealView {
    pub token: Option<SessionToken>,
    pub election: Option<ElectionId>,
    pub phase: Phase,
    pub report: Option<RevealReport>,
}

impl Default for RevealView {
    fn default() -> Self {
        Self {
            token: None,
            election: None,
            phase: Phase::Idle,
            report: None,
        }
    }
}

pub struct RevealMachine {
    countdown_from: u32,
    last_token: SessionToken,
    session: Option<RevealSession>,
}

impl RevealMachine {
    pub fn new(countdown_from: u32) -> Self {
        Self {
            countdown_from,
            last_token: 0,
            session: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.session
            .as_ref()
            .map(|s| s.phase.clone())
            .unwrap_or(Phase::Idle)
    }

    pub fn session(&self) -> Option<&RevealSession> {
        self.session.as_ref()
    }

    pub fn token(&self) -> Option<SessionToken> {
        self.session.as_ref().map(|s| s.token)
    }

    pub fn view(&self) -> RevealView {
        match &self.session {
            Some(s) => RevealView {
                token: Some(s.token),
                election: Some(s.election.id.clone()),
                phase: s.phase.clone(),
                report: s.report.clone(),
            },
            None => RevealView::default(),
        }
    }

    pub fn apply(&mut self, event: Event) -> Result<Vec<Effect>> {
        debug!(event = event.name(), phase = %self.phase(), "reveal event");
        let mut effects = Vec::new();
        match event {
            Event::Select(election) => {
                self.terminate(&mut effects);
                self.begin(election, &mut effects);
            }
            Event::Tick(token) => self.tick(token, &mut effects),
            Event::Settled(token, names) => self.settle(token, names, &mut effects),
            Event::Cancel => match self.phase() {
                Phase::Countdown { .. } | Phase::Resolving => self.terminate(&mut effects),
                phase => {
                    return Err(RevealError::InvalidTransition {
                        phase,
                        event: "cancel",
                    })
                }
            },
            Event::Close => match self.phase() {
                Phase::Results | Phase::Cancelled => self.terminate(&mut effects),
                phase => {
                    return Err(RevealError::InvalidTransition {
                        phase,
                        event: "close",
                    })
                }
            },
        }
        Ok(effects)
    }

    fn set_phase(&mut self, phase: Phase, effects: &mut Vec<Effect>) {
        if let Some(session) = self.session.as_mut() {
            info!(token = session.token, election = %session.election.id, %phase, "reveal phase");
            session.phase = phase.clone();
            effects.push(Effect::Publish(RevealUpdate {
                token: session.token,
                phase,
            }));
        }
    }

    /// End the live session. A countdown goes straight back to idle, a resolving
    /// session is left cancelled, results and cancelled sessions are closed.
    fn terminate(&mut self, effects: &mut Vec<Effect>) {
        let (token, phase) = match &self.session {
            Some(s) => (s.token, s.phase.clone()),
            None => return,
        };
        match phase {
            Phase::Countdown { .. } => {
                effects.push(Effect::StopCountdown(token));
                self.close_session(token, effects);
            }
            Phase::Resolving => {
                effects.push(Effect::AbandonResolution(token));
                self.set_phase(Phase::Cancelled, effects);
            }
            Phase::Results | Phase::Cancelled | Phase::Idle => self.close_session(token, effects),
        }
    }

    fn close_session(&mut self, token: SessionToken, effects: &mut Vec<Effect>) {
        info!(token, "reveal phase idle");
        self.session = None;
        effects.push(Effect::Publish(RevealUpdate {
            token,
            phase: Phase::Idle,
        }));
    }

    fn begin(&mut self, election: Election, effects: &mut Vec<Effect>) {
        self.last_token += 1;
        let token = self.last_token;
        let winners = tally(&election.candidates).winners;
        self.session = Some(RevealSession {
            token,
            election,
            winners,
            phase: Phase::Idle,
            report: None,
        });
        self.set_phase(
            Phase::Countdown {
                remaining: self.countdown_from,
            },
            effects,
        );
        if self.countdown_from == 0 {
            self.begin_resolving(token, effects);
        } else {
            effects.push(Effect::StartCountdown(token));
        }
    }

    fn tick(&mut self, token: SessionToken, effects: &mut Vec<Effect>) {
        let remaining = match &self.session {
            Some(s) if s.token == token => match s.phase {
                Phase::Countdown { remaining } if remaining > 0 => remaining,
                _ => {
                    debug!(token, "dropping tick outside countdown");
                    return;
                }
            },
            _ => {
                debug!(token, "dropping tick for stale session");
                return;
            }
        };
        let remaining = remaining - 1;
        self.set_phase(Phase::Countdown { remaining }, effects);
        if remaining == 0 {
            effects.push(Effect::StopCountdown(token));
            self.begin_resolving(token, effects);
        }
    }

    fn begin_resolving(&mut self, token: SessionToken, effects: &mut Vec<Effect>) {
        self.set_phase(Phase::Resolving, effects);
        if let Some(session) = &self.session {
            let keys = session
                .election
                .candidates
                .iter()
                .map(|c| NameKey::for_candidate(&session.election, c))
                .collect();
            effects.push(Effect::Resolve(token, keys));
        }
    }

    fn settle(&mut self, token: SessionToken, names: Vec<ResolvedName>, effects: &mut Vec<Effect>) {
        let report = match &self.session {
            Some(s) if s.token == token && s.phase == Phase::Resolving => {
                RevealReport::build(&s.election, &names)
            }
            _ => {
                debug!(token, "dropping resolution for stale session");
                return;
            }
        };
        if let Some(session) = self.session.as_mut() {
            session.report = Some(report);
        }
        self.set_phase(Phase::Results, effects);
    }
}
