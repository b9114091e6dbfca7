pub mod machine;
pub mod metrics;
pub mod sequencer;

pub use machine::{Effect, Event, Phase, RevealMachine, RevealUpdate, RevealView, SessionToken};
pub use sequencer::{RevealHandle, RevealSequencer};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RevealError {
    #[error("Cannot {event} while {phase}")]
    InvalidTransition { phase: Phase, event: &'static str },
    #[error("Reveal engine has stopped")]
    EngineStopped,
}

pub type Result<T> = std::result::Result<T, RevealError>;
