//! Async driver for [`RevealMachine`].
//!
//! One task owns the machine and applies events one at a time: user commands
//! from [`RevealHandle`]s, timer ticks and resolution results from the tasks it
//! spawns. Effects returned by the machine are carried out here.

use super::machine::{Effect, Event, Phase, RevealMachine, RevealUpdate, RevealView, SessionToken};
use super::metrics::{MetricsCollector, RevealMetrics, RevealStage};
use super::{Result, RevealError};
use crate::cache::NameCache;
use crate::config::EngineConfig;
use crate::model::election::Election;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

const UPDATE_CAPACITY: usize = 64;

enum Command {
    Select(Election, oneshot::Sender<Result<SessionToken>>),
    Cancel(oneshot::Sender<Result<()>>),
    Close(oneshot::Sender<Result<()>>),
    Metrics(oneshot::Sender<Vec<RevealMetrics>>),
}

pub struct RevealSequencer {
    machine: RevealMachine,
    names: Arc<NameCache>,
    tick_interval: Duration,
    rx_command: mpsc::UnboundedReceiver<Command>,
    tx_internal: mpsc::UnboundedSender<Event>,
    rx_internal: mpsc::UnboundedReceiver<Event>,
    timers: HashMap<SessionToken, JoinHandle<()>>,
    resolutions: HashMap<SessionToken, JoinHandle<()>>,
    metrics: MetricsCollector,
    tx_updates: broadcast::Sender<RevealUpdate>,
    tx_view: watch::Sender<RevealView>,
}

impl RevealSequencer {
    /// Start the reveal engine on the current tokio runtime. It runs until every
    /// handle has been dropped.
    pub fn spawn(config: &EngineConfig, names: Arc<NameCache>) -> RevealHandle {
        let (sequencer, handle) = Self::new(config, names);
        tokio::spawn(sequencer.run());
        handle
    }

    fn new(config: &EngineConfig, names: Arc<NameCache>) -> (Self, RevealHandle) {
        let (tx_command, rx_command) = mpsc::unbounded_channel();
        let (tx_internal, rx_internal) = mpsc::unbounded_channel();
        let (tx_updates, _) = broadcast::channel(UPDATE_CAPACITY);
        let (tx_view, rx_view) = watch::channel(RevealView::default());

        let sequencer = Self {
            machine: RevealMachine::new(config.countdown_from),
            names,
            tick_interval: config.tick_interval(),
            rx_command,
            tx_internal,
            rx_internal,
            timers: HashMap::new(),
            resolutions: HashMap::new(),
            metrics: MetricsCollector::new(),
            tx_updates: tx_updates.clone(),
            tx_view,
        };
        let handle = RevealHandle {
            tx_command,
            tx_updates,
            rx_view,
        };
        (sequencer, handle)
    }

    async fn run(mut self) {
        loop {
            tokio::select! {
                command = self.rx_command.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => break,
                },
                Some(event) = self.rx_internal.recv() => self.handle_internal(event),
            }
        }
        debug!("reveal engine stopping");
        for (_, timer) in self.timers.drain() {
            timer.abort();
        }
        for (_, resolution) in self.resolutions.drain() {
            resolution.abort();
        }
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Select(election, reply) => {
                let result = self
                    .dispatch(Event::Select(election))
                    .and_then(|_| self.machine.token().ok_or(RevealError::EngineStopped));
                let _ = reply.send(result);
            }
            Command::Cancel(reply) => {
                let _ = reply.send(self.dispatch(Event::Cancel));
            }
            Command::Close(reply) => {
                let _ = reply.send(self.dispatch(Event::Close));
            }
            Command::Metrics(reply) => {
                let _ = reply.send(self.metrics.recorded().to_vec());
            }
        }
    }

    fn handle_internal(&mut self, event: Event) {
        if let Event::Settled(token, _) = &event {
            self.resolutions.remove(token);
        }
        if let Err(e) = self.dispatch(event) {
            warn!(error = %e, "internal reveal event rejected");
        }
    }

    fn dispatch(&mut self, event: Event) -> Result<()> {
        let effects = self.machine.apply(event)?;
        self.tx_view.send_replace(self.machine.view());
        for effect in effects {
            self.execute(effect);
        }
        Ok(())
    }

    fn execute(&mut self, effect: Effect) {
        match effect {
            Effect::StartCountdown(token) => {
                self.start_session_metrics(token);
                self.metrics.start_stage(token, RevealStage::Countdown);
                let tx = self.tx_internal.clone();
                let interval = self.tick_interval;
                let timer = tokio::spawn(async move {
                    loop {
                        tokio::time::sleep(interval).await;
                        if tx.send(Event::Tick(token)).is_err() {
                            break;
                        }
                    }
                });
                if let Some(previous) = self.timers.insert(token, timer) {
                    previous.abort();
                }
            }
            Effect::StopCountdown(token) => {
                if let Some(timer) = self.timers.remove(&token) {
                    timer.abort();
                }
                self.metrics
                    .end_stage(token, RevealStage::Countdown, None, None);
            }
            Effect::Resolve(token, keys) => {
                self.start_session_metrics(token);
                self.metrics.start_stage(token, RevealStage::Resolution);
                debug!(token, names = keys.len(), "resolving candidate names");
                let names = Arc::clone(&self.names);
                let tx = self.tx_internal.clone();
                let resolution = tokio::spawn(async move {
                    let resolved = names.resolve_all(&keys).await;
                    let _ = tx.send(Event::Settled(token, resolved));
                });
                self.resolutions.insert(token, resolution);
            }
            Effect::AbandonResolution(token) => {
                if let Some(resolution) = self.resolutions.remove(&token) {
                    resolution.abort();
                }
            }
            Effect::Publish(update) => {
                self.record_terminal_metrics(&update);
                // No subscribers is fine.
                let _ = self.tx_updates.send(update);
            }
        }
    }

    fn start_session_metrics(&mut self, token: SessionToken) {
        if let Some(session) = self.machine.session().filter(|s| s.token == token) {
            self.metrics.start_session(token, &session.election.id);
        }
    }

    fn record_terminal_metrics(&mut self, update: &RevealUpdate) {
        match update.phase {
            Phase::Results => {
                let (requested, fallbacks) = match self.machine.view().report {
                    Some(report) => (
                        report.rows.len() as u64,
                        report.rows.iter().filter(|r| r.unresolved).count() as u64,
                    ),
                    None => (0, 0),
                };
                self.metrics.end_stage(
                    update.token,
                    RevealStage::Resolution,
                    Some(requested),
                    Some(fallbacks),
                );
                self.metrics.end_session(update.token, RevealStage::Complete);
            }
            // A session closed after results or cancellation has already been
            // ended, so this only records countdowns cancelled straight to idle.
            Phase::Cancelled | Phase::Idle => {
                self.metrics.end_session(update.token, RevealStage::Cancelled);
            }
            Phase::Countdown { .. } | Phase::Resolving => {}
        }
    }
}

/// Cloneable front end of a running reveal engine.
#[derive(Clone)]
pub struct RevealHandle {
    tx_command: mpsc::UnboundedSender<Command>,
    tx_updates: broadcast::Sender<RevealUpdate>,
    rx_view: watch::Receiver<RevealView>,
}

impl RevealHandle {
    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.tx_command
            .send(make(tx))
            .map_err(|_| RevealError::EngineStopped)?;
        rx.await.map_err(|_| RevealError::EngineStopped)
    }

    /// Start a reveal session for `election`, ending any session in progress.
    pub async fn select(&self, election: Election) -> Result<SessionToken> {
        self.request(|tx| Command::Select(election, tx)).await?
    }

    pub async fn cancel(&self) -> Result<()> {
        self.request(Command::Cancel).await?
    }

    pub async fn close(&self) -> Result<()> {
        self.request(Command::Close).await?
    }

    pub async fn metrics(&self) -> Result<Vec<RevealMetrics>> {
        self.request(Command::Metrics).await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RevealUpdate> {
        self.tx_updates.subscribe()
    }

    pub fn view(&self) -> RevealView {
        self.rx_view.borrow().clone()
    }

    /// Wait until session `token` reaches results or is cancelled, or until a
    /// newer session replaces it. Returns the view at that point.
    pub async fn wait_settled(&self, token: SessionToken) -> Result<RevealView> {
        let mut rx = self.rx_view.clone();
        loop {
            {
                let view = rx.borrow_and_update();
                if view.token != Some(token) || view.phase.is_settled() {
                    return Ok(view.clone());
                }
            }
            rx.changed()
                .await
                .map_err(|_| RevealError::EngineStopped)?;
        }
    }

    /// Select `election` and wait for its session to settle.
    pub async fn reveal(&self, election: Election) -> Result<RevealView> {
        let token = self.select(election).await?;
        self.wait_settled(token).await
    }
}
