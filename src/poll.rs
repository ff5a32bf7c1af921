//! The discovery-and-polling state machine.
//!
//! `Starting -> Discovering -> Polling (repeats) -> Stopping`. While polling,
//! a failure count above the threshold sends the loop back through discovery
//! before the next fetch. Discovery does not reset the count, so every further
//! failure searches again until a fetch succeeds.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use crate::{
    app::{LogLevel, Logger},
    clock::{Clock, Sleeper},
    config::Config,
    discovery::{SensorEndpoint, SensorLocator},
    display::CharDisplay,
    heartbeat,
    render::{self, RenderSettings},
    telemetry::TelemetrySource,
    Result,
};

/// Stop request shared between the signal handler and the loop.
#[derive(Debug, Clone, Default)]
pub struct ShutdownToken(Arc<AtomicBool>);

impl ShutdownToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Starting,
    Discovering,
    Polling,
    Stopping,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopState {
    pub error_count: u32,
    pub first_run: bool,
    pub in_alarm: bool,
}

impl Default for LoopState {
    fn default() -> Self {
        Self {
            error_count: 0,
            first_run: true,
            in_alarm: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollSettings {
    pub error_threshold: u32,
    pub success_hold_secs: u32,
    pub failure_hold_secs: u32,
    pub render: RenderSettings,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for PollSettings {
    fn from(cfg: &Config) -> Self {
        Self {
            error_threshold: cfg.polling.error_threshold,
            success_hold_secs: cfg.polling.success_hold_secs,
            failure_hold_secs: cfg.polling.failure_hold_secs,
            render: RenderSettings::from(&cfg.display),
        }
    }
}

pub struct PollLoop<L, F, D, S, C> {
    locator: L,
    source: F,
    display: D,
    sleeper: S,
    clock: C,
    settings: PollSettings,
    shutdown: ShutdownToken,
    logger: Arc<Logger>,
    phase: Phase,
    state: LoopState,
    endpoint: Option<SensorEndpoint>,
}

impl<L, F, D, S, C> PollLoop<L, F, D, S, C>
where
    L: SensorLocator,
    F: TelemetrySource,
    D: CharDisplay,
    S: Sleeper,
    C: Clock,
{
    pub fn new(locator: L, source: F, display: D, sleeper: S, clock: C, settings: PollSettings) -> Self {
        Self {
            locator,
            source,
            display,
            sleeper,
            clock,
            settings,
            shutdown: ShutdownToken::new(),
            logger: Arc::new(Logger::stderr(LogLevel::Warn)),
            phase: Phase::Starting,
            state: LoopState::default(),
            endpoint: None,
        }
    }

    pub fn with_shutdown(mut self, shutdown: ShutdownToken) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn with_logger(mut self, logger: Arc<Logger>) -> Self {
        self.logger = logger;
        self
    }

    /// Step until `Stopping`, then show the shutdown message and release the display.
    pub fn run(&mut self) -> Result<()> {
        while self.step() != Phase::Stopping {}
        self.logger.info("poll loop stopping");
        let shown = render::render_shutdown(&mut self.display);
        let closed = self.display.close();
        shown.and(closed)
    }

    /// Advance the machine by one transition and return the new phase.
    pub fn step(&mut self) -> Phase {
        if self.phase != Phase::Stopping && self.shutdown.is_requested() {
            self.phase = Phase::Stopping;
            return self.phase;
        }
        match self.phase {
            Phase::Starting => self.phase = Phase::Discovering,
            Phase::Discovering => {
                self.discover();
                self.phase = Phase::Polling;
            }
            Phase::Polling => {
                if self.state.error_count > self.settings.error_threshold {
                    self.logger.warn(format!(
                        "{} consecutive failures; searching for the sensor again",
                        self.state.error_count
                    ));
                    self.phase = Phase::Discovering;
                    self.discover();
                    self.phase = Phase::Polling;
                }
                self.poll_once();
            }
            Phase::Stopping => {}
        }
        self.phase
    }

    fn discover(&mut self) {
        let endpoint = self.locator.locate(&mut self.display);
        self.logger.info(format!("polling sensor at {endpoint}"));
        self.endpoint = Some(endpoint);
    }

    fn poll_once(&mut self) {
        let Some(endpoint) = self.endpoint else {
            self.phase = Phase::Discovering;
            return;
        };
        self.logger.debug("Attempting to retrieve data");
        match self.source.fetch(&endpoint) {
            Err(err) => {
                self.state.error_count = self.state.error_count.saturating_add(1);
                self.logger.error(format!(
                    "Error getting remote data ({} in a row): {err}",
                    self.state.error_count
                ));
                if self.state.first_run {
                    self.sleeper
                        .sleep(Duration::from_secs(self.settings.failure_hold_secs.into()));
                } else {
                    self.heartbeat(self.settings.failure_hold_secs);
                }
            }
            Ok(snapshot) => {
                self.logger.debug("data retrieved successfully");
                self.logger.trace(format!("{snapshot:?}"));
                self.state.error_count = 0;
                self.state.first_run = false;
                self.state.in_alarm = snapshot.has_alarms;
                let failures = render::render_snapshot(
                    &mut self.display,
                    &snapshot,
                    self.clock.now(),
                    &self.settings.render,
                );
                for failure in failures {
                    self.logger
                        .error(format!("render {} failed: {}", failure.region, failure.error));
                }
                if let Some(lines) = self.display.snapshot() {
                    self.logger.debug(format!("display: {}", lines.join(" | ")));
                }
                self.heartbeat(self.settings.success_hold_secs);
            }
        }
    }

    fn heartbeat(&mut self, seconds: u32) {
        if let Err(err) = heartbeat::beat(
            &mut self.display,
            &mut self.sleeper,
            seconds,
            self.state.in_alarm,
        ) {
            self.logger.warn(format!("heartbeat: {err}"));
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn endpoint(&self) -> Option<SensorEndpoint> {
        self.endpoint
    }

    pub fn shutdown_token(&self) -> ShutdownToken {
        self.shutdown.clone()
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    pub fn sleeper(&self) -> &S {
        &self.sleeper
    }

    pub fn sleeper_mut(&mut self) -> &mut S {
        &mut self.sleeper
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_is_shared_between_clones() {
        let token = ShutdownToken::new();
        let handle = token.clone();
        assert!(!token.is_requested());
        handle.request_stop();
        assert!(token.is_requested());
    }

    #[test]
    fn loop_state_starts_on_first_run() {
        let state = LoopState::default();
        assert_eq!(state.error_count, 0);
        assert!(state.first_run);
        assert!(!state.in_alarm);
    }

    #[test]
    fn settings_follow_config() {
        let mut cfg = Config::default();
        cfg.polling.error_threshold = 2;
        cfg.display.temperature_unit = 'C';
        let settings = PollSettings::from(&cfg);
        assert_eq!(settings.error_threshold, 2);
        assert_eq!(settings.success_hold_secs, 10);
        assert_eq!(settings.failure_hold_secs, 5);
        assert_eq!(settings.render.temperature_unit, 'C');
    }
}
