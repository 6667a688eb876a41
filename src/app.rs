//! Synchronous control loops driving a [`TrackingSession`].
//!
//! Each loop iteration blocks on the next frame (or direction sample), runs
//! detection, locks the shared session for the whole tick and sends the
//! resulting command. Other threads observe and tune the loop through
//! [`SharedSession`], [`TuningHandle`] and [`StopHandle`].

use crate::{
    actuator::Actuator,
    config::TrackerConfig,
    error::{Error, Result},
    sensors::{Detector, DirectionSensor, FrameObservation, FrameSource},
    session::{SessionStatus, TickOutcome, TrackingSession},
};
use log::{debug, info, warn};
use std::{
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, Mutex, MutexGuard, RwLock,
    },
    thread,
    time::{Duration, Instant},
};

/// Session shared between the control loop and status readers
pub type SharedSession = Arc<Mutex<TrackingSession>>;

/// Lock a shared session
///
/// # Errors
///
/// Returns [`Error::StatePoisoned`] if a thread panicked while holding the lock
pub fn lock_session(session: &SharedSession) -> Result<MutexGuard<'_, TrackingSession>> {
    session.lock().map_err(|e| Error::StatePoisoned(e.to_string()))
}

/// Cooperative cancellation flag for a control loop
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the loop to stop after the current tick
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Live configuration shared with a running loop.
///
/// Writers validate before replacing the configuration; the loop picks up
/// a new generation at the top of its next tick.
#[derive(Debug, Clone)]
pub struct TuningHandle {
    config: Arc<RwLock<TrackerConfig>>,
    generation: Arc<AtomicU64>,
}

impl TuningHandle {
    #[must_use]
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config: Arc::new(RwLock::new(config)),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Copy of the current configuration
    ///
    /// # Errors
    ///
    /// Returns [`Error::StatePoisoned`] if a writer panicked
    pub fn snapshot(&self) -> Result<TrackerConfig> {
        self.config
            .read()
            .map(|config| config.clone())
            .map_err(|e| Error::StatePoisoned(e.to_string()))
    }

    /// Replace the configuration
    ///
    /// # Errors
    ///
    /// Returns the validation error and keeps the old configuration if `config` is invalid
    pub fn update(&self, config: TrackerConfig) -> Result<()> {
        config.validate()?;
        let mut current = self.config.write().map_err(|e| Error::StatePoisoned(e.to_string()))?;
        *current = config;
        self.generation.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    /// Edit a copy of the configuration and install it if still valid
    ///
    /// # Errors
    ///
    /// Returns the validation error and keeps the old configuration if the edit is invalid
    pub fn modify<F: FnOnce(&mut TrackerConfig)>(&self, edit: F) -> Result<()> {
        let mut config = self.snapshot()?;
        edit(&mut config);
        self.update(config)
    }

    /// Incremented on every successful update
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }
}

/// State common to both control loops
struct LoopControl {
    session: SharedSession,
    stop: StopHandle,
    tuning: TuningHandle,
    applied_generation: u64,
    period: Option<Duration>,
    max_ticks: Option<u64>,
}

impl LoopControl {
    fn new(config: TrackerConfig) -> Result<Self> {
        let session = TrackingSession::new(config.clone())?;
        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            stop: StopHandle::new(),
            tuning: TuningHandle::new(config),
            applied_generation: 0,
            period: None,
            max_ticks: None,
        })
    }

    fn should_stop(&self, ticks: u64) -> bool {
        if self.stop.is_stopped() {
            info!("Stop requested");
            return true;
        }
        self.max_ticks.is_some_and(|max| ticks >= max)
    }

    fn apply_pending_tuning(&mut self) -> Result<()> {
        let generation = self.tuning.generation();
        if generation == self.applied_generation {
            return Ok(());
        }
        let config = self.tuning.snapshot()?;
        if let Err(e) = lock_session(&self.session)?.apply_config(config) {
            warn!("Rejected tuning update {}: {}", generation, e);
        } else {
            info!("Applied tuning update {}", generation);
        }
        self.applied_generation = generation;
        Ok(())
    }

    fn pace(&self, tick_started: Instant) {
        if let Some(period) = self.period {
            let remaining = period.saturating_sub(tick_started.elapsed());
            if !remaining.is_zero() {
                thread::sleep(remaining);
            }
        }
    }

    /// Return to neutral after the loop ends, whatever ended it
    fn finish<A: Actuator>(&self, actuator: &mut A, result: Result<u64>) -> Result<SessionStatus> {
        let mut session = lock_session(&self.session)?;
        if let Err(e) = session.reset(actuator) {
            warn!("Failed to return to neutral pose: {}", e);
        }
        let ticks = result?;
        let status = session.status();
        info!(
            "Control loop finished after {} ticks: {} activations, {} commands, {} timeouts",
            ticks, status.stats.activations, status.stats.commands_sent, status.stats.timeouts
        );
        Ok(status)
    }
}

/// Camera-driven tracking loop
pub struct TrackingApp<S, D, A> {
    source: S,
    detector: D,
    actuator: A,
    control: LoopControl,
}

impl<S, D, A> TrackingApp<S, D, A>
where
    S: FrameSource,
    D: Detector<S::Frame>,
    A: Actuator,
{
    /// Create the loop and its session
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid
    pub fn new(source: S, detector: D, actuator: A, config: TrackerConfig) -> Result<Self> {
        info!("Initializing tracking loop");
        Ok(Self {
            source,
            detector,
            actuator,
            control: LoopControl::new(config)?,
        })
    }

    /// Sleep so that ticks are at least `period` apart
    #[must_use]
    pub fn with_period(mut self, period: Duration) -> Self {
        self.control.period = Some(period);
        self
    }

    /// Stop after `max_ticks` frames
    #[must_use]
    pub fn with_max_ticks(mut self, max_ticks: u64) -> Self {
        self.control.max_ticks = Some(max_ticks);
        self
    }

    #[must_use]
    pub fn session(&self) -> SharedSession {
        Arc::clone(&self.control.session)
    }

    #[must_use]
    pub fn stop_handle(&self) -> StopHandle {
        self.control.stop.clone()
    }

    #[must_use]
    pub fn tuning_handle(&self) -> TuningHandle {
        self.control.tuning.clone()
    }

    #[must_use]
    pub const fn actuator(&self) -> &A {
        &self.actuator
    }

    #[must_use]
    pub const fn source(&self) -> &S {
        &self.source
    }

    /// Process one frame; `Ok(None)` at the end of the stream
    ///
    /// # Errors
    ///
    /// Returns frame source errors, invalid frame sizes and poisoned state.
    /// Detector errors are logged and the frame is treated as empty.
    pub fn tick(&mut self) -> Result<Option<TickOutcome>> {
        self.control.apply_pending_tuning()?;

        let Some(frame) = self.source.next_frame()? else {
            return Ok(None);
        };

        let detections = match self.detector.detect(&frame) {
            Ok(detections) => detections,
            Err(e) => {
                warn!("Detection failed, treating frame as empty: {}", e);
                Vec::new()
            }
        };
        let observation = FrameObservation::from_frame(&frame, detections);

        let outcome = lock_session(&self.control.session)?.on_frame(&observation, &mut self.actuator)?;
        debug!("tick: {} ({} detections)", outcome.state, observation.detections.len());
        Ok(Some(outcome))
    }

    /// Run until the stream ends, the stop handle fires or the tick limit is hit.
    ///
    /// The session is reset and the neutral pose commanded before returning,
    /// including when the loop fails.
    ///
    /// # Errors
    ///
    /// Returns the first error from [`TrackingApp::tick`]
    pub fn run(&mut self) -> Result<SessionStatus> {
        info!("Starting tracking loop");
        let result = self.run_loop();
        self.control.finish(&mut self.actuator, result)
    }

    fn run_loop(&mut self) -> Result<u64> {
        let mut ticks = 0;
        while !self.control.should_stop(ticks) {
            let started = Instant::now();
            if self.tick()?.is_none() {
                info!("End of frame stream");
                break;
            }
            ticks += 1;
            self.control.pace(started);
        }
        Ok(ticks)
    }
}

/// Sound-direction tracking loop
pub struct DirectionTrackingApp<S, A> {
    sensor: S,
    actuator: A,
    control: LoopControl,
}

impl<S, A> DirectionTrackingApp<S, A>
where
    S: DirectionSensor,
    A: Actuator,
{
    /// Create the loop and its session
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid
    pub fn new(sensor: S, actuator: A, config: TrackerConfig) -> Result<Self> {
        info!("Initializing sound tracking loop");
        Ok(Self {
            sensor,
            actuator,
            control: LoopControl::new(config)?,
        })
    }

    #[must_use]
    pub fn with_period(mut self, period: Duration) -> Self {
        self.control.period = Some(period);
        self
    }

    #[must_use]
    pub fn with_max_ticks(mut self, max_ticks: u64) -> Self {
        self.control.max_ticks = Some(max_ticks);
        self
    }

    #[must_use]
    pub fn session(&self) -> SharedSession {
        Arc::clone(&self.control.session)
    }

    #[must_use]
    pub fn stop_handle(&self) -> StopHandle {
        self.control.stop.clone()
    }

    #[must_use]
    pub fn tuning_handle(&self) -> TuningHandle {
        self.control.tuning.clone()
    }

    #[must_use]
    pub const fn actuator(&self) -> &A {
        &self.actuator
    }

    /// Process one direction sample; `Ok(None)` at the end of the stream
    ///
    /// # Errors
    ///
    /// Returns sensor errors and poisoned state
    pub fn tick(&mut self) -> Result<Option<TickOutcome>> {
        self.control.apply_pending_tuning()?;

        let Some(sample) = self.sensor.poll()? else {
            return Ok(None);
        };

        let outcome = lock_session(&self.control.session)?.on_direction(&sample, &mut self.actuator)?;
        Ok(Some(outcome))
    }

    /// Run until the stream ends, the stop handle fires or the tick limit is hit.
    ///
    /// # Errors
    ///
    /// Returns the first error from [`DirectionTrackingApp::tick`]
    pub fn run(&mut self) -> Result<SessionStatus> {
        info!("Starting sound tracking loop");
        let result = self.run_loop();
        self.control.finish(&mut self.actuator, result)
    }

    fn run_loop(&mut self) -> Result<u64> {
        let mut ticks = 0;
        while !self.control.should_stop(ticks) {
            let started = Instant::now();
            if self.tick()?.is_none() {
                info!("End of direction stream");
                break;
            }
            ticks += 1;
            self.control.pace(started);
        }
        Ok(ticks)
    }
}
