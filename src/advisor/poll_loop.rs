use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc::Sender,
    },
    thread,
    time::{Duration, Instant},
};

use log::{debug, error, info, warn};

use crate::{
    ShiftIndicatorError,
    audio::AudioSink,
    config::Settings,
    shiftpoints::{Resolution, ShiftpointTable},
    telemetry::{TelemetryRecord, TelemetrySample, TelemetrySource},
};

use super::{gate::AlertGate, session::SessionTracker};

/// Time source for the loop. Swapped out in tests to avoid real sleeps.
pub trait Clock {
    fn now(&self) -> Instant;
    fn sleep(&self, duration: Duration);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoopConfig {
    pub poll_interval: Duration,
    pub reconnect_delay: Duration,
    pub min_time_between_beeps: Duration,
    pub clutch_engagement_floor: f32,
}

impl From<&Settings> for LoopConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            poll_interval: settings.poll_interval(),
            reconnect_delay: settings.reconnect_delay(),
            min_time_between_beeps: settings.min_time_between_beeps(),
            clutch_engagement_floor: settings.clutch_engagement_floor,
        }
    }
}

/// Counters collected while the loop runs.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LoopSummary {
    pub ticks: usize,
    pub samples: usize,
    pub gaps: usize,
    pub sessions: usize,
    pub disconnects: usize,
    pub alerts: usize,
    pub playback_failures: usize,
}

/// Drives the session tracker and the alert gate from a telemetry source and plays
/// the alert on the sink whenever the gate fires.
pub struct PollLoop<'a, S, A, C = SystemClock> {
    source: S,
    sink: A,
    clock: C,
    table: &'a ShiftpointTable,
    config: LoopConfig,
    tracker: SessionTracker,
    gate: AlertGate,
    recorder: Option<Sender<TelemetryRecord>>,
    backoff_pending: bool,
    summary: LoopSummary,
}

impl<'a, S, A> PollLoop<'a, S, A, SystemClock>
where
    S: TelemetrySource,
    A: AudioSink,
{
    pub fn new(source: S, sink: A, table: &'a ShiftpointTable, config: LoopConfig) -> Self {
        Self::with_clock(source, sink, table, config, SystemClock)
    }
}

impl<'a, S, A, C> PollLoop<'a, S, A, C>
where
    S: TelemetrySource,
    A: AudioSink,
    C: Clock,
{
    pub fn with_clock(
        source: S,
        sink: A,
        table: &'a ShiftpointTable,
        config: LoopConfig,
        clock: C,
    ) -> Self {
        Self {
            source,
            sink,
            clock,
            table,
            config,
            tracker: SessionTracker::new(),
            gate: AlertGate::new(config.min_time_between_beeps, config.clutch_engagement_floor),
            recorder: None,
            backoff_pending: false,
            summary: LoopSummary::default(),
        }
    }

    /// Forward every polled record to `sender`, typically a writer thread.
    pub fn record_to(mut self, sender: Sender<TelemetryRecord>) -> Self {
        self.recorder = Some(sender);
        self
    }

    pub fn tracker(&self) -> &SessionTracker {
        &self.tracker
    }

    pub fn gate(&self) -> &AlertGate {
        &self.gate
    }

    pub fn sink(&self) -> &A {
        &self.sink
    }

    /// Run until `shutdown` is set or the source runs out of data.
    ///
    /// # Errors
    ///
    /// Only unrecoverable errors end the loop with an error, such as unreadable
    /// session metadata. Everything else is logged and the loop keeps going.
    pub fn run(&mut self, shutdown: &AtomicBool) -> Result<LoopSummary, ShiftIndicatorError> {
        info!("Starting shift advisory loop");
        while !shutdown.load(Ordering::SeqCst) {
            let tick_start = self.clock.now();
            match self.tick() {
                Ok(()) => {}
                Err(ShiftIndicatorError::TelemetryExhausted) => {
                    info!("Telemetry source has no more data");
                    break;
                }
                Err(e) => return Err(e),
            }

            let elapsed = self.clock.now().saturating_duration_since(tick_start);
            if let Some(remaining) = self.config.poll_interval.checked_sub(elapsed) {
                if !remaining.is_zero() {
                    self.clock.sleep(remaining);
                }
            }
        }

        info!("Advisory loop stopped: {:?}", self.summary);
        Ok(self.summary)
    }

    /// One decision cycle.
    pub fn tick(&mut self) -> Result<(), ShiftIndicatorError> {
        self.summary.ticks += 1;

        if !self.source.is_connected() || !self.tracker.is_connected() {
            return self.reconnect();
        }

        let sample = match self.source.sample() {
            Ok(Some(sample)) => sample,
            Ok(None) => {
                self.summary.gaps += 1;
                if self.source.is_connected() {
                    self.record(TelemetryRecord::Gap);
                }
                return Ok(());
            }
            Err(ShiftIndicatorError::TelemetryExhausted) => {
                return Err(ShiftIndicatorError::TelemetryExhausted);
            }
            Err(e) => {
                warn!("Skipping telemetry tick: {}", e);
                return Ok(());
            }
        };
        self.summary.samples += 1;

        if !self.tracker.in_session() {
            return self.start_session(sample);
        }

        self.record(TelemetryRecord::Sample(sample));
        self.advise(&sample);
        Ok(())
    }

    /// One connection attempt, preceded by a single back-off wait unless this is the
    /// very first attempt.
    fn reconnect(&mut self) -> Result<(), ShiftIndicatorError> {
        if self.tracker.on_connection_lost(&mut self.gate) {
            self.summary.disconnects += 1;
            self.record(TelemetryRecord::Disconnect);
            self.backoff_pending = true;
        }
        if self.backoff_pending {
            self.clock.sleep(self.config.reconnect_delay);
        }

        match self.tracker.on_connection_established(&mut self.source) {
            Ok(()) => {
                self.backoff_pending = false;
                Ok(())
            }
            Err(ShiftIndicatorError::TelemetryExhausted) => {
                Err(ShiftIndicatorError::TelemetryExhausted)
            }
            Err(e) => {
                debug!(
                    "Connection attempt failed ({}), retrying in {:?}",
                    e, self.config.reconnect_delay
                );
                self.backoff_pending = true;
                Ok(())
            }
        }
    }

    fn start_session(&mut self, sample: TelemetrySample) -> Result<(), ShiftIndicatorError> {
        let metadata = match self.source.session_metadata() {
            Ok(metadata) => metadata,
            // dropped before the roster could be read, retry on reconnect
            Err(e) if !self.source.is_connected() => {
                warn!("Connection lost while reading session metadata: {}", e);
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        self.record(TelemetryRecord::Session(metadata.clone()));
        self.record(TelemetryRecord::Sample(sample));
        self.tracker
            .on_first_sample_after_connect(&metadata, self.table);
        self.summary.sessions += 1;
        Ok(())
    }

    fn advise(&mut self, sample: &TelemetrySample) {
        let lookup = self.table.resolve(self.tracker.vehicle_id(), sample.gear);
        if lookup.resolution == Resolution::GearOutOfRange
            && self.tracker.should_report_gear(sample.gear)
        {
            warn!(
                "Gear {} is past the shiftpoints of vehicle '{}', using the last one ({} rpm, current {:.0} rpm)",
                sample.gear,
                self.tracker.vehicle_id(),
                lookup.rpm,
                sample.rpm
            );
        }

        let now = self.clock.now();
        if !self
            .gate
            .decide(sample, &lookup, self.tracker.default_shift_rpm(), now)
        {
            return;
        }

        self.summary.alerts += 1;
        debug!(
            "Shift alert: vehicle '{}', gear {}, {:.0} rpm",
            self.tracker.vehicle_id(),
            sample.gear,
            sample.rpm
        );
        if let Err(e) = self.sink.play() {
            self.summary.playback_failures += 1;
            error!(
                "Could not play alert (vehicle '{}', gear {}, {:.0} rpm): {}",
                self.tracker.vehicle_id(),
                sample.gear,
                sample.rpm,
                e
            );
        }
    }

    fn record(&mut self, record: TelemetryRecord) {
        let Some(sender) = &self.recorder else {
            return;
        };
        if let Err(e) = sender.send(record).map_err(ShiftIndicatorError::from) {
            warn!("{}, recording stopped", e);
            self.recorder = None;
        }
    }
}
