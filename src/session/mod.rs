//! Live detection session.
//!
//! A session owns the camera stream and the poll timer and runs classification
//! cycles on a fixed cadence:
//!
//! ```text
//! Idle --start--> Acquiring --ok--> Active --stop/close/drop--> Stopping --> Idle
//!                     \--camera error--> Idle
//! ```
//!
//! Cycles are single-flight: a tick that finds a cycle in flight is dropped,
//! never queued. Frame grabs and classify calls run on a worker thread,
//! outside the session lock, so that stopping the session releases the camera
//! and timer without waiting for them. A cycle only
//! writes its result back if the activation that started it is still the
//! current one; results of abandoned cycles are discarded.

mod throttle;
mod ticker;

pub use throttle::ErrorThrottle;
pub use ticker::Ticker;

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, TryLockError};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use crate::detect::{Classification, ClassificationResult, Classifier, Detection};
use crate::error::{ClassifyError, StartError};
use crate::frame::{FrameCapturer, DEFAULT_JPEG_QUALITY};
use crate::history::{HistoryEntry, HistoryLog};
use crate::ingest::{CameraDevice, CameraRequest, CameraStream};
use crate::notify::{Notice, Notifier};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1500);
pub const DEFAULT_ERROR_THROTTLE: Duration = Duration::from_millis(4000);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionPhase {
    Idle,
    Acquiring,
    Active,
    Stopping,
}

/// Why a poll did not start a cycle. Not an error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    Inactive,
    InFlight,
    NotReady,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PollOutcome {
    Started,
    Skipped(SkipReason),
    /// The cycle worker could not be launched.
    Failed,
}

/// What a cycle worker hands back to the session.
enum CycleOutcome {
    /// The track had no frame to give; nothing to report.
    NoFrame,
    CaptureFailed(anyhow::Error),
    Classified {
        dimensions: (u32, u32),
        result: Result<ClassificationResult, ClassifyError>,
    },
}

type SharedStream = Arc<Mutex<CameraStream>>;

fn lock_stream(stream: &SharedStream) -> MutexGuard<'_, CameraStream> {
    stream.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Stop a stream now unless a worker is mid-grab; in that case the worker's
/// handle is the last one and dropping it releases the camera.
fn release_stream(stream: SharedStream) {
    match stream.try_lock() {
        Ok(mut guard) => {
            guard.stop();
        }
        Err(TryLockError::Poisoned(poisoned)) => {
            poisoned.into_inner().stop();
        }
        Err(TryLockError::WouldBlock) => {
            log::debug!("camera busy with a frame grab; releasing when it returns");
        }
    }
}

#[derive(Clone, Debug)]
pub struct SessionSettings {
    pub poll_interval: Duration,
    pub error_throttle: Duration,
    pub jpeg_quality: u8,
    pub camera: CameraRequest,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            error_throttle: DEFAULT_ERROR_THROTTLE,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            camera: CameraRequest::default(),
        }
    }
}

/// Owned copy of what a renderer or CLI needs to show.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub phase: SessionPhase,
    pub presentation_open: bool,
    pub detections: Vec<Detection>,
    pub latest: Option<Classification>,
    pub history: Vec<HistoryEntry>,
    pub source_dimensions: (u32, u32),
}

impl SessionSnapshot {
    pub fn is_active(&self) -> bool {
        self.phase == SessionPhase::Active
    }
}

struct SessionState {
    phase: SessionPhase,
    /// Bumped on every activation; cycles carry the epoch that started them.
    epoch: u64,
    presentation_open: bool,
    // stream and ticker are installed and removed together; the stream lock is
    // only ever taken after this one, never the other way round
    stream: Option<SharedStream>,
    ticker: Option<Ticker>,
    source_dimensions: (u32, u32),
    in_flight: Option<u64>,
    outstanding: usize,
    current_detections: Vec<Detection>,
    latest: Option<Classification>,
    history: HistoryLog,
    throttle: ErrorThrottle,
}

struct SessionCore {
    state: Mutex<SessionState>,
    idle: Condvar,
    classifier: Arc<dyn Classifier>,
    notifier: Arc<dyn Notifier>,
    capturer: FrameCapturer,
    cycles_started: AtomicU64,
}

impl SessionCore {
    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn poll(self: &Arc<Self>, expected_epoch: Option<u64>) -> PollOutcome {
        let mut state = self.lock();
        if state.phase != SessionPhase::Active
            || expected_epoch.is_some_and(|epoch| epoch != state.epoch)
        {
            return PollOutcome::Skipped(SkipReason::Inactive);
        }
        if state.in_flight.is_some() {
            return PollOutcome::Skipped(SkipReason::InFlight);
        }
        let Some(stream) = state.stream.clone() else {
            return PollOutcome::Skipped(SkipReason::NotReady);
        };
        // no grab holds the stream while nothing is in flight
        let (width, height) = lock_stream(&stream).dimensions();
        if width == 0 || height == 0 {
            return PollOutcome::Skipped(SkipReason::NotReady);
        }

        let epoch = state.epoch;
        state.in_flight = Some(epoch);
        state.outstanding += 1;
        drop(state);

        let cycle = self.cycles_started.fetch_add(1, Ordering::SeqCst) + 1;
        log::debug!("cycle {} started ({}x{})", cycle, width, height);

        let core = Arc::clone(self);
        let spawned = std::thread::Builder::new()
            .name("classify-cycle".to_string())
            .spawn(move || {
                let outcome = core.run_cycle(stream);
                core.finish_cycle(epoch, outcome);
            });
        match spawned {
            Ok(_) => PollOutcome::Started,
            Err(err) => {
                log::error!("failed to spawn classify worker: {}", err);
                self.finish_cycle(
                    epoch,
                    CycleOutcome::Classified {
                        dimensions: (width, height),
                        result: Err(ClassifyError::Transport(
                            crate::error::TransportError::Io(err.to_string()),
                        )),
                    },
                );
                PollOutcome::Failed
            }
        }
    }

    /// Grab, encode and classify one frame. Runs without the session lock.
    fn run_cycle(&self, stream: SharedStream) -> CycleOutcome {
        let mut guard = lock_stream(&stream);
        let captured = match guard.primary_track() {
            Some(track) => self.capturer.capture(track),
            None => Ok(None),
        };
        drop(guard);
        // a stopped session's camera goes away with the last handle
        drop(stream);

        let frame = match captured {
            Ok(Some(frame)) => frame,
            Ok(None) => return CycleOutcome::NoFrame,
            Err(err) => return CycleOutcome::CaptureFailed(err),
        };
        log::debug!(
            "classifying {}x{} frame ({} bytes)",
            frame.width,
            frame.height,
            frame.len()
        );
        CycleOutcome::Classified {
            dimensions: (frame.width, frame.height),
            result: self.classifier.classify(&frame),
        }
    }

    fn finish_cycle(&self, epoch: u64, outcome: CycleOutcome) {
        let mut state = self.lock();
        state.outstanding = state.outstanding.saturating_sub(1);
        if state.in_flight == Some(epoch) {
            state.in_flight = None;
        }
        let current = state.phase == SessionPhase::Active && state.epoch == epoch;

        let notice = match outcome {
            CycleOutcome::NoFrame => None,
            CycleOutcome::CaptureFailed(err) => {
                log::warn!("frame capture failed: {:#}", err);
                if current && state.throttle.allow(Instant::now()) {
                    Some(Notice::detection_error("Unable to capture the current frame."))
                } else {
                    None
                }
            }
            CycleOutcome::Classified {
                dimensions,
                result: Ok(result),
            } if current => {
                state.source_dimensions = dimensions;
                apply_result(&mut state, result);
                None
            }
            CycleOutcome::Classified { result: Ok(_), .. } => {
                log::debug!("discarding result of abandoned cycle (epoch {})", epoch);
                None
            }
            CycleOutcome::Classified {
                result: Err(err), ..
            } => {
                log::warn!("detection failed: {}", err);
                if current && state.throttle.allow(Instant::now()) {
                    Some(Notice::detection_error(err.to_string()))
                } else {
                    None
                }
            }
        };
        self.idle.notify_all();
        drop(state);

        if let Some(notice) = notice {
            self.notifier.notify(notice);
        }
    }
}

fn apply_result(state: &mut SessionState, result: ClassificationResult) {
    let ClassificationResult {
        top_prediction,
        detections,
    } = result;
    state.current_detections = detections.clone();

    let Some(top) = top_prediction else {
        state.latest = None;
        return;
    };
    let detected_at = epoch_millis();
    let entry = HistoryEntry::new(&top.label, top.waste_type, top.confidence, detected_at);
    if state.history.record(entry) {
        log::info!(
            "detected {} ({}, confidence {:.2})",
            top.label,
            top.waste_type,
            top.confidence
        );
    }
    state.latest = Some(Classification {
        label: top.label,
        waste_type: top.waste_type,
        confidence: top.confidence,
        detections,
        detected_at,
    });
}

fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// A live detection session bound to one camera device and one classifier.
pub struct DetectionSession {
    core: Arc<SessionCore>,
    device: Box<dyn CameraDevice>,
    settings: SessionSettings,
}

impl DetectionSession {
    pub fn new(
        device: Box<dyn CameraDevice>,
        classifier: Arc<dyn Classifier>,
        notifier: Arc<dyn Notifier>,
        settings: SessionSettings,
    ) -> Self {
        let state = SessionState {
            phase: SessionPhase::Idle,
            epoch: 0,
            presentation_open: false,
            stream: None,
            ticker: None,
            source_dimensions: (0, 0),
            in_flight: None,
            outstanding: 0,
            current_detections: Vec::new(),
            latest: None,
            history: HistoryLog::new(),
            throttle: ErrorThrottle::new(settings.error_throttle),
        };
        Self {
            core: Arc::new(SessionCore {
                state: Mutex::new(state),
                idle: Condvar::new(),
                classifier,
                notifier,
                capturer: FrameCapturer::new(settings.jpeg_quality),
                cycles_started: AtomicU64::new(0),
            }),
            device,
            settings,
        }
    }

    /// Acquire the camera and begin polling.
    ///
    /// Starting an active session only re-opens the presentation surface.
    /// On camera failure the session is back in `Idle`, holds nothing and the
    /// failure has already been notified.
    pub fn start(&self) -> Result<(), StartError> {
        let epoch = {
            let mut state = self.core.lock();
            match state.phase {
                SessionPhase::Active => {
                    state.presentation_open = true;
                    return Ok(());
                }
                SessionPhase::Acquiring => return Ok(()),
                SessionPhase::Idle | SessionPhase::Stopping => {}
            }
            state.phase = SessionPhase::Acquiring;
            state.epoch += 1;
            state.epoch
        };

        log::info!("requesting camera {}", self.device.describe());
        let opened = self.device.open(&self.settings.camera);

        let mut state = self.core.lock();
        if state.phase != SessionPhase::Acquiring || state.epoch != epoch {
            drop(state);
            log::info!("camera request superseded by stop; releasing");
            if let Ok(mut stream) = opened {
                stream.stop();
            }
            return Ok(());
        }

        let mut stream = match opened {
            Ok(stream) => stream,
            Err(err) => {
                state.phase = SessionPhase::Idle;
                drop(state);
                log::error!("camera access failed: {}", err);
                self.core.notifier.notify(Notice::camera_error());
                return Err(err.into());
            }
        };

        let weak = Arc::downgrade(&self.core);
        let ticker = Ticker::spawn("detection-poll", self.settings.poll_interval, move || {
            if let Some(core) = weak.upgrade() {
                core.poll(Some(epoch));
            }
        });
        let ticker = match ticker {
            Ok(ticker) => ticker,
            Err(err) => {
                state.phase = SessionPhase::Idle;
                drop(state);
                stream.stop();
                return Err(StartError::Timer(format!("{:#}", err)));
            }
        };

        let (width, height) = stream.dimensions();
        log::info!(
            "session active on {} ({}x{} reported, polling every {} ms)",
            stream.source(),
            width,
            height,
            self.settings.poll_interval.as_millis()
        );
        state.source_dimensions = (width, height);
        state.stream = Some(Arc::new(Mutex::new(stream)));
        state.ticker = Some(ticker);
        state.phase = SessionPhase::Active;
        state.presentation_open = true;
        drop(state);

        self.core.poll(Some(epoch));
        Ok(())
    }

    /// Run one cycle now if the single-flight guard allows it.
    pub fn poll(&self) -> PollOutcome {
        self.core.poll(None)
    }

    /// Release camera and timer. Safe to call any number of times from any
    /// exit path; returns `false` when there was nothing to stop.
    ///
    /// Waits neither for an outstanding classify call nor for a frame grab in
    /// progress; a camera busy grabbing is released as soon as the grab
    /// returns.
    pub fn stop(&self) -> bool {
        let ticker = {
            let mut state = self.core.lock();
            match state.phase {
                SessionPhase::Idle => return false,
                SessionPhase::Acquiring => {
                    // start() sees the phase change and releases what it opened
                    state.phase = SessionPhase::Idle;
                    state.presentation_open = false;
                    return true;
                }
                SessionPhase::Active | SessionPhase::Stopping => {}
            }
            state.phase = SessionPhase::Stopping;
            let ticker = state.ticker.take();
            if let Some(stream) = state.stream.take() {
                release_stream(stream);
            }
            state.source_dimensions = (0, 0);
            state.in_flight = None;
            state.current_detections.clear();
            state.presentation_open = false;
            state.phase = SessionPhase::Idle;
            self.core.idle.notify_all();
            ticker
        };
        if let Some(ticker) = ticker {
            ticker.stop();
        }
        log::info!("session stopped");
        true
    }

    /// Dismissing the presentation surface ends an active session.
    pub fn close_presentation(&self) {
        let active = {
            let mut state = self.core.lock();
            state.presentation_open = false;
            state.phase == SessionPhase::Active
        };
        if active {
            self.stop();
        }
    }

    pub fn open_presentation(&self) {
        let mut state = self.core.lock();
        if state.phase == SessionPhase::Active {
            state.presentation_open = true;
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.core.lock().phase
    }

    pub fn is_active(&self) -> bool {
        self.phase() == SessionPhase::Active
    }

    pub fn holds_camera(&self) -> bool {
        self.core.lock().stream.is_some()
    }

    pub fn is_polling(&self) -> bool {
        self.core.lock().ticker.is_some()
    }

    pub fn cycle_in_flight(&self) -> bool {
        self.core.lock().in_flight.is_some()
    }

    pub fn cycles_started(&self) -> u64 {
        self.core.cycles_started.load(Ordering::SeqCst)
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self.core.lock();
        SessionSnapshot {
            phase: state.phase,
            presentation_open: state.presentation_open,
            detections: state.current_detections.clone(),
            latest: state.latest.clone(),
            history: state.history.to_vec(),
            source_dimensions: state.source_dimensions,
        }
    }

    /// Block until no classify call is outstanding. Returns `false` on timeout.
    pub fn wait_for_idle(&self, timeout: Duration) -> bool {
        let state = self.core.lock();
        let (state, _) = self
            .core
            .idle
            .wait_timeout_while(state, timeout, |state| state.outstanding > 0)
            .unwrap_or_else(PoisonError::into_inner);
        state.outstanding == 0
    }
}

impl Drop for DetectionSession {
    fn drop(&mut self) {
        self.stop();
    }
}
