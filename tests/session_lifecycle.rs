//! Detection session lifecycle: single flight, prompt release, stale-result
//! discard, throttled notices.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::time::{Duration, Instant};

use image::{Rgb, RgbImage};

use waste_classifier::ingest::SyntheticCamera;
use waste_classifier::{
    BoundingBox, CameraAccessError, CameraDevice, CameraRequest, CameraStream,
    ClassificationResult, Classifier, ClassifyError, Detection, DetectionSession, EncodedFrame,
    Notice, Notifier, PollOutcome, SessionPhase, SessionSettings, SkipReason, StartError,
    StubClassifier, TopPrediction, TransportError, VideoTrack, WasteType, WasteTypeTable,
};

const WAIT: Duration = Duration::from_secs(5);

type Reply = Result<ClassificationResult, ClassifyError>;

#[derive(Clone, Copy, Debug, Default)]
enum GrabMode {
    #[default]
    Frame,
    Slow(Duration),
    Broken,
}

struct MockTrack {
    stops: Arc<AtomicUsize>,
    grab: GrabMode,
}

impl VideoTrack for MockTrack {
    fn label(&self) -> &str {
        "mock"
    }

    fn dimensions(&self) -> (u32, u32) {
        (64, 48)
    }

    fn grab_frame(&mut self) -> anyhow::Result<Option<RgbImage>> {
        match self.grab {
            GrabMode::Frame => {}
            GrabMode::Slow(delay) => std::thread::sleep(delay),
            GrabMode::Broken => anyhow::bail!("sensor unplugged"),
        }
        Ok(Some(RgbImage::from_pixel(64, 48, Rgb([120, 80, 40]))))
    }

    fn stop(&mut self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Clone, Default)]
struct MockCamera {
    opens: Arc<AtomicUsize>,
    stops: Arc<AtomicUsize>,
    deny: bool,
    grab: GrabMode,
}

impl CameraDevice for MockCamera {
    fn describe(&self) -> String {
        "mock camera".to_string()
    }

    fn open(&self, _request: &CameraRequest) -> Result<CameraStream, CameraAccessError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        if self.deny {
            return Err(CameraAccessError::new("permission denied"));
        }
        Ok(CameraStream::new(
            "mock",
            vec![Box::new(MockTrack {
                stops: Arc::clone(&self.stops),
                grab: self.grab,
            })],
        ))
    }
}

/// Each classify call parks until the test answers it through the handle it
/// publishes on `pending`.
struct BlockingClassifier {
    pending: Mutex<mpsc::Sender<mpsc::Sender<Reply>>>,
    calls: AtomicUsize,
}

impl Classifier for BlockingClassifier {
    fn name(&self) -> &'static str {
        "blocking"
    }

    fn classify(&self, _frame: &EncodedFrame) -> Result<ClassificationResult, ClassifyError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::channel();
        let _ = self
            .pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .send(tx);
        rx.recv_timeout(Duration::from_secs(10))
            .unwrap_or_else(|_| Err(TransportError::Io("no reply".to_string()).into()))
    }
}

#[derive(Default)]
struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
    fn titles(&self) -> Vec<String> {
        self.notices
            .lock()
            .unwrap()
            .iter()
            .map(|n| n.title.clone())
            .collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notice: Notice) {
        self.notices.lock().unwrap().push(notice);
    }
}

struct Harness {
    session: DetectionSession,
    camera: MockCamera,
    classifier: Arc<BlockingClassifier>,
    notifier: Arc<RecordingNotifier>,
    pending: mpsc::Receiver<mpsc::Sender<Reply>>,
}

impl Harness {
    fn new(camera: MockCamera) -> Self {
        let (tx, pending) = mpsc::channel();
        let classifier = Arc::new(BlockingClassifier {
            pending: Mutex::new(tx),
            calls: AtomicUsize::new(0),
        });
        let notifier = Arc::new(RecordingNotifier::default());
        let settings = SessionSettings {
            // long enough that only explicit polls run cycles
            poll_interval: Duration::from_secs(600),
            error_throttle: Duration::from_secs(600),
            ..SessionSettings::default()
        };
        let session = DetectionSession::new(
            Box::new(camera.clone()),
            classifier.clone(),
            notifier.clone(),
            settings,
        );
        Self {
            session,
            camera,
            classifier,
            notifier,
            pending,
        }
    }

    fn next_call(&self) -> mpsc::Sender<Reply> {
        self.pending.recv_timeout(WAIT).expect("classify call")
    }

    fn stops(&self) -> usize {
        self.camera.stops.load(Ordering::SeqCst)
    }
}

fn found(label: &str, confidence: f64) -> Reply {
    Ok(ClassificationResult {
        top_prediction: Some(TopPrediction {
            label: label.to_string(),
            confidence,
            waste_type: WasteType::NonBiodegradable,
        }),
        detections: vec![Detection {
            label: label.to_string(),
            confidence,
            bounding_box: BoundingBox::new(1.0, 2.0, 30.0, 40.0),
        }],
    })
}

#[test]
fn ticks_during_a_cycle_are_dropped() {
    let h = Harness::new(MockCamera::default());
    h.session.start().expect("start");
    assert_eq!(h.session.phase(), SessionPhase::Active);

    let first = h.next_call();
    assert!(h.session.cycle_in_flight());
    assert_eq!(h.session.poll(), PollOutcome::Skipped(SkipReason::InFlight));
    assert_eq!(h.session.poll(), PollOutcome::Skipped(SkipReason::InFlight));
    assert_eq!(h.classifier.calls.load(Ordering::SeqCst), 1);

    first.send(found("bottle", 0.9)).unwrap();
    assert!(h.session.wait_for_idle(WAIT));
    assert!(!h.session.cycle_in_flight());

    let snapshot = h.session.snapshot();
    let latest = snapshot.latest.expect("latest");
    assert_eq!(latest.label, "bottle");
    assert_eq!(latest.waste_type, WasteType::NonBiodegradable);
    assert_eq!(snapshot.detections.len(), 1);
    assert_eq!(snapshot.history.len(), 1);
    assert_eq!(snapshot.source_dimensions, (64, 48));

    // same answer again inside the duplicate window
    assert_eq!(h.session.poll(), PollOutcome::Started);
    h.next_call().send(found("bottle", 0.9)).unwrap();
    assert!(h.session.wait_for_idle(WAIT));
    assert_eq!(h.session.snapshot().history.len(), 1);
    assert_eq!(h.session.cycles_started(), 2);
}

#[test]
fn stop_releases_camera_without_waiting_for_the_cycle() {
    let h = Harness::new(MockCamera::default());
    h.session.start().expect("start");
    let pending = h.next_call();

    let started = Instant::now();
    assert!(h.session.stop());
    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(h.session.phase(), SessionPhase::Idle);
    assert!(!h.session.holds_camera());
    assert!(!h.session.is_polling());
    assert_eq!(h.stops(), 1);

    pending.send(found("bottle", 0.9)).unwrap();
    assert!(h.session.wait_for_idle(WAIT));
    let snapshot = h.session.snapshot();
    assert!(snapshot.latest.is_none());
    assert!(snapshot.history.is_empty());
    assert!(snapshot.detections.is_empty());

    assert!(!h.session.stop());
    assert_eq!(h.stops(), 1);
    assert_eq!(h.session.poll(), PollOutcome::Skipped(SkipReason::Inactive));
}

#[test]
fn stop_does_not_wait_for_a_slow_frame_grab() {
    let h = Harness::new(MockCamera {
        grab: GrabMode::Slow(Duration::from_millis(1500)),
        ..MockCamera::default()
    });
    let started = Instant::now();
    h.session.start().expect("start");
    assert!(started.elapsed() < Duration::from_millis(500));
    assert!(h.session.cycle_in_flight());
    std::thread::sleep(Duration::from_millis(100));

    let stopping = Instant::now();
    assert!(h.session.stop());
    let snapshot = h.session.snapshot();
    assert!(stopping.elapsed() < Duration::from_millis(500));
    assert_eq!(snapshot.phase, SessionPhase::Idle);
    assert!(!h.session.holds_camera());
    assert!(!h.session.is_polling());

    // the grab finishes on the worker, which then drops the last camera handle
    h.next_call().send(found("bottle", 0.9)).unwrap();
    assert!(h.session.wait_for_idle(WAIT));
    assert_eq!(h.stops(), 1);
    assert!(h.session.snapshot().latest.is_none());
}

#[test]
fn frame_capture_failures_are_throttled_and_keep_polling() {
    let h = Harness::new(MockCamera {
        grab: GrabMode::Broken,
        ..MockCamera::default()
    });
    h.session.start().expect("start");
    assert!(h.session.wait_for_idle(WAIT));

    {
        let notices = h.notifier.notices.lock().unwrap();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].title, "Detection Error");
        assert_eq!(notices[0].description, "Unable to capture the current frame.");
    }

    assert_eq!(h.session.poll(), PollOutcome::Started);
    assert!(h.session.wait_for_idle(WAIT));
    assert_eq!(h.notifier.titles().len(), 1);
    assert!(h.session.is_active());
    assert!(h.session.holds_camera());
    assert!(!h.session.cycle_in_flight());
    assert_eq!(h.classifier.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn result_from_a_previous_activation_is_discarded() {
    let h = Harness::new(MockCamera::default());
    h.session.start().expect("start");
    let stale = h.next_call();
    h.session.stop();

    h.session.start().expect("restart");
    let fresh = h.next_call();
    assert_eq!(h.camera.opens.load(Ordering::SeqCst), 2);

    stale.send(found("bottle", 0.9)).unwrap();
    fresh.send(found("carry_bag", 0.7)).unwrap();
    assert!(h.session.wait_for_idle(WAIT));

    let snapshot = h.session.snapshot();
    assert_eq!(snapshot.latest.expect("latest").label, "carry_bag");
    assert_eq!(snapshot.history.len(), 1);
    assert_eq!(snapshot.history[0].label, "carry_bag");
}

#[test]
fn camera_failure_returns_to_idle_and_notifies_once() {
    let h = Harness::new(MockCamera {
        deny: true,
        ..MockCamera::default()
    });

    let err = h.session.start().unwrap_err();
    assert!(matches!(err, StartError::Camera(_)));
    assert_eq!(h.session.phase(), SessionPhase::Idle);
    assert!(!h.session.holds_camera());
    assert!(!h.session.is_polling());
    assert_eq!(h.notifier.titles(), vec!["Camera Error".to_string()]);
    assert_eq!(h.classifier.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn detection_errors_are_throttled_and_keep_polling() {
    let h = Harness::new(MockCamera::default());
    h.session.start().expect("start");

    h.next_call()
        .send(Err(TransportError::Status(500).into()))
        .unwrap();
    assert!(h.session.wait_for_idle(WAIT));
    assert_eq!(h.notifier.titles(), vec!["Detection Error".to_string()]);
    assert!(h.session.is_active());

    assert_eq!(h.session.poll(), PollOutcome::Started);
    h.next_call().send(Err(ClassifyError::Semantic)).unwrap();
    assert!(h.session.wait_for_idle(WAIT));
    assert_eq!(h.notifier.titles().len(), 1);
    assert!(h.session.is_active());
    assert!(!h.session.cycle_in_flight());
}

#[test]
fn empty_result_clears_latest_but_keeps_history() {
    let h = Harness::new(MockCamera::default());
    h.session.start().expect("start");
    h.next_call().send(found("bottle", 0.9)).unwrap();
    assert!(h.session.wait_for_idle(WAIT));

    assert_eq!(h.session.poll(), PollOutcome::Started);
    h.next_call()
        .send(Ok(ClassificationResult::default()))
        .unwrap();
    assert!(h.session.wait_for_idle(WAIT));

    let snapshot = h.session.snapshot();
    assert!(snapshot.latest.is_none());
    assert!(snapshot.detections.is_empty());
    assert_eq!(snapshot.history.len(), 1);
}

#[test]
fn start_while_active_only_reopens_presentation() {
    let h = Harness::new(MockCamera::default());
    h.session.start().expect("start");
    let pending = h.next_call();

    h.session.start().expect("second start");
    assert_eq!(h.camera.opens.load(Ordering::SeqCst), 1);
    assert!(h.session.snapshot().presentation_open);

    pending.send(found("bottle", 0.9)).unwrap();
    assert!(h.session.wait_for_idle(WAIT));
}

#[test]
fn closing_the_presentation_stops_the_session() {
    let h = Harness::new(MockCamera::default());
    h.session.start().expect("start");
    let pending = h.next_call();

    h.session.close_presentation();
    assert_eq!(h.session.phase(), SessionPhase::Idle);
    assert!(!h.session.holds_camera());
    assert!(!h.session.snapshot().presentation_open);
    assert_eq!(h.stops(), 1);

    pending.send(found("bottle", 0.9)).unwrap();
    assert!(h.session.wait_for_idle(WAIT));
}

#[test]
fn dropping_the_session_releases_the_camera() {
    let h = Harness::new(MockCamera::default());
    h.session.start().expect("start");
    let pending = h.next_call();
    let stops = Arc::clone(&h.camera.stops);

    drop(h.session);
    assert_eq!(stops.load(Ordering::SeqCst), 1);
    // the worker finishes against a session nobody observes anymore
    let _ = pending.send(found("bottle", 0.9));
}

#[test]
fn warming_camera_skips_cycles() {
    let table = WasteTypeTable::builtin();
    let classifier = Arc::new(StubClassifier::demo(table));
    let session = DetectionSession::new(
        Box::new(SyntheticCamera::new("stub://warming").with_warmup(Duration::from_secs(600))),
        classifier.clone(),
        Arc::new(RecordingNotifier::default()),
        SessionSettings {
            poll_interval: Duration::from_secs(600),
            ..SessionSettings::default()
        },
    );

    assert_eq!(session.poll(), PollOutcome::Skipped(SkipReason::Inactive));
    session.start().expect("start");
    assert_eq!(session.poll(), PollOutcome::Skipped(SkipReason::NotReady));
    assert_eq!(session.cycles_started(), 0);
    assert_eq!(classifier.calls(), 0);
    assert!(session.stop());
}

#[test]
fn timer_drives_cycles_until_stopped() {
    let classifier = Arc::new(StubClassifier::demo(WasteTypeTable::builtin()));
    let session = DetectionSession::new(
        Box::new(SyntheticCamera::new("stub://camera").with_warmup(Duration::ZERO)),
        classifier.clone(),
        Arc::new(RecordingNotifier::default()),
        SessionSettings {
            poll_interval: Duration::from_millis(40),
            ..SessionSettings::default()
        },
    );
    session.start().expect("start");

    let deadline = Instant::now() + WAIT;
    while session.cycles_started() < 3 && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(20));
    }
    assert!(session.cycles_started() >= 3);

    assert!(session.stop());
    assert!(session.wait_for_idle(WAIT));
    let after_stop = session.cycles_started();
    std::thread::sleep(Duration::from_millis(200));
    assert_eq!(session.cycles_started(), after_stop);
    assert!(!session.snapshot().history.is_empty());
}
