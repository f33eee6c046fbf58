use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use image::RgbImage;

use people_counter::detect::{ScriptStep, ScriptedBackend};
use people_counter::pipeline::{Pipeline, PipelineSettings, PipelineState, StopReason};
use people_counter::{BoundingBox, Detection, Frame, FrameSource, HeadlessPresenter, Presenter, Region};

/// Black 640x480 frames. Ends on the pull numbered `end_on` when set.
struct BlankSource {
    pulls: Arc<AtomicUsize>,
    end_on: Option<usize>,
}

impl BlankSource {
    fn endless() -> Self {
        Self {
            pulls: Arc::new(AtomicUsize::new(0)),
            end_on: None,
        }
    }

    fn ending_on(pull: usize) -> Self {
        Self {
            pulls: Arc::new(AtomicUsize::new(0)),
            end_on: Some(pull),
        }
    }
}

impl FrameSource for BlankSource {
    fn describe(&self) -> String {
        "blank 640x480".into()
    }

    fn pull(&mut self) -> Result<Option<Frame>> {
        let n = self.pulls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.end_on.is_some_and(|end| n >= end) {
            return Ok(None);
        }
        std::thread::sleep(Duration::from_millis(2));
        Ok(Some(Frame::from_image(RgbImage::new(640, 480))))
    }
}

/// 640x480 frames for the first `switch_after` pulls, 320x240 after that.
struct ResizingSource {
    pulls: usize,
    switch_after: usize,
}

impl FrameSource for ResizingSource {
    fn describe(&self) -> String {
        "resizing 640x480 -> 320x240".into()
    }

    fn pull(&mut self) -> Result<Option<Frame>> {
        self.pulls += 1;
        std::thread::sleep(Duration::from_millis(2));
        let (w, h) = if self.pulls <= self.switch_after {
            (640, 480)
        } else {
            (320, 240)
        };
        Ok(Some(Frame::from_image(RgbImage::new(w, h))))
    }
}

/// Cancels once `done` says so, or after a deadline so a broken pipeline
/// fails the test instead of hanging it.
struct UntilPresenter<F: FnMut() -> bool> {
    done: F,
    shown: Vec<(u32, u32)>,
    deadline: Instant,
}

impl<F: FnMut() -> bool> UntilPresenter<F> {
    fn new(done: F) -> Self {
        Self {
            done,
            shown: Vec::new(),
            deadline: Instant::now() + Duration::from_secs(20),
        }
    }
}

impl<F: FnMut() -> bool> Presenter for UntilPresenter<F> {
    fn show(&mut self, frame: &Frame) -> Result<()> {
        self.shown.push(frame.dimensions());
        Ok(())
    }

    fn poll_cancel(&mut self) -> bool {
        assert!(Instant::now() < self.deadline, "pipeline did not settle in time");
        (self.done)()
    }
}

fn settings() -> PipelineSettings {
    PipelineSettings {
        tick_interval: Duration::from_millis(1),
        ..PipelineSettings::default()
    }
}

fn cycles(state: &PipelineState) -> u64 {
    state.published().map(|p| p.cycles).unwrap_or(0)
}

fn person(x: i32, y: i32, w: i32, h: i32) -> Detection {
    Detection::new("person", 0.9, BoundingBox::new(x, y, w, h))
}

#[test]
fn single_person_is_counted_and_unblurred() -> Result<()> {
    let backend = ScriptedBackend::new(vec![vec![
        person(100, 100, 50, 150),
        Detection::new("chair", 0.8, BoundingBox::new(400, 300, 60, 60)),
    ]]);
    let mut pipeline = Pipeline::start(BlankSource::endless(), backend, settings())?;
    let state = pipeline.state();
    let watched = Arc::clone(&state);
    let mut presenter = UntilPresenter::new(move || cycles(&watched) >= 3);

    let summary = pipeline.run(&mut presenter)?;

    assert_eq!(summary.reason, StopReason::Cancelled);
    assert_eq!(summary.people, 1);
    assert_eq!(pipeline.people_count(), 1);
    assert!(!state.is_running());

    let published = state.published()?;
    let expected = Region::clamped(&BoundingBox::new(100, 100, 50, 150), 640, 480);
    assert_eq!(published.target, expected);
    let layers = published.layers.expect("layers published");
    assert_eq!(layers.mask.dimensions(), (640, 480));
    assert_eq!(layers.mask.kept_pixels(), 50 * 150);
    assert!(!layers.mask.is_blur(120, 200));
    assert!(layers.mask.is_blur(420, 320));

    assert!(presenter.shown.iter().all(|dims| *dims == (320, 320)));
    Ok(())
}

#[test]
fn zero_detections_show_whole_frame() -> Result<()> {
    let backend = ScriptedBackend::new(vec![vec![]]);
    let mut pipeline = Pipeline::start(BlankSource::endless(), backend, settings())?;
    let state = pipeline.state();
    let watched = Arc::clone(&state);
    let mut presenter = UntilPresenter::new(move || cycles(&watched) >= 2);

    let summary = pipeline.run(&mut presenter)?;

    assert_eq!(summary.people, 0);
    let published = state.published()?;
    assert_eq!(published.target, Region::full(640, 480));
    assert_eq!(published.layers.expect("layers published").mask.kept_pixels(), 0);
    Ok(())
}

#[test]
fn source_ending_on_fifth_pull_stops_everything() -> Result<()> {
    let source = BlankSource::ending_on(5);
    let pulls = Arc::clone(&source.pulls);
    let backend = ScriptedBackend::new(vec![vec![person(10, 10, 20, 20)]]);
    let calls = backend.call_counter();

    let mut pipeline = Pipeline::start(source, backend, settings())?;
    let state = pipeline.state();
    let mut presenter = UntilPresenter::new(|| false);
    let summary = pipeline.run(&mut presenter)?;

    assert_eq!(summary.reason, StopReason::StreamEnded);
    assert_eq!(summary.frames_ingested, 4);
    assert!(!state.is_running());
    assert_eq!(pulls.load(Ordering::SeqCst), 5);

    // Both stages have been joined: nothing moves any more.
    let cycles_after = cycles(&state);
    let calls_after = calls.load(Ordering::SeqCst);
    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(cycles(&state), cycles_after);
    assert_eq!(calls.load(Ordering::SeqCst), calls_after);
    assert_eq!(pulls.load(Ordering::SeqCst), 5);
    Ok(())
}

#[test]
fn presenter_cancel_joins_stages() -> Result<()> {
    let backend = ScriptedBackend::new(vec![vec![person(0, 0, 64, 64)]]);
    let mut pipeline = Pipeline::start(BlankSource::endless(), backend, settings())?;
    let state = pipeline.state();
    let mut presenter = HeadlessPresenter::new().with_max_frames(Some(3));

    let summary = pipeline.run(&mut presenter)?;

    assert_eq!(summary.reason, StopReason::Cancelled);
    assert_eq!(summary.frames_presented, 3);
    assert_eq!(presenter.shown(), 3);
    assert!(!state.is_running());
    Ok(())
}

#[test]
fn detector_failure_keeps_last_good_cycle() -> Result<()> {
    let backend = ScriptedBackend::from_steps(vec![
        ScriptStep::Detections(vec![person(200, 100, 80, 200), person(300, 150, 40, 100)]),
        ScriptStep::Fail("inference error".into()),
    ]);
    let calls = backend.call_counter();
    let mut pipeline = Pipeline::start(BlankSource::endless(), backend, settings())?;
    let state = pipeline.state();
    let mut presenter = UntilPresenter::new(move || calls.load(Ordering::SeqCst) >= 4);

    let summary = pipeline.run(&mut presenter)?;

    assert_eq!(summary.reason, StopReason::Cancelled);
    assert_eq!(summary.detection_cycles, 1);
    assert_eq!(summary.people, 2);
    let expected = Region::clamped(&BoundingBox::new(200, 100, 140, 200), 640, 480);
    assert_eq!(state.published()?.target, expected);
    Ok(())
}

/// Counts frames shown once the published capture size is 320x240.
struct AfterSwitchPresenter {
    state: Arc<PipelineState>,
    shown_after_switch: usize,
    deadline: Instant,
}

impl Presenter for AfterSwitchPresenter {
    fn show(&mut self, frame: &Frame) -> Result<()> {
        assert_eq!(frame.dimensions(), (320, 320));
        if self.state.published()?.capture == (320, 240) {
            self.shown_after_switch += 1;
        }
        Ok(())
    }

    fn poll_cancel(&mut self) -> bool {
        assert!(Instant::now() < self.deadline, "pipeline stalled after resize");
        self.shown_after_switch >= 5 && cycles(&self.state) >= 6
    }
}

#[test]
fn resolution_change_mid_stream_keeps_pipeline_moving() -> Result<()> {
    let source = ResizingSource {
        pulls: 0,
        switch_after: 3,
    };
    let backend = ScriptedBackend::new(vec![vec![person(20, 20, 40, 80)]]);
    let mut pipeline = Pipeline::start(source, backend, settings())?;
    let state = pipeline.state();
    let mut presenter = AfterSwitchPresenter {
        state: Arc::clone(&state),
        shown_after_switch: 0,
        deadline: Instant::now() + Duration::from_secs(20),
    };

    let summary = pipeline.run(&mut presenter)?;

    assert_eq!(summary.reason, StopReason::Cancelled);
    assert!(summary.detection_cycles >= 6);
    assert!(presenter.shown_after_switch >= 5);
    let published = state.published()?;
    assert_eq!(published.capture, (320, 240));
    assert_eq!(
        published.layers.expect("layers published").dimensions(),
        (320, 240)
    );
    assert_eq!(
        published.target,
        Region::clamped(&BoundingBox::new(20, 20, 40, 80), 320, 240)
    );
    Ok(())
}
