use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};

use crate::config::PipelineConfig;
use crate::detect::{DetectParams, DetectorBackend};
use crate::error::PipelineError;
use crate::frame::Frame;
use crate::ingest::FrameSource;
use crate::overlay::OverlayPainter;
use crate::pipeline::compositor::{Compositor, DEFAULT_BLUR_SIGMA};
use crate::pipeline::detection::{detect_cycle, DetectionStage};
use crate::pipeline::ingestion::IngestionStage;
use crate::pipeline::smoother::RoiSmoother;
use crate::pipeline::state::PipelineState;
use crate::present::Presenter;

/// Everything the pipeline needs besides its source, detector and presenter.
#[derive(Clone)]
pub struct PipelineSettings {
    pub params: DetectParams,
    pub person_label: String,
    pub zoom_speed_factor: f32,
    pub blur_sigma: f32,
    pub tick_interval: Duration,
    pub health_interval: Duration,
    pub painter: OverlayPainter,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            params: DetectParams::default(),
            person_label: "person".to_string(),
            zoom_speed_factor: 0.01,
            blur_sigma: DEFAULT_BLUR_SIGMA,
            tick_interval: Duration::from_millis(10),
            health_interval: Duration::from_secs(5),
            painter: OverlayPainter::new(),
        }
    }
}

impl PipelineSettings {
    /// Settings from a validated config. Loads the caption font if one is
    /// configured.
    pub fn from_config(cfg: &PipelineConfig) -> Result<Self> {
        let painter = match &cfg.display.font_path {
            Some(path) => OverlayPainter::from_font_path(path)?,
            None => OverlayPainter::new(),
        };
        Ok(Self {
            params: DetectParams {
                confidence_threshold: cfg.detector.confidence_threshold,
                nms_threshold: cfg.detector.nms_threshold,
                input_width: cfg.network.input_width,
                input_height: cfg.network.input_height,
            },
            person_label: cfg.detector.person_label.clone(),
            zoom_speed_factor: cfg.display.zoom_speed_factor,
            blur_sigma: cfg.display.blur_sigma,
            tick_interval: cfg.display.tick_interval,
            health_interval: cfg.health_interval,
            painter,
        })
    }

    fn compositor(&self) -> Compositor {
        Compositor::new(
            self.params.input_width,
            self.params.input_height,
            self.blur_sigma,
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    /// The presenter asked to stop.
    Cancelled,
    /// The source ran out of frames, or a stage shut the pipeline down.
    StreamEnded,
}

#[derive(Clone, Debug)]
pub struct RunSummary {
    pub reason: StopReason,
    pub ticks: u64,
    pub frames_presented: u64,
    pub frames_ingested: u64,
    pub detection_cycles: u64,
    pub people: usize,
}

#[derive(Clone, Debug)]
pub struct StillSummary {
    pub people: usize,
    pub inference: Duration,
    pub frame: Frame,
}

/// Three-thread people-counting pipeline.
///
/// `start` spawns the ingestion and detection stages; `run` drives the
/// display tick (smoother, compositor, presenter) on the calling thread until
/// the presenter cancels or the stream ends, then joins both stages.
pub struct Pipeline {
    state: Arc<PipelineState>,
    smoother: RoiSmoother,
    compositor: Compositor,
    tick_interval: Duration,
    health_interval: Duration,
    ingestion: Option<JoinHandle<()>>,
    detection: Option<JoinHandle<()>>,
}

impl Pipeline {
    /// Pull the first frame to learn the capture size, warm up the detector,
    /// then spawn both stages. A source with no frames at all fails with
    /// `PipelineError::StreamEnded`.
    pub fn start<S, B>(mut source: S, mut backend: B, settings: PipelineSettings) -> Result<Self>
    where
        S: FrameSource + 'static,
        B: DetectorBackend + 'static,
    {
        let first = match source.pull()? {
            Some(frame) if !frame.is_empty() => frame,
            _ => {
                source.release();
                return Err(PipelineError::StreamEnded.into());
            }
        };
        if let Err(e) = backend.warm_up() {
            source.release();
            return Err(e.context(format!("warm up detector backend '{}'", backend.name())));
        }

        let (width, height) = first.dimensions();
        let compositor = settings.compositor();
        let (out_w, out_h) = compositor.output_dimensions();
        log::info!(
            "pipeline starting: source={} capture={}x{} output={}x{} zoom_speed={}",
            source.describe(),
            width,
            height,
            out_w,
            out_h,
            settings.zoom_speed_factor
        );

        let state = Arc::new(PipelineState::new(width, height));
        state.capture().publish(first)?;

        let mut pipeline = Self {
            state: Arc::clone(&state),
            smoother: RoiSmoother::new(settings.zoom_speed_factor, width, height),
            compositor,
            tick_interval: settings.tick_interval,
            health_interval: settings.health_interval,
            ingestion: None,
            detection: None,
        };

        let ingestion = IngestionStage::new(Arc::clone(&state), source);
        pipeline.ingestion = Some(
            std::thread::Builder::new()
                .name("ingestion".into())
                .spawn(move || ingestion.run())
                .context("spawn ingestion thread")?,
        );

        let detection = DetectionStage::new(
            Arc::clone(&state),
            backend,
            settings.params,
            settings.person_label,
            settings.painter,
        );
        // On failure `pipeline` drops here, which stops and joins ingestion.
        pipeline.detection = Some(
            std::thread::Builder::new()
                .name("detection".into())
                .spawn(move || detection.run())
                .context("spawn detection thread")?,
        );

        Ok(pipeline)
    }

    pub fn state(&self) -> Arc<PipelineState> {
        Arc::clone(&self.state)
    }

    pub fn people_count(&self) -> usize {
        self.state.people_count()
    }

    /// Run display ticks until the presenter cancels or the stream ends,
    /// then shut down.
    pub fn run<P: Presenter + ?Sized>(&mut self, presenter: &mut P) -> Result<RunSummary> {
        let mut ticks = 0u64;
        let mut presented = 0u64;
        let mut last_health = Instant::now();

        let outcome = loop {
            if presenter.poll_cancel() {
                log::info!("pipeline cancelled");
                break Ok(StopReason::Cancelled);
            }
            if !self.state.is_running() {
                break Ok(StopReason::StreamEnded);
            }

            match self.tick(presenter) {
                Ok(shown) => {
                    ticks += 1;
                    if shown {
                        presented += 1;
                    }
                }
                Err(e) => break Err(e),
            }

            if last_health.elapsed() >= self.health_interval {
                self.log_health(presented);
                last_health = Instant::now();
            }
            std::thread::sleep(self.tick_interval);
        };

        self.shutdown();
        let reason = outcome?;
        let published = self.state.published()?;
        let summary = RunSummary {
            reason,
            ticks,
            frames_presented: presented,
            frames_ingested: self.state.capture().seq(),
            detection_cycles: published.cycles,
            people: published.people,
        };
        log::info!(
            "pipeline finished ({:?}): ticks={} presented={} ingested={} detections={} people={}",
            summary.reason,
            summary.ticks,
            summary.frames_presented,
            summary.frames_ingested,
            summary.detection_cycles,
            summary.people
        );
        Ok(summary)
    }

    /// One display tick: snapshot, smooth, composite, present. Returns
    /// whether a frame was shown. A cycle that fails with a recoverable
    /// `PipelineError` is dropped with a warning.
    ///
    /// After a mid-stream resolution change the smoother follows the newly
    /// published capture size, and frames that outran the detection stage
    /// are skipped until a cycle at their size lands.
    pub fn tick<P: Presenter + ?Sized>(&mut self, presenter: &mut P) -> Result<bool> {
        let snapshot = self.state.snapshot()?;
        if snapshot.capture != self.smoother.dimensions() {
            let (w, h) = snapshot.capture;
            log::info!("display following capture size {}x{}", w, h);
            self.smoother.reset(w, h);
        }
        let region = self.smoother.tick(&snapshot.target);
        let Some(frame) = snapshot.frame else {
            return Ok(false);
        };
        if snapshot.layers.is_some() && frame.dimensions() != snapshot.capture {
            log::debug!(
                "frame {:?} ahead of detection at {:?}; tick skipped",
                frame.dimensions(),
                snapshot.capture
            );
            return Ok(false);
        }

        let composed = match self
            .compositor
            .compose(&frame, snapshot.layers.as_deref(), &region)
        {
            Ok(composed) => composed,
            Err(e) => match e.downcast_ref::<PipelineError>() {
                Some(kind) if kind.is_recoverable() => {
                    log::warn!("display tick skipped: {}", kind);
                    return Ok(false);
                }
                _ => return Err(e),
            },
        };
        presenter.show(&composed)?;
        Ok(true)
    }

    fn log_health(&self, presented: u64) {
        match self.state.published() {
            Ok(published) => log::info!(
                "health frames={} detections={} presented={} people={} inference_avg={:.2}ms",
                self.state.capture().seq(),
                published.cycles,
                presented,
                published.people,
                published.mean_inference.as_secs_f64() * 1000.0
            ),
            Err(e) => log::warn!("health check failed: {:#}", e),
        }
    }

    /// Clear the running flag and join both stages. Safe to call twice.
    pub fn shutdown(&mut self) {
        self.state.stop();
        for (name, handle) in [
            ("ingestion", self.ingestion.take()),
            ("detection", self.detection.take()),
        ] {
            if let Some(handle) = handle {
                if handle.join().is_err() {
                    log::error!("{} stage panicked", name);
                }
            }
        }
    }

    /// Process one still image: a single detection cycle, the smoother
    /// snapped straight to the target, one composite handed to `presenter`.
    pub fn run_still<B, P>(
        frame: Frame,
        backend: &mut B,
        settings: &PipelineSettings,
        presenter: &mut P,
    ) -> Result<StillSummary>
    where
        B: DetectorBackend + ?Sized,
        P: Presenter + ?Sized,
    {
        if frame.is_empty() {
            return Err(anyhow!("still image has no pixels"));
        }
        let (cycle, inference) = detect_cycle(
            backend,
            &frame,
            &settings.params,
            &settings.person_label,
            &settings.painter,
        )?;
        let mut smoother = RoiSmoother::new(1.0, frame.width(), frame.height());
        let region = smoother.tick(&cycle.target);
        let composed = settings
            .compositor()
            .compose(&frame, Some(&cycle.layers), &region)?;
        presenter.show(&composed)?;
        log::info!(
            "still image: people={} inference={:.2}ms",
            cycle.people,
            inference.as_secs_f64() * 1000.0
        );
        Ok(StillSummary {
            people: cycle.people,
            inference,
            frame: composed,
        })
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{Detection, ScriptedBackend};
    use crate::geometry::BoundingBox;
    use crate::present::HeadlessPresenter;
    use image::RgbImage;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct NoFrames;

    impl FrameSource for NoFrames {
        fn describe(&self) -> String {
            "none".into()
        }

        fn pull(&mut self) -> Result<Option<Frame>> {
            Ok(None)
        }
    }

    struct OneFrame(bool);

    impl FrameSource for OneFrame {
        fn describe(&self) -> String {
            "one frame".into()
        }

        fn pull(&mut self) -> Result<Option<Frame>> {
            if std::mem::replace(&mut self.0, true) {
                return Ok(None);
            }
            Ok(Some(Frame::from_image(RgbImage::new(32, 24))))
        }
    }

    /// Scripted backend that records warm-up calls.
    struct WarmCounting {
        inner: ScriptedBackend,
        warm_ups: Arc<AtomicUsize>,
        fail: bool,
    }

    impl DetectorBackend for WarmCounting {
        fn name(&self) -> &'static str {
            "warm-counting"
        }

        fn detect(&mut self, frame: &Frame, params: &DetectParams) -> Result<Vec<Detection>> {
            self.inner.detect(frame, params)
        }

        fn warm_up(&mut self) -> Result<()> {
            self.warm_ups.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(anyhow!("model failed to load"));
            }
            Ok(())
        }
    }

    #[test]
    fn start_warms_up_detector_once() -> Result<()> {
        let warm_ups = Arc::new(AtomicUsize::new(0));
        let backend = WarmCounting {
            inner: ScriptedBackend::new(vec![vec![]]),
            warm_ups: Arc::clone(&warm_ups),
            fail: false,
        };
        let mut pipeline = Pipeline::start(OneFrame(false), backend, PipelineSettings::default())?;
        pipeline.shutdown();
        assert_eq!(warm_ups.load(Ordering::SeqCst), 1);
        Ok(())
    }

    #[test]
    fn failed_warm_up_aborts_start() {
        let warm_ups = Arc::new(AtomicUsize::new(0));
        let backend = WarmCounting {
            inner: ScriptedBackend::new(vec![vec![]]),
            warm_ups: Arc::clone(&warm_ups),
            fail: true,
        };
        let err = Pipeline::start(OneFrame(false), backend, PipelineSettings::default())
            .err()
            .unwrap();
        assert!(format!("{:#}", err).contains("model failed to load"));
        assert_eq!(warm_ups.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn empty_source_fails_to_start() {
        let err = Pipeline::start(NoFrames, ScriptedBackend::new(vec![]), PipelineSettings::default())
            .err()
            .unwrap();
        assert_eq!(
            err.downcast_ref::<PipelineError>(),
            Some(&PipelineError::StreamEnded)
        );
    }

    #[test]
    fn still_image_counts_and_zooms() -> Result<()> {
        let frame = Frame::from_image(RgbImage::new(640, 480));
        let mut backend = ScriptedBackend::new(vec![vec![
            Detection::new("person", 0.9, BoundingBox::new(100, 100, 50, 150)),
            Detection::new("person", 0.7, BoundingBox::new(300, 120, 40, 100)),
        ]]);
        let mut presenter = HeadlessPresenter::new();
        let summary = Pipeline::run_still(
            frame,
            &mut backend,
            &PipelineSettings::default(),
            &mut presenter,
        )?;
        assert_eq!(summary.people, 2);
        assert_eq!(summary.frame.dimensions(), (320, 320));
        assert_eq!(presenter.shown(), 1);
        Ok(())
    }
}
