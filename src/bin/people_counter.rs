//! people_counter - live people counting with background blur and auto-zoom
//!
//! This binary:
//! 1. Loads configuration (file, environment, then command-line flags)
//! 2. Opens the frame source and selects a detector backend
//! 3. Runs the three-thread pipeline until Ctrl-C, a frame limit or the end
//!    of the stream; a single image file is processed once instead

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::sync::Arc;

use people_counter::detect::ClassLabels;
use people_counter::detect::MarkerBackend;
use people_counter::ingest::{is_still_image, open_source, still::load_frame};
use people_counter::{
    BackendRegistry, Frame, HeadlessPresenter, Pipeline, PipelineConfig, PipelineSettings,
    PipelineState, Presenter,
};

#[path = "../ui.rs"]
mod ui;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Frame source: stub://<scene>, an image file, a directory of images or a
    /// video file.
    #[arg(long)]
    source: Option<String>,
    /// Config file (TOML or JSON). Overrides PEOPLE_COUNTER_CONFIG.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Confidence threshold.
    #[arg(long)]
    ct: Option<f32>,
    /// NMS threshold.
    #[arg(long)]
    st: Option<f32>,
    /// Network input width; also the output width.
    #[arg(long)]
    iw: Option<u32>,
    /// Network input height; also the output height.
    #[arg(long)]
    ih: Option<u32>,
    /// Zoom speed factor in [0, 1].
    #[arg(long)]
    zsf: Option<f32>,
    /// Detector backend name.
    #[arg(long)]
    backend: Option<String>,
    /// ONNX model path (backend "tract").
    #[arg(long)]
    model: Option<PathBuf>,
    /// Class names file, one per line.
    #[arg(long)]
    labels: Option<PathBuf>,
    /// Font for box captions and the inference banner.
    #[arg(long)]
    font: Option<PathBuf>,
    /// Write composited frames here as PNG.
    #[arg(long)]
    snapshot_dir: Option<PathBuf>,
    /// Write every Nth composited frame.
    #[arg(long)]
    snapshot_every: Option<u64>,
    /// Stop after presenting this many frames.
    #[arg(long)]
    max_frames: Option<u64>,
    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, default_value = "auto", value_name = "MODE")]
    ui: String,
}

impl Args {
    fn apply(&self, cfg: &mut PipelineConfig) {
        if let Some(source) = &self.source {
            cfg.source = source.clone();
        }
        if let Some(ct) = self.ct {
            cfg.detector.confidence_threshold = ct;
        }
        if let Some(st) = self.st {
            cfg.detector.nms_threshold = st;
        }
        if let Some(iw) = self.iw {
            cfg.network.input_width = iw;
        }
        if let Some(ih) = self.ih {
            cfg.network.input_height = ih;
        }
        if let Some(zsf) = self.zsf {
            cfg.display.zoom_speed_factor = zsf;
        }
        if let Some(backend) = &self.backend {
            cfg.detector.backend = backend.clone();
        }
        if let Some(model) = &self.model {
            cfg.detector.model_path = Some(model.clone());
        }
        if let Some(labels) = &self.labels {
            cfg.detector.labels_path = Some(labels.clone());
        }
        if let Some(font) = &self.font {
            cfg.display.font_path = Some(font.clone());
        }
        if let Some(dir) = &self.snapshot_dir {
            cfg.display.snapshot_dir = Some(dir.clone());
        }
        if let Some(every) = self.snapshot_every {
            cfg.display.snapshot_every = every;
        }
        if self.max_frames.is_some() {
            cfg.display.max_frames = self.max_frames;
        }
    }
}

/// Headless presenter plus the live status line.
struct StatusPresenter {
    inner: HeadlessPresenter,
    status: ui::LiveStatus,
    state: Arc<PipelineState>,
}

impl Presenter for StatusPresenter {
    fn show(&mut self, frame: &Frame) -> Result<()> {
        self.inner.show(frame)?;
        self.status
            .update(self.state.people_count(), self.inner.shown());
        Ok(())
    }

    fn poll_cancel(&mut self) -> bool {
        self.inner.poll_cancel()
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let ui = ui::Ui::from_flag(&args.ui, std::io::stderr().is_terminal());

    let cfg = {
        let _stage = ui.stage("Load configuration");
        let mut cfg = match &args.config {
            Some(path) => PipelineConfig::load_from(Some(path))?,
            None => PipelineConfig::load()?,
        };
        args.apply(&mut cfg);
        cfg.validate()?;
        cfg
    };
    let settings = PipelineSettings::from_config(&cfg)?;

    let mut presenter = HeadlessPresenter::new().with_max_frames(cfg.display.max_frames);
    if let Some(dir) = &cfg.display.snapshot_dir {
        presenter = presenter.with_snapshots(dir, cfg.display.snapshot_every)?;
    }
    let interrupted = presenter.interrupt_handle();
    ctrlc::set_handler(move || {
        interrupted.store(true, Ordering::SeqCst);
    })
    .context("error setting Ctrl-C handler")?;

    let mut registry = {
        let _stage = ui.stage("Prepare detector");
        build_registry(&cfg)?
    };
    let mut backend = registry.take(&cfg.detector.backend)?;
    log::info!("detector backend: {}", backend.name());

    if is_still_image(Path::new(&cfg.source)) {
        let frame = load_frame(Path::new(&cfg.source))?;
        let summary = Pipeline::run_still(frame, &mut backend, &settings, &mut presenter)?;
        println!("people: {}", summary.people);
        return Ok(());
    }

    let source = {
        let _stage = ui.stage("Open source");
        open_source(&cfg.source)?
    };
    let mut pipeline = Pipeline::start(source, backend, settings)?;
    let mut presenter = StatusPresenter {
        inner: presenter,
        status: ui.live_status(),
        state: pipeline.state(),
    };
    let summary = pipeline.run(&mut presenter)?;
    presenter
        .status
        .finish(summary.people, summary.frames_presented);
    println!("people: {}", summary.people);
    Ok(())
}

fn build_registry(cfg: &PipelineConfig) -> Result<BackendRegistry> {
    let mut registry = BackendRegistry::new();
    registry.register(MarkerBackend::new().with_label(cfg.detector.person_label.clone()));

    let labels = match &cfg.detector.labels_path {
        Some(path) => Some(ClassLabels::from_path(path)?),
        None => None,
    };

    #[cfg(feature = "backend-tract")]
    if let Some(model) = &cfg.detector.model_path {
        let labels = labels
            .clone()
            .ok_or_else(|| anyhow!("backend 'tract' needs a labels file"))?;
        let backend = people_counter::detect::backends::TractBackend::new(
            model,
            labels,
            cfg.network.input_width,
            cfg.network.input_height,
        )?;
        registry.register(backend);
    }

    if let Some(labels) = &labels {
        if labels.id_of(&cfg.detector.person_label).is_none() {
            log::warn!(
                "labels file has no '{}' class; nothing will be counted",
                cfg.detector.person_label
            );
        }
    }
    if !registry.contains(&cfg.detector.backend) {
        return Err(anyhow!(
            "unknown detector backend '{}' (available: {})",
            cfg.detector.backend,
            registry.list().join(", ")
        ));
    }
    Ok(registry)
}
