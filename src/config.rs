use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_SOURCE: &str = "stub://walkers";
const DEFAULT_BACKEND: &str = "stub";
const DEFAULT_PERSON_LABEL: &str = "person";
const DEFAULT_CONFIDENCE: f32 = 0.5;
const DEFAULT_NMS: f32 = 0.4;
const DEFAULT_INPUT_WIDTH: u32 = 320;
const DEFAULT_INPUT_HEIGHT: u32 = 320;
const DEFAULT_ZOOM_SPEED: f32 = 0.01;
const DEFAULT_BLUR_SIGMA: f32 = 2.6;
const DEFAULT_TICK_MS: u64 = 10;
const DEFAULT_SNAPSHOT_EVERY: u64 = 1;
const DEFAULT_HEALTH_SECS: u64 = 5;

#[derive(Debug, Deserialize, Default)]
struct PipelineConfigFile {
    source: Option<SourceConfigFile>,
    detector: Option<DetectorConfigFile>,
    network: Option<NetworkConfigFile>,
    display: Option<DisplayConfigFile>,
    health: Option<HealthConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct SourceConfigFile {
    uri: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectorConfigFile {
    backend: Option<String>,
    model_path: Option<PathBuf>,
    labels_path: Option<PathBuf>,
    confidence_threshold: Option<f32>,
    nms_threshold: Option<f32>,
    person_label: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct NetworkConfigFile {
    input_width: Option<u32>,
    input_height: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct DisplayConfigFile {
    zoom_speed_factor: Option<f32>,
    blur_sigma: Option<f32>,
    tick_interval_ms: Option<u64>,
    font_path: Option<PathBuf>,
    snapshot_dir: Option<PathBuf>,
    snapshot_every: Option<u64>,
    max_frames: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct HealthConfigFile {
    log_interval_secs: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub source: String,
    pub detector: DetectorSettings,
    pub network: NetworkSettings,
    pub display: DisplaySettings,
    pub health_interval: Duration,
}

#[derive(Debug, Clone)]
pub struct DetectorSettings {
    pub backend: String,
    pub model_path: Option<PathBuf>,
    pub labels_path: Option<PathBuf>,
    pub confidence_threshold: f32,
    pub nms_threshold: f32,
    pub person_label: String,
}

#[derive(Debug, Clone)]
pub struct NetworkSettings {
    pub input_width: u32,
    pub input_height: u32,
}

#[derive(Debug, Clone)]
pub struct DisplaySettings {
    pub zoom_speed_factor: f32,
    pub blur_sigma: f32,
    pub tick_interval: Duration,
    pub font_path: Option<PathBuf>,
    pub snapshot_dir: Option<PathBuf>,
    pub snapshot_every: u64,
    pub max_frames: Option<u64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        // The empty file yields every default and cannot fail.
        Self::from_file(PipelineConfigFile::default())
    }
}

impl PipelineConfig {
    /// Defaults, then the file named by `PEOPLE_COUNTER_CONFIG`, then
    /// environment overrides, then validation.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("PEOPLE_COUNTER_CONFIG").ok();
        Self::load_from(config_path.as_deref().map(Path::new))
    }

    /// Like `load`, with the config file given explicitly.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file_cfg = match path {
            Some(path) => Some(read_config_file(path)?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: PipelineConfigFile) -> Self {
        let source = file
            .source
            .and_then(|source| source.uri)
            .unwrap_or_else(|| DEFAULT_SOURCE.to_string());

        let detector = file.detector.unwrap_or_default();
        let detector = DetectorSettings {
            backend: detector
                .backend
                .unwrap_or_else(|| DEFAULT_BACKEND.to_string()),
            model_path: detector.model_path,
            labels_path: detector.labels_path,
            confidence_threshold: detector.confidence_threshold.unwrap_or(DEFAULT_CONFIDENCE),
            nms_threshold: detector.nms_threshold.unwrap_or(DEFAULT_NMS),
            person_label: detector
                .person_label
                .unwrap_or_else(|| DEFAULT_PERSON_LABEL.to_string()),
        };

        let network = file.network.unwrap_or_default();
        let network = NetworkSettings {
            input_width: network.input_width.unwrap_or(DEFAULT_INPUT_WIDTH),
            input_height: network.input_height.unwrap_or(DEFAULT_INPUT_HEIGHT),
        };

        let display = file.display.unwrap_or_default();
        let display = DisplaySettings {
            zoom_speed_factor: display.zoom_speed_factor.unwrap_or(DEFAULT_ZOOM_SPEED),
            blur_sigma: display.blur_sigma.unwrap_or(DEFAULT_BLUR_SIGMA),
            tick_interval: Duration::from_millis(
                display.tick_interval_ms.unwrap_or(DEFAULT_TICK_MS),
            ),
            font_path: display.font_path,
            snapshot_dir: display.snapshot_dir,
            snapshot_every: display.snapshot_every.unwrap_or(DEFAULT_SNAPSHOT_EVERY),
            max_frames: display.max_frames,
        };

        let health_interval = Duration::from_secs(
            file.health
                .and_then(|health| health.log_interval_secs)
                .unwrap_or(DEFAULT_HEALTH_SECS),
        );

        Self {
            source,
            detector,
            network,
            display,
            health_interval,
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(source) = std::env::var("PEOPLE_COUNTER_SOURCE") {
            if !source.trim().is_empty() {
                self.source = source;
            }
        }
        if let Ok(backend) = std::env::var("PEOPLE_COUNTER_BACKEND") {
            if !backend.trim().is_empty() {
                self.detector.backend = backend;
            }
        }
        if let Some(value) = env_f32("PEOPLE_COUNTER_CONFIDENCE")? {
            self.detector.confidence_threshold = value;
        }
        if let Some(value) = env_f32("PEOPLE_COUNTER_NMS")? {
            self.detector.nms_threshold = value;
        }
        if let Some(value) = env_f32("PEOPLE_COUNTER_ZOOM_SPEED")? {
            self.display.zoom_speed_factor = value;
        }
        if let Ok(dir) = std::env::var("PEOPLE_COUNTER_SNAPSHOT_DIR") {
            if !dir.trim().is_empty() {
                self.display.snapshot_dir = Some(PathBuf::from(dir));
            }
        }
        Ok(())
    }

    /// Check value ranges. Called by `load`; call again after applying
    /// command-line overrides.
    pub fn validate(&self) -> Result<()> {
        if self.source.trim().is_empty() {
            return Err(anyhow!("source must not be empty"));
        }
        let confidence = self.detector.confidence_threshold;
        if !(confidence > 0.0 && confidence <= 1.0) {
            return Err(anyhow!(
                "confidence threshold must be in (0, 1], got {}",
                confidence
            ));
        }
        let nms = self.detector.nms_threshold;
        if !(nms > 0.0 && nms <= 1.0) {
            return Err(anyhow!("nms threshold must be in (0, 1], got {}", nms));
        }
        let zoom = self.display.zoom_speed_factor;
        if !(0.0..=1.0).contains(&zoom) {
            return Err(anyhow!("zoom speed factor must be in [0, 1], got {}", zoom));
        }
        if self.network.input_width == 0 || self.network.input_height == 0 {
            return Err(anyhow!(
                "input size must be positive, got {}x{}",
                self.network.input_width,
                self.network.input_height
            ));
        }
        if !(self.display.blur_sigma > 0.0 && self.display.blur_sigma.is_finite()) {
            return Err(anyhow!(
                "blur sigma must be positive, got {}",
                self.display.blur_sigma
            ));
        }
        if self.display.snapshot_every == 0 {
            return Err(anyhow!("snapshot_every must be greater than zero"));
        }
        if self.detector.person_label.trim().is_empty() {
            return Err(anyhow!("person label must not be empty"));
        }
        Ok(())
    }
}

fn env_f32(key: &str) -> Result<Option<f32>> {
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| anyhow!("{} must be a number, got '{}'", key, raw)),
        _ => Ok(None),
    }
}

fn read_config_file(path: &Path) -> Result<PipelineConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}
