use std::io::Write;
use std::sync::Mutex;
use std::time::Duration;

use tempfile::NamedTempFile;

use people_counter::config::PipelineConfig;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "PEOPLE_COUNTER_CONFIG",
        "PEOPLE_COUNTER_SOURCE",
        "PEOPLE_COUNTER_BACKEND",
        "PEOPLE_COUNTER_CONFIDENCE",
        "PEOPLE_COUNTER_NMS",
        "PEOPLE_COUNTER_ZOOM_SPEED",
        "PEOPLE_COUNTER_SNAPSHOT_DIR",
    ] {
        std::env::remove_var(key);
    }
}

fn config_file(suffix: &str, body: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(suffix)
        .tempfile()
        .expect("temp config");
    file.write_all(body.as_bytes()).expect("write config");
    file
}

#[test]
fn defaults_without_file_or_env() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = PipelineConfig::load().expect("load config");
    assert_eq!(cfg.source, "stub://walkers");
    assert_eq!(cfg.detector.backend, "stub");
    assert_eq!(cfg.detector.person_label, "person");
    assert_eq!(cfg.detector.confidence_threshold, 0.5);
    assert_eq!(cfg.detector.nms_threshold, 0.4);
    assert_eq!(cfg.network.input_width, 320);
    assert_eq!(cfg.network.input_height, 320);
    assert_eq!(cfg.display.zoom_speed_factor, 0.01);
    assert_eq!(cfg.display.tick_interval, Duration::from_millis(10));
    assert_eq!(cfg.health_interval, Duration::from_secs(5));
    assert!(cfg.display.snapshot_dir.is_none());
}

#[test]
fn loads_toml_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = config_file(
        ".toml",
        r#"
            [source]
            uri = "stub://crowd"

            [detector]
            backend = "tract"
            model_path = "models/yolov5s.onnx"
            labels_path = "models/coco.names"
            confidence_threshold = 0.6

            [network]
            input_width = 640
            input_height = 384

            [display]
            zoom_speed_factor = 0.05
            tick_interval_ms = 20
            snapshot_every = 10

            [health]
            log_interval_secs = 30
        "#,
    );

    std::env::set_var("PEOPLE_COUNTER_CONFIG", file.path());
    std::env::set_var("PEOPLE_COUNTER_NMS", "0.45");
    std::env::set_var("PEOPLE_COUNTER_SOURCE", "clips/lobby.mp4");

    let cfg = PipelineConfig::load().expect("load config");

    assert_eq!(cfg.source, "clips/lobby.mp4");
    assert_eq!(cfg.detector.backend, "tract");
    assert_eq!(
        cfg.detector.model_path.as_deref(),
        Some(std::path::Path::new("models/yolov5s.onnx"))
    );
    assert_eq!(cfg.detector.confidence_threshold, 0.6);
    assert_eq!(cfg.detector.nms_threshold, 0.45);
    assert_eq!(cfg.network.input_width, 640);
    assert_eq!(cfg.network.input_height, 384);
    assert_eq!(cfg.display.zoom_speed_factor, 0.05);
    assert_eq!(cfg.display.tick_interval, Duration::from_millis(20));
    assert_eq!(cfg.display.snapshot_every, 10);
    assert_eq!(cfg.health_interval, Duration::from_secs(30));

    clear_env();
}

#[test]
fn loads_json_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = config_file(
        ".json",
        r#"{
            "detector": { "person_label": "pedestrian" },
            "display": { "blur_sigma": 4.0, "max_frames": 100 }
        }"#,
    );
    let cfg = PipelineConfig::load_from(Some(file.path())).expect("load config");
    assert_eq!(cfg.detector.person_label, "pedestrian");
    assert_eq!(cfg.display.blur_sigma, 4.0);
    assert_eq!(cfg.display.max_frames, Some(100));
    assert_eq!(cfg.source, "stub://walkers");
}

#[test]
fn rejects_invalid_values() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("PEOPLE_COUNTER_ZOOM_SPEED", "fast");
    assert!(PipelineConfig::load().is_err());

    std::env::set_var("PEOPLE_COUNTER_ZOOM_SPEED", "1.5");
    assert!(PipelineConfig::load().is_err());
    clear_env();

    std::env::set_var("PEOPLE_COUNTER_CONFIDENCE", "0");
    assert!(PipelineConfig::load().is_err());
    clear_env();

    let file = config_file(".toml", "[network]\ninput_width = 0\n");
    assert!(PipelineConfig::load_from(Some(file.path())).is_err());

    let garbage = config_file(".json", "{ not json");
    assert!(PipelineConfig::load_from(Some(garbage.path())).is_err());

    clear_env();
}
