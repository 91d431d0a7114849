//! Loading planner configuration and device limits from TOML files.

use gather_tiling::{
    ConfigError, DataType, GatherRequest, PlannerConfig, ResourceLimits, TilingMode,
    TilingPlanner,
};
use serial_test::serial;
use std::io::Write;
use tempfile::NamedTempFile;

fn clear_env() {
    for key in [
        "GATHER_TILING_FORCE_MODE",
        "GATHER_TILING_MAX_LANES",
        "GATHER_TILING_MIN_LANES",
        "GATHER_TILING_WORKSPACE_BYTES",
    ] {
        // SAFETY: every test in this file is #[serial].
        unsafe { std::env::remove_var(key) };
    }
}

fn write_toml(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
#[serial]
fn load_reads_file_and_keeps_defaults() {
    clear_env();
    let file = write_toml(
        r#"
min_lanes = 64
workspace_bytes = 1048576

[simd_thresholds]
bytes_1 = 256
bytes_2 = 256
bytes_4 = 512
bytes_8 = 512
"#,
    );
    let cfg = PlannerConfig::load(file.path()).unwrap();
    assert_eq!(cfg.min_lanes, 64);
    assert_eq!(cfg.max_lanes, 2048);
    assert_eq!(cfg.workspace_bytes, 1_048_576);
    assert_eq!(cfg.simd_thresholds.for_width(8), 512);
}

#[test]
#[serial]
fn missing_file_is_io_error() {
    clear_env();
    let dir = tempfile::tempdir().unwrap();
    let err = PlannerConfig::load(&dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Io(_)));
}

#[test]
#[serial]
fn malformed_file_is_parse_error() {
    clear_env();
    let file = write_toml("max_lanes = \"many\"\n");
    let err = PlannerConfig::load(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
}

#[test]
#[serial]
fn invalid_values_fail_validation() {
    clear_env();
    let file = write_toml("max_lanes = 100\n");
    let err = PlannerConfig::load(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Validation(_)));
}

#[test]
#[serial]
fn env_override_beats_file() {
    clear_env();
    let file = write_toml("force_mode = \"simd_generic\"\n");
    unsafe { std::env::set_var("GATHER_TILING_FORCE_MODE", "simt_generic") };
    let cfg = PlannerConfig::load(file.path());
    clear_env();
    assert_eq!(cfg.unwrap().force_mode, Some(TilingMode::SimtGeneric));
}

#[test]
#[serial]
fn forced_mode_from_file_drives_planner() {
    clear_env();
    let file = write_toml("force_mode = \"simt_generic\"\n");
    let planner = TilingPlanner::new(PlannerConfig::load(file.path()).unwrap());
    let req = GatherRequest::new(vec![1, 1000], vec![4000], DataType::F32, 1);
    let plan = planner.plan(&req, &ResourceLimits::default()).unwrap();
    assert_eq!(plan.mode, TilingMode::SimtGeneric);
}

#[test]
#[serial]
fn limits_parse_from_toml_table() {
    let limits: ResourceLimits = toml::from_str(
        "execution_units = 20\nscratch_bytes = 262144\nalignment_bytes = 64\nreserved_bytes = 1024\n",
    )
    .unwrap();
    assert_eq!(limits.execution_units(), 20);
    assert_eq!(limits.usable_scratch(), 261_120);
}
