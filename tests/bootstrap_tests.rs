mod common;

use chimera_core::orchestration::{BootstrapConfig, CoreBootstrap};
use chimera_core::state_machine::RunState;
use common::*;
use std::fs;
use std::time::Duration;
use tempfile::TempDir;

#[tokio::test]
async fn test_bootstrap_from_config_directory() {
    let config_dir = TempDir::new().unwrap();
    let save_dir = TempDir::new().unwrap();
    fs::write(
        config_dir.path().join("core.toml"),
        format!(
            "[lifecycle]\ntick_interval_ms = 1\n\n[persistence]\nsave_directory = {:?}\nauto_save_enabled = false\n",
            save_dir.path().display().to_string()
        ),
    )
    .unwrap();
    fs::write(
        config_dir.path().join("core.test.toml"),
        "[events]\nmax_events_per_frame = 50\n",
    )
    .unwrap();

    let config = BootstrapConfig {
        auto_start: true,
        init_logging: false,
        config_directory: Some(config_dir.path().to_path_buf()),
        environment_override: Some("test".to_string()),
    };
    let mut handle = CoreBootstrap::bootstrap(config, |orchestrator| {
        orchestrator.register_component(Garden::with_plants(3));
    })
    .await
    .expect("bootstrap");

    for _ in 0..500 {
        if handle.status().state == RunState::Running {
            break;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    assert_eq!(handle.status().state, RunState::Running);
    assert_eq!(
        handle.config_manager.config().events.max_events_per_frame,
        50
    );

    let info = handle
        .orchestrator
        .lock()
        .save_game_now(1, "From bootstrap")
        .unwrap();
    assert!(info.file_path.starts_with(save_dir.path()));

    let report = handle.stop_and_wait().await.expect("shutdown report");
    assert!(report.shut_down.contains(&"garden".to_string()));
    assert!(report.failed.is_empty());
    assert_eq!(handle.status().state, RunState::Shutdown);
    assert!(!handle.status().running);
}
