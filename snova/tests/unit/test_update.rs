//! Update orchestration tests

mod support;

use std::time::Duration;

use serde_json::json;

use snova::errors::SnovaError;
use snova::procman::{Backend, RestartOutcome};
use snova::update::orchestrator::{OrchestratorOptions, UpdateOrchestrator};
use snova::update::plan::{UpdateOptions, UpdatePlan};
use snova::update::prompt::AssumeYes;
use snova::update::stage::UpdateStage;

use support::{DeclinePrompter, RecordingSteps, TempBench};

fn options() -> OrchestratorOptions {
    OrchestratorOptions {
        shallow_clone_pause: Duration::ZERO,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_full_update_runs_every_step_in_order() {
    let bench = TempBench::new(json!({})).await;
    let steps = RecordingSteps {
        sites: vec!["site1.local".into(), "site2.local".into()],
        ..Default::default()
    };

    let report = UpdateOrchestrator::new(&bench.ctx, &steps, &AssumeYes)
        .with_options(options())
        .run(&UpdatePlan::default())
        .await
        .unwrap();

    assert_eq!(
        steps.calls(),
        vec![
            "run_internal_patches",
            "backup_all_sites",
            "pull_apps",
            "install_requirements",
            "run_pending_patches:site1.local",
            "run_pending_patches:site2.local",
            "build_assets",
        ]
    );

    let config = bench.installation_config().await;
    assert_eq!(config["maintenance_mode"], json!(0));
    assert_eq!(config["pause_scheduler"], json!(0));

    assert!(!report.version_upgrade.unwrap().is_major);
    assert!(matches!(
        report.restart,
        Some(RestartOutcome::Restarted {
            backend: Backend::Supervisor,
            ..
        })
    ));
    assert!(report.stages.contains(&UpdateStage::EnterMaintenance));
    assert!(report.stages.contains(&UpdateStage::ExitMaintenance));
    assert!(!report.stages.contains(&UpdateStage::Confirm));
}

#[tokio::test]
async fn test_release_installation_is_blocked_before_touching_files() {
    let bench = TempBench::new(json!({"release_snova": true})).await;
    let before = bench.installation_bytes().await;
    let steps = RecordingSteps::default();

    let result = UpdateOrchestrator::new(&bench.ctx, &steps, &AssumeYes)
        .with_options(options())
        .run(&UpdatePlan::default())
        .await;

    assert!(matches!(result, Err(SnovaError::UpgradeBlocked(_))));
    assert_eq!(bench.installation_bytes().await, before);
    assert!(steps.calls().is_empty());
    assert!(bench.runner.calls().is_empty());
    assert!(!bench.ctx.layout().patches_log_file().exists().await);
}

#[tokio::test]
async fn test_patch_failure_halts_with_maintenance_on() {
    let bench = TempBench::new(json!({})).await;
    let steps = RecordingSteps {
        sites: vec!["site1.local".into(), "broken.local".into(), "site3.local".into()],
        failing_site: Some("broken.local".into()),
        ..Default::default()
    };

    let mut orchestrator = UpdateOrchestrator::new(&bench.ctx, &steps, &AssumeYes).with_options(options());
    let result = orchestrator.run(&UpdatePlan::default()).await;

    match result {
        Err(SnovaError::PatchError { site, .. }) => assert_eq!(site, "broken.local"),
        other => panic!("expected a patch error, got {other:?}"),
    }
    assert_eq!(orchestrator.progress().failed_stage(), Some(UpdateStage::Patch));
    assert!(orchestrator.progress().maintenance_on());

    let config = bench.installation_config().await;
    assert_eq!(config["maintenance_mode"], json!(1));
    assert_eq!(config["pause_scheduler"], json!(1));

    // Later sites, build and reload never ran
    assert!(!steps.called("run_pending_patches:site3.local"));
    assert!(!steps.called("build_assets"));
    assert!(!bench.runner.ran("supervisorctl"));
}

#[tokio::test]
async fn test_step_failure_propagates_unchanged() {
    let bench = TempBench::new(json!({})).await;
    let steps = RecordingSteps {
        failing_step: Some("pull_apps"),
        ..Default::default()
    };

    let result = UpdateOrchestrator::new(&bench.ctx, &steps, &AssumeYes)
        .with_options(options())
        .run(&UpdatePlan::default())
        .await;

    assert!(matches!(result, Err(SnovaError::CommandFailed { .. })));
    assert_eq!(bench.installation_config().await["maintenance_mode"], json!(1));
    assert!(!steps.called("install_requirements"));
}

#[tokio::test]
async fn test_declined_major_upgrade_changes_nothing() {
    let bench = TempBench::new(json!({})).await;
    let steps = RecordingSteps {
        installed_version: Some("14.2.0".into()),
        upstream_version: Some("15.0.0-dev".into()),
        ..Default::default()
    };

    let result = UpdateOrchestrator::new(&bench.ctx, &steps, &DeclinePrompter)
        .with_options(options())
        .run(&UpdatePlan::default())
        .await;

    assert!(matches!(result, Err(SnovaError::Aborted(_))));
    assert!(bench.installation_config().await.get("maintenance_mode").is_none());
    assert!(!steps.called("backup_all_sites"));
}

#[tokio::test]
async fn test_forced_major_upgrade_runs_post_upgrade_hooks() {
    let bench = TempBench::new(json!({"restart_supervisor_on_update": true})).await;
    let steps = RecordingSteps {
        installed_version: Some("14.2.0".into()),
        upstream_version: Some("15.0.0".into()),
        ..Default::default()
    };
    let plan = UpdatePlan::from_options(&UpdateOptions {
        force: true,
        ..Default::default()
    });

    let report = UpdateOrchestrator::new(&bench.ctx, &steps, &DeclinePrompter)
        .with_options(options())
        .run(&plan)
        .await
        .unwrap();

    let upgrade = report.version_upgrade.unwrap();
    assert!(upgrade.is_major);
    assert_eq!((upgrade.from, upgrade.to), (14, 15));
    assert!(steps.called("regenerate_cache_config"));
    assert!(steps.called("regenerate_supervisor_config"));
    assert!(steps.called("regenerate_reverse_proxy_config"));
    assert!(report.stages.contains(&UpdateStage::PostUpgrade));
}

#[tokio::test]
async fn test_major_upgrade_requires_node() {
    let bench = TempBench::new(json!({})).await;
    for exe in ["npm", "node", "nodejs"] {
        bench.ctx.set_executable(exe, None);
    }
    let steps = RecordingSteps {
        installed_version: Some("14.2.0".into()),
        upstream_version: Some("15.0.0".into()),
        ..Default::default()
    };

    let result = UpdateOrchestrator::new(&bench.ctx, &steps, &AssumeYes)
        .with_options(options())
        .run(&UpdatePlan::default())
        .await;

    assert!(matches!(result, Err(SnovaError::UpgradeBlocked(_))));
    assert!(bench.installation_config().await.get("maintenance_mode").is_none());
}

#[tokio::test]
async fn test_deprecated_branch_is_refused() {
    let bench = TempBench::new(json!({})).await;
    let steps = RecordingSteps {
        branch: "master".into(),
        ..Default::default()
    };

    let result = UpdateOrchestrator::new(&bench.ctx, &steps, &AssumeYes)
        .with_options(options())
        .run(&UpdatePlan::default())
        .await;

    match result {
        Err(SnovaError::DeprecatedBranch { app, branch }) => {
            assert_eq!(app, "sparrow");
            assert_eq!(branch, "master");
        }
        other => panic!("expected a deprecated branch error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_restart_failure_is_a_warning_unless_strict() {
    let bench = TempBench::new(json!({})).await;
    bench.runner.on("supervisorctl restart", 1, "sparrow: ERROR (no such group)");
    let steps = RecordingSteps::default();

    let report = UpdateOrchestrator::new(&bench.ctx, &steps, &AssumeYes)
        .with_options(options())
        .run(&UpdatePlan::default())
        .await
        .unwrap();
    assert!(matches!(report.restart, Some(RestartOutcome::Failed { .. })));
    assert_eq!(bench.installation_config().await["maintenance_mode"], json!(0));

    let strict = UpdatePlan::from_options(&UpdateOptions {
        strict_restart: true,
        ..Default::default()
    });
    let result = UpdateOrchestrator::new(&bench.ctx, &steps, &AssumeYes)
        .with_options(options())
        .run(&strict)
        .await;
    assert!(matches!(result, Err(SnovaError::CommandFailed { .. })));
    assert_eq!(bench.installation_config().await["maintenance_mode"], json!(1));
}

#[tokio::test]
async fn test_selected_steps_only() {
    let bench = TempBench::new(json!({"shallow_clone": true})).await;
    let steps = RecordingSteps::default();
    let plan = UpdatePlan::from_options(&UpdateOptions {
        patch: true,
        no_backup: true,
        ..Default::default()
    });

    let report = UpdateOrchestrator::new(&bench.ctx, &steps, &AssumeYes)
        .with_options(options())
        .run(&plan)
        .await
        .unwrap();

    assert_eq!(
        steps.calls(),
        vec!["run_internal_patches", "run_pending_patches:site1.local"]
    );
    // No pull, so no unshallow warning
    assert!(!report.stages.contains(&UpdateStage::ShallowCloneWarning));
}

#[tokio::test]
async fn test_shallow_clone_warning_without_reset() {
    let bench = TempBench::new(json!({"shallow_clone": true})).await;
    let steps = RecordingSteps::default();

    let report = UpdateOrchestrator::new(&bench.ctx, &steps, &AssumeYes)
        .with_options(options())
        .run(&UpdatePlan::default())
        .await
        .unwrap();

    assert!(report.stages.contains(&UpdateStage::ShallowCloneWarning));
}

#[tokio::test]
async fn test_numeric_and_null_flags_are_read_by_truthiness() {
    let bench = TempBench::new(json!({
        "restart_supervisor_on_update": 1,
        "shallow_clone": null,
        "release_snova": 0
    }))
    .await;
    let steps = RecordingSteps {
        installed_version: Some("14.2.0".into()),
        upstream_version: Some("15.0.0".into()),
        ..Default::default()
    };

    let report = UpdateOrchestrator::new(&bench.ctx, &steps, &AssumeYes)
        .with_options(options())
        .run(&UpdatePlan::default())
        .await
        .unwrap();

    assert!(steps.called("regenerate_supervisor_config"));
    assert!(!report.stages.contains(&UpdateStage::ShallowCloneWarning));
    assert_eq!(bench.installation_config().await["maintenance_mode"], json!(0));
}
