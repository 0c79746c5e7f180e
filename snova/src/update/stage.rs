//! Update pipeline stages

use serde::{Deserialize, Serialize};

/// Stages of an update, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateStage {
    /// Internal patches and the release-installation check
    Gate,
    /// Refuse apps tracking a renamed branch
    BranchCheck,
    VersionDetect,
    /// Operator confirmation of a major upgrade
    Confirm,
    ShallowCloneWarning,
    /// Runtime requirements of the target version
    ValidateUpgrade,
    EnterMaintenance,
    Backup,
    Pull,
    Requirements,
    Patch,
    Build,
    PostUpgrade,
    Reload,
    ExitMaintenance,
}

impl UpdateStage {
    pub const ALL: [UpdateStage; 15] = [
        UpdateStage::Gate,
        UpdateStage::BranchCheck,
        UpdateStage::VersionDetect,
        UpdateStage::Confirm,
        UpdateStage::ShallowCloneWarning,
        UpdateStage::ValidateUpgrade,
        UpdateStage::EnterMaintenance,
        UpdateStage::Backup,
        UpdateStage::Pull,
        UpdateStage::Requirements,
        UpdateStage::Patch,
        UpdateStage::Build,
        UpdateStage::PostUpgrade,
        UpdateStage::Reload,
        UpdateStage::ExitMaintenance,
    ];
}

/// Where a stage ended up
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    Completed,
    Skipped,
    Failed(String),
}

/// Progress of one update run.
///
/// Stages only move forward: a stage may be entered once, after every
/// earlier stage it follows. A failed stage halts the run for good.
#[derive(Debug, Clone, Default)]
pub struct UpdateProgress {
    current: Option<UpdateStage>,
    history: Vec<(UpdateStage, StageStatus)>,
    halted: bool,
    maintenance_on: bool,
}

impl UpdateProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage currently running or last entered
    pub fn current(&self) -> Option<UpdateStage> {
        self.current
    }

    pub fn history(&self) -> &[(UpdateStage, StageStatus)] {
        &self.history
    }

    /// Stages whose action ran to completion
    pub fn completed(&self) -> Vec<UpdateStage> {
        self.history
            .iter()
            .filter(|(_, status)| *status == StageStatus::Completed)
            .map(|(stage, _)| *stage)
            .collect()
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Maintenance mode was persisted as on and not yet turned off
    pub fn maintenance_on(&self) -> bool {
        self.maintenance_on
    }

    /// Enter `stage`
    pub fn begin(&mut self, stage: UpdateStage) -> Result<(), String> {
        if self.halted {
            return Err(format!("Invalid transition: run halted, cannot enter {stage:?}"));
        }
        if let Some(current) = self.current {
            if stage <= current {
                return Err(format!("Invalid transition: {current:?} -> {stage:?}"));
            }
        }
        self.current = Some(stage);
        Ok(())
    }

    pub fn complete(&mut self) {
        if let Some(stage) = self.current {
            match stage {
                UpdateStage::EnterMaintenance => self.maintenance_on = true,
                UpdateStage::ExitMaintenance => self.maintenance_on = false,
                _ => {}
            }
            self.history.push((stage, StageStatus::Completed));
        }
    }

    pub fn skip(&mut self) {
        if let Some(stage) = self.current {
            self.history.push((stage, StageStatus::Skipped));
        }
    }

    pub fn fail(&mut self, error: String) {
        if let Some(stage) = self.current {
            self.history.push((stage, StageStatus::Failed(error)));
        }
        self.halted = true;
    }

    /// Stage that halted the run, if any
    pub fn failed_stage(&self) -> Option<UpdateStage> {
        self.history.iter().find_map(|(stage, status)| match status {
            StageStatus::Failed(_) => Some(*stage),
            _ => None,
        })
    }
}
