//! Stage sequencing: drop → create → load → transform.
//!
//! Stages always run in that order and the first failure aborts the run.
//! Callers may skip drop/create on repeated runs.

use crate::ddl::{create_all, drop_all};
use crate::load::{load_all, LoadReport};
use crate::statement::Warehouse;
use crate::transform::{transform_all, TransformReport};
use elt_core::{PipelineConfig, Result};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{info, info_span, Instrument};

/// Pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Drop,
    Create,
    Load,
    Transform,
}

impl Stage {
    pub const ALL: [Stage; 4] = [Stage::Drop, Stage::Create, Stage::Load, Stage::Transform];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Drop => "drop",
            Self::Create => "create",
            Self::Load => "load",
            Self::Transform => "transform",
        }
    }
}

/// What a run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub stages: Vec<Stage>,
    pub load: Option<LoadReport>,
    pub transform: Option<TransformReport>,
}

/// Run the requested stages in pipeline order.
pub async fn run_stages(
    warehouse: &dyn Warehouse,
    config: &PipelineConfig,
    stages: &[Stage],
) -> Result<RunReport> {
    let mut ordered = stages.to_vec();
    ordered.sort();
    ordered.dedup();

    let mut report = RunReport::default();
    for stage in ordered {
        let started = Instant::now();
        let span = info_span!("stage", stage = stage.name());
        async {
            match stage {
                Stage::Drop => drop_all(warehouse).await,
                Stage::Create => create_all(warehouse).await,
                Stage::Load => load_all(warehouse, config)
                    .await
                    .map(|load| report.load = Some(load)),
                Stage::Transform => transform_all(warehouse)
                    .await
                    .map(|transform| report.transform = Some(transform)),
            }
        }
        .instrument(span)
        .await?;

        info!(
            stage = stage.name(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Stage complete"
        );
        report.stages.push(stage);
    }
    Ok(report)
}
