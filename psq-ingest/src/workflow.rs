//! Batch-processing workflow
//!
//! Runs the whole pipeline sequentially:
//! 1. validate inputs
//! 2. collect LIMS sample metadata for every batch
//! 3. read the raw-results worksheet
//! 4. compute residue results
//! 5. export per-sample reports (optional)
//!
//! Progress is logged and, when a channel is attached, emitted as
//! [`WorkflowEvent`]s. Cancellation is checked between stages and between
//! sample fetches.

use psq_common::time::unix_now;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::LimsSettings;
use crate::error::{ValidationError, WorkflowError, WorkflowResult};
use crate::lims::LimsClient;
use crate::models::{DisplayRow, ProcessedSample};
use crate::residue::process_batch;
use crate::services::{collect_sample_info, export_samples_to_directory, read_raw_results};

/// Inputs of one run
#[derive(Debug, Clone, Default)]
pub struct WorkflowRequest {
    pub batches: Vec<String>,
    pub workbook: PathBuf,
    /// Reports are exported only when set
    pub output_dir: Option<PathBuf>,
}

/// Progress events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WorkflowEvent {
    Started {
        batches: usize,
        /// Unix timestamp (seconds since epoch)
        timestamp: i64,
    },
    /// One batch summary line ("Batch 12: 4 samples fetched | ids=4")
    BatchResolved { diagnostic: String },
    ReadingWorkbook { path: String },
    Computing { readings: usize },
    Exporting { samples: usize },
    Completed { sample_count: usize, timestamp: i64 },
}

/// Result of a successful run
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowOutcome {
    pub samples: Vec<ProcessedSample>,
    pub display_rows: Vec<DisplayRow>,
    pub sample_count: usize,
    /// Per-batch resolution summaries
    pub diagnostics: Vec<String>,
    /// Report files written
    pub exported: Vec<PathBuf>,
}

/// Batch-processing workflow orchestrator
pub struct BatchProcessWorkflow {
    client: LimsClient,
    settings: LimsSettings,
    cancel: CancellationToken,
    event_tx: Option<mpsc::Sender<WorkflowEvent>>,
}

impl BatchProcessWorkflow {
    pub fn new(client: LimsClient, settings: LimsSettings) -> Self {
        Self {
            client,
            settings,
            cancel: CancellationToken::new(),
            event_tx: None,
        }
    }

    /// Attach an event channel for progress reporting
    pub fn with_events(mut self, event_tx: mpsc::Sender<WorkflowEvent>) -> Self {
        self.event_tx = Some(event_tx);
        self
    }

    /// Share an externally owned cancellation token
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    async fn emit_event(&self, event: WorkflowEvent) {
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(event).await;
        }
    }

    fn check_cancelled(&self) -> WorkflowResult<()> {
        if self.cancel.is_cancelled() {
            warn!("Batch processing cancelled");
            return Err(WorkflowError::Cancelled);
        }
        Ok(())
    }

    /// Run the pipeline for `request`
    pub async fn run(&self, request: &WorkflowRequest) -> WorkflowResult<WorkflowOutcome> {
        let batches: Vec<String> = request
            .batches
            .iter()
            .map(|b| b.trim().to_string())
            .filter(|b| !b.is_empty())
            .collect();
        if batches.is_empty() {
            return Err(ValidationError::NoBatches.into());
        }
        if !request.workbook.exists() {
            return Err(ValidationError::WorkbookNotFound(request.workbook.clone()).into());
        }

        info!(batches = ?batches, workbook = %request.workbook.display(), "Batch processing started");
        self.emit_event(WorkflowEvent::Started {
            batches: batches.len(),
            timestamp: unix_now(),
        })
        .await;

        let collection = collect_sample_info(&self.client, &self.settings, &batches, &self.cancel).await?;
        for diagnostic in &collection.diagnostics {
            info!("{}", diagnostic);
            self.emit_event(WorkflowEvent::BatchResolved {
                diagnostic: diagnostic.clone(),
            })
            .await;
        }
        if collection.is_empty() {
            return Err(ValidationError::NoSampleMetadata(batches.join(", ")).into());
        }
        self.check_cancelled()?;

        self.emit_event(WorkflowEvent::ReadingWorkbook {
            path: request.workbook.display().to_string(),
        })
        .await;
        let readings = read_raw_results(&request.workbook)?;
        self.check_cancelled()?;

        self.emit_event(WorkflowEvent::Computing {
            readings: readings.len(),
        })
        .await;
        let output = process_batch(&readings, &collection.info)?;
        self.check_cancelled()?;

        let exported = match &request.output_dir {
            Some(dir) => {
                self.emit_event(WorkflowEvent::Exporting {
                    samples: output.samples.len(),
                })
                .await;
                export_samples_to_directory(&output.samples, dir)?
            }
            None => Vec::new(),
        };

        let sample_count = output.samples.len();
        info!(samples = sample_count, exported = exported.len(), "Batch processing complete");
        self.emit_event(WorkflowEvent::Completed {
            sample_count,
            timestamp: unix_now(),
        })
        .await;

        Ok(WorkflowOutcome {
            samples: output.samples,
            display_rows: output.display_rows,
            sample_count,
            diagnostics: collection.diagnostics,
            exported,
        })
    }
}
