//! The post-registration notification pipeline.
//!
//! A run executes six fixed steps in order. Each step goes through
//! [`execute_step`], and each external call inside a step goes through the
//! recovery facade, so a single send can be retried at two levels.

use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

use super::config::PipelineConfig;
use super::executor::execute_step;
use super::progress::ProgressSink;
use crate::config::{KioskConfig, RecordLinks};
use crate::core::{
    step_status_summary, NotificationPipelineResult, NotificationStep, StepId, StepStatusSummary,
};
use crate::errors::{ServiceError, VisitorflowError};
use crate::observability::SpanTimer;
use crate::recovery::{RecoveryConfig, ServiceRecovery};
use crate::registration::{
    HostNotification, NotificationKind, SendOutcome, VisitorRegistration, WelcomePackageOptions,
};
use crate::services::{Backends, ChatService, ColumnValues, EmailService, RecordStore};
use crate::upload::FileUploadService;
use crate::utils::iso_timestamp;

/// Collaborators a pipeline run talks to.
#[derive(Clone)]
pub struct PipelineServices {
    /// Visitor record store.
    pub records: Arc<dyn RecordStore>,
    /// Email provider.
    pub email: Arc<dyn EmailService>,
    /// Team chat.
    pub chat: Arc<dyn ChatService>,
    /// Breakers and retry policies.
    pub recovery: Arc<ServiceRecovery>,
    /// Photo and signature uploads.
    pub uploads: Arc<FileUploadService>,
    /// Builds record links.
    pub links: RecordLinks,
}

impl std::fmt::Debug for PipelineServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineServices")
            .field("links", &self.links)
            .finish_non_exhaustive()
    }
}

impl PipelineServices {
    /// Wires `backends` to `recovery`, with a default upload service.
    #[must_use]
    pub fn new(backends: Backends, recovery: Arc<ServiceRecovery>) -> Self {
        let uploads = Arc::new(FileUploadService::new(
            Arc::clone(&backends.records),
            Arc::clone(&recovery),
        ));
        Self {
            records: backends.records,
            email: backends.email,
            chat: backends.chat,
            recovery,
            uploads,
            links: RecordLinks::default(),
        }
    }

    /// Sets how record links are built.
    #[must_use]
    pub fn with_links(mut self, links: RecordLinks) -> Self {
        self.links = links;
        self
    }

    /// Replaces the upload service.
    #[must_use]
    pub fn with_uploads(mut self, uploads: Arc<FileUploadService>) -> Self {
        self.uploads = uploads;
        self
    }
}

/// Runs the notification steps for a registration.
#[derive(Debug, Clone)]
pub struct NotificationPipeline {
    config: PipelineConfig,
    services: PipelineServices,
}

impl NotificationPipeline {
    /// Creates a pipeline.
    #[must_use]
    pub fn new(config: PipelineConfig, services: PipelineServices) -> Self {
        Self { config, services }
    }

    /// Builds a pipeline from deployment settings.
    ///
    /// The record store is supplied by the caller; email and chat follow
    /// [`Backends::from_config`].
    #[must_use]
    pub fn from_config(config: &KioskConfig, records: Arc<dyn RecordStore>) -> Self {
        let recovery = Arc::new(ServiceRecovery::new(RecoveryConfig::default()));
        let services = PipelineServices::new(Backends::from_config(config, records), recovery)
            .with_links(config.links.clone());
        Self::new(config.pipeline, services)
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// The wired collaborators.
    #[must_use]
    pub fn services(&self) -> &PipelineServices {
        &self.services
    }

    /// Runs every step for `registration`.
    ///
    /// Never returns an error: failures are recorded on the steps. When
    /// the configuration aborts on failure, steps after the failed one stay
    /// pending.
    #[instrument(skip_all, fields(visitor = %registration.full_name()))]
    pub async fn process_visitor_registration(
        &self,
        registration: &VisitorRegistration,
        sink: &dyn ProgressSink,
    ) -> NotificationPipelineResult {
        let timer = SpanTimer::start("notification_pipeline");
        let steps = StepId::ALL
            .iter()
            .map(|id| NotificationStep::new(*id, self.config.max_attempts()))
            .collect();
        let mut result = NotificationPipelineResult::new(steps);

        info!(steps = result.total_steps, "Processing visitor registration");

        let ctx = StepContext::new(&self.services, registration, None, None);
        for index in 0..result.steps.len() {
            ctx.set_progress(step_status_summary(&result.steps));
            if let Err(e) = self.run_step(&ctx, &mut result.steps[index], sink).await {
                error!(error = %e, "Pipeline execution aborted");
                break;
            }
        }

        let (record_id, record_url) = ctx.record();
        result.monday_record_id = record_id;
        result.monday_record_url = record_url;
        result.recompute(self.config.continue_on_failure);

        info!(
            success = result.success,
            completed = result.completed_steps,
            failed = result.failed_steps,
            duration_ms = timer.finish(),
            "Notification pipeline finished"
        );
        result
    }

    /// Re-runs only the failed steps of `previous`.
    ///
    /// Completed steps are left untouched, and the record captured by the
    /// earlier run is reused rather than created again.
    #[instrument(skip_all, fields(visitor = %registration.full_name()))]
    pub async fn retry_failed_steps(
        &self,
        mut previous: NotificationPipelineResult,
        registration: &VisitorRegistration,
        sink: &dyn ProgressSink,
    ) -> NotificationPipelineResult {
        let failed = previous.failed_step_ids();
        info!(steps = ?failed, "Retrying failed steps");

        let ctx = StepContext::new(
            &self.services,
            registration,
            previous.monday_record_id,
            previous.monday_record_url.clone(),
        );

        for id in failed {
            ctx.set_progress(previous.status_summary());
            let Some(step) = previous.step_mut(id) else {
                continue;
            };
            step.reset();
            if let Err(e) = self.run_step(&ctx, step, sink).await {
                error!(error = %e, "Retry pass aborted");
                break;
            }
        }

        let (record_id, record_url) = ctx.record();
        previous.monday_record_id = record_id;
        previous.monday_record_url = record_url;
        previous.recompute(self.config.continue_on_failure);
        previous
    }

    /// Counts steps by status.
    #[must_use]
    pub fn step_status_summary(steps: &[NotificationStep]) -> StepStatusSummary {
        step_status_summary(steps)
    }

    async fn run_step(
        &self,
        ctx: &StepContext<'_>,
        step: &mut NotificationStep,
        sink: &dyn ProgressSink,
    ) -> Result<(), VisitorflowError> {
        let id = step.id;
        execute_step(step, &self.config, sink, move || ctx.run(id)).await
    }
}

/// State shared by the steps of one run.
struct StepContext<'a> {
    services: &'a PipelineServices,
    registration: &'a VisitorRegistration,
    record: Mutex<(Option<u64>, Option<String>)>,
    progress: Mutex<StepStatusSummary>,
}

impl<'a> StepContext<'a> {
    fn new(
        services: &'a PipelineServices,
        registration: &'a VisitorRegistration,
        record_id: Option<u64>,
        record_url: Option<String>,
    ) -> Self {
        Self {
            services,
            registration,
            record: Mutex::new((record_id, record_url)),
            progress: Mutex::new(StepStatusSummary::default()),
        }
    }

    fn record(&self) -> (Option<u64>, Option<String>) {
        self.record.lock().clone()
    }

    fn record_id(&self) -> Option<u64> {
        self.record.lock().0
    }

    fn record_url(&self) -> Option<String> {
        self.record.lock().1.clone()
    }

    fn set_progress(&self, summary: StepStatusSummary) {
        *self.progress.lock() = summary;
    }

    async fn run(&self, id: StepId) -> Result<Value, ServiceError> {
        match id {
            StepId::FileUpload => self.upload_files().await,
            StepId::MondayStatus => self.mark_registered().await,
            StepId::HostEmail => self.send_host_email().await,
            StepId::WelcomeEmail => self.send_welcome_email().await,
            StepId::ChatNotification => self.notify_chat().await,
            StepId::FinalStatus => self.write_final_status().await,
        }
    }

    async fn upload_files(&self) -> Result<Value, ServiceError> {
        let outcome = self
            .services
            .uploads
            .upload_visitor_files(self.registration, self.record_id())
            .await;

        if let Some(item_id) = outcome.item_id {
            *self.record.lock() = (Some(item_id), self.services.links.url_for(item_id));
        }

        if !outcome.success && !outcome.errors.is_empty() {
            return Err(ServiceError::other(format!(
                "File upload failed: {}",
                outcome.errors.join(", ")
            )));
        }
        to_json(&outcome)
    }

    async fn mark_registered(&self) -> Result<Value, ServiceError> {
        let Some(item_id) = self.record_id() else {
            return Ok(json!({"success": true, "message": "No Monday record to update"}));
        };

        let columns = columns(&[
            ("status", "Registration Complete".to_string()),
            ("processing_status", "Processing Notifications".to_string()),
            ("last_updated", iso_timestamp()),
        ]);
        self.update_record(item_id, columns).await?;
        Ok(json!({"success": true, "itemId": item_id}))
    }

    async fn send_host_email(&self) -> Result<Value, ServiceError> {
        let notification = HostNotification::for_registration(
            self.registration,
            visit_time(),
            self.record_url(),
        );
        let email = self.services.email.as_ref();
        let notification = &notification;

        let outcome = self
            .services
            .recovery
            .execute_email(move || email.send_host_notification(notification))
            .await?;
        self.finish_send(NotificationKind::Email, outcome).await
    }

    async fn send_welcome_email(&self) -> Result<Value, ServiceError> {
        let options = WelcomePackageOptions::for_registration(self.registration);
        let email = self.services.email.as_ref();
        let registration = self.registration;
        let options = &options;

        let outcome = self
            .services
            .recovery
            .execute_email(move || email.send_welcome_package(registration, options))
            .await?;
        self.finish_send(NotificationKind::Email, outcome).await
    }

    async fn notify_chat(&self) -> Result<Value, ServiceError> {
        let chat = self.services.chat.as_ref();
        let registration = self.registration;
        let record_url = self.record_url();

        let outcome = self
            .services
            .recovery
            .execute_chat(move || chat.notify_team_of_visitor(registration, record_url.clone()))
            .await?;
        self.finish_send(NotificationKind::Chat, outcome).await
    }

    async fn write_final_status(&self) -> Result<Value, ServiceError> {
        let Some(item_id) = self.record_id() else {
            return Ok(json!({"success": true, "message": "Final status updated"}));
        };

        let progress = *self.progress.lock();
        let notification_status = if progress.failed > 0 {
            "Some Failed"
        } else {
            "All Sent"
        };
        let columns = columns(&[
            (
                "processing_status",
                format!(
                    "Complete ({}/{} steps successful)",
                    progress.completed, progress.total
                ),
            ),
            ("notification_status", notification_status.to_string()),
            ("completed_at", iso_timestamp()),
        ]);
        self.update_record(item_id, columns).await?;
        Ok(json!({"success": true, "itemId": item_id}))
    }

    async fn update_record(&self, item_id: u64, columns: ColumnValues) -> Result<(), ServiceError> {
        let records = self.services.records.as_ref();
        let columns = &columns;
        self.services
            .recovery
            .execute_monday(move || records.update_item(item_id, columns.clone()))
            .await
    }

    /// Tracks the outcome against the record, then fails the step if the
    /// provider refused the message.
    async fn finish_send(
        &self,
        kind: NotificationKind,
        outcome: SendOutcome,
    ) -> Result<Value, ServiceError> {
        if let Some(item_id) = self.record_id() {
            if let Err(e) = self
                .services
                .records
                .track_notification_status(
                    item_id,
                    kind,
                    outcome.delivery_status(),
                    outcome.message_id.clone(),
                )
                .await
            {
                warn!(item_id, kind = %kind, error = %e, "Failed to track notification status");
            }
        }
        to_json(&outcome.into_result()?)
    }
}

fn columns(values: &[(&str, String)]) -> ColumnValues {
    values
        .iter()
        .map(|(k, v)| ((*k).to_string(), Value::String(v.clone())))
        .collect()
}

fn visit_time() -> String {
    crate::utils::now_utc()
        .format("%-d %B %Y, %H:%M UTC")
        .to_string()
}

fn to_json<T: Serialize>(value: &T) -> Result<Value, ServiceError> {
    serde_json::to_value(value).map_err(|e| ServiceError::other(e.to_string()))
}

