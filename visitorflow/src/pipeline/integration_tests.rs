//! End-to-end runs of the notification pipeline against in-memory backends.

#[cfg(test)]
mod tests {
    use crate::config::RecordLinks;
    use crate::core::{StepId, StepStatus};
    use crate::errors::ServiceError;
    use crate::pipeline::{
        CollectingProgressSink, NoOpProgressSink, NotificationPipeline, PipelineConfig,
        PipelineServices, TIMEOUT_MESSAGE,
    };
    use crate::recovery::{RecoveryConfig, ServiceRecovery};
    use crate::registration::{
        HostNotification, SendOutcome, VisitorRegistration, WelcomePackageOptions,
    };
    use crate::services::{
        Backends, EmailService, InMemoryChatService, InMemoryEmailService, InMemoryRecordStore,
        MockRecordStore, RecordRef,
    };
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use std::time::Duration;

    struct Harness {
        records: Arc<InMemoryRecordStore>,
        email: Arc<InMemoryEmailService>,
        chat: Arc<InMemoryChatService>,
        pipeline: NotificationPipeline,
    }

    fn fast_config() -> PipelineConfig {
        PipelineConfig::new()
            .with_max_retries(2)
            .with_retry_delay_ms(1)
            .with_timeout_ms(2_000)
    }

    fn services(backends: Backends) -> PipelineServices {
        let recovery = Arc::new(ServiceRecovery::new(
            RecoveryConfig::default().with_base_delay_ms(1),
        ));
        PipelineServices::new(backends, recovery)
            .with_links(RecordLinks::new("https://sqla-studio.monday.com", "123"))
    }

    fn harness(config: PipelineConfig) -> Harness {
        let records = Arc::new(InMemoryRecordStore::new());
        let email = Arc::new(InMemoryEmailService::new());
        let chat = Arc::new(InMemoryChatService::new());
        let backends = Backends {
            records: records.clone(),
            email: email.clone(),
            chat: chat.clone(),
        };

        Harness {
            records,
            email,
            chat,
            pipeline: NotificationPipeline::new(config, services(backends)),
        }
    }

    fn registration() -> VisitorRegistration {
        VisitorRegistration::new("John", "Doe", "john@example.com")
            .with_host("1", "Sarah Johnson", "sarah@sqla.com")
            .with_company("Acme Studios")
            .with_signature_blob(vec![0x89, 0x50, 0x4e, 0x47])
    }

    fn statuses(result: &crate::core::NotificationPipelineResult) -> Vec<StepStatus> {
        result.steps.iter().map(|s| s.status).collect()
    }

    #[tokio::test]
    async fn test_all_steps_complete() {
        let h = harness(fast_config());

        let result = h
            .pipeline
            .process_visitor_registration(&registration(), &NoOpProgressSink)
            .await;

        assert!(result.success);
        assert_eq!(result.total_steps, 6);
        assert_eq!(result.completed_steps, 6);
        assert_eq!(result.failed_steps, 0);
        assert_eq!(result.monday_record_id, Some(1001));
        assert_eq!(
            result.monday_record_url.as_deref(),
            Some("https://sqla-studio.monday.com/boards/123/pulses/1001")
        );
        assert!(result.steps.iter().all(|s| s.attempts == 1));

        assert_eq!(h.email.sent().len(), 2);
        assert_eq!(h.chat.sent().len(), 1);

        let record = h.records.record(1001).unwrap();
        assert_eq!(record.files.len(), 1);
        assert_eq!(record.notifications.len(), 3);
        assert_eq!(record.columns["status"], "Registration Complete");
        assert_eq!(record.columns["notification_status"], "All Sent");
        assert_eq!(
            record.columns["processing_status"],
            "Complete (5/6 steps successful)"
        );
    }

    #[tokio::test]
    async fn test_registration_without_files_completes_all_steps() {
        let reg: VisitorRegistration = serde_json::from_value(serde_json::json!({
            "firstName": "John",
            "email": "j@x.com",
            "hostName": "Sarah"
        }))
        .unwrap();
        assert!(reg.photo.is_none());
        assert!(reg.signature_data_url.is_none());

        let pipeline = NotificationPipeline::new(fast_config(), services(Backends::in_memory()));
        let result = pipeline
            .process_visitor_registration(&reg, &NoOpProgressSink)
            .await;

        assert!(result.success);
        assert_eq!(result.total_steps, 6);
        assert_eq!(result.completed_steps, 6);
        assert_eq!(result.failed_steps, 0);

        let upload = result.step(StepId::FileUpload).unwrap();
        assert_eq!(upload.result.as_ref().unwrap()["success"], true);
        assert_eq!(upload.result.as_ref().unwrap()["errors"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_failing_chat_is_isolated() {
        let h = harness(fast_config());
        h.chat.fail_always(ServiceError::network("connection refused"));

        let result = h
            .pipeline
            .process_visitor_registration(&registration(), &NoOpProgressSink)
            .await;

        let chat = result.step(StepId::ChatNotification).unwrap();
        assert_eq!(chat.status, StepStatus::Failed);
        assert_eq!(chat.attempts, chat.max_attempts);
        assert_eq!(chat.error.as_deref(), Some("network error: connection refused"));

        assert_eq!(result.completed_steps, 5);
        assert_eq!(result.failed_steps, 1);
        assert!(result.success);

        let record = h.records.record(1001).unwrap();
        assert_eq!(record.columns["notification_status"], "Some Failed");
        assert_eq!(record.notifications.len(), 2);
    }

    #[tokio::test]
    async fn test_partial_failure_is_not_success_without_continue() {
        let h = harness(fast_config().with_continue_on_failure(false));
        h.chat.fail_always(ServiceError::network("connection refused"));

        let result = h
            .pipeline
            .process_visitor_registration(&registration(), &NoOpProgressSink)
            .await;

        assert!(!result.success);
        assert_eq!(
            statuses(&result),
            vec![
                StepStatus::Completed,
                StepStatus::Completed,
                StepStatus::Completed,
                StepStatus::Completed,
                StepStatus::Failed,
                StepStatus::Pending,
            ]
        );
    }

    #[tokio::test]
    async fn test_abort_leaves_later_steps_pending() {
        let h = harness(fast_config().with_max_retries(0).with_continue_on_failure(false));
        h.email.fail_always(ServiceError::http(500, "Internal Server Error"));

        let result = h
            .pipeline
            .process_visitor_registration(&registration(), &NoOpProgressSink)
            .await;

        assert!(!result.success);
        assert_eq!(result.completed_steps, 2);
        assert_eq!(result.failed_steps, 1);
        assert_eq!(
            statuses(&result)[2..].to_vec(),
            vec![
                StepStatus::Failed,
                StepStatus::Pending,
                StepStatus::Pending,
                StepStatus::Pending,
            ]
        );
        assert_eq!(h.chat.call_count(), 0);
    }

    #[tokio::test]
    async fn test_upload_failure_does_not_block_notifications() {
        let h = harness(fast_config());
        h.records.fail_always(ServiceError::other("board locked"));

        let result = h
            .pipeline
            .process_visitor_registration(&registration(), &NoOpProgressSink)
            .await;

        let upload = result.step(StepId::FileUpload).unwrap();
        assert_eq!(upload.status, StepStatus::Failed);
        assert_eq!(
            upload.error.as_deref(),
            Some("File upload failed: Failed to create visitor record: board locked")
        );
        assert_eq!(result.monday_record_id, None);
        assert_eq!(result.monday_record_url, None);

        let status = result.step(StepId::MondayStatus).unwrap();
        assert_eq!(status.status, StepStatus::Completed);
        assert_eq!(status.result.as_ref().unwrap()["message"], "No Monday record to update");
        assert_eq!(result.completed_steps, 5);
        assert_eq!(h.email.sent().len(), 2);
    }

    #[tokio::test]
    async fn test_retry_failed_steps_only_reruns_failures() {
        let h = harness(fast_config());
        h.chat.fail_always(ServiceError::network("connection refused"));
        let reg = registration();

        let first = h
            .pipeline
            .process_visitor_registration(&reg, &NoOpProgressSink)
            .await;
        assert_eq!(first.failed_step_ids(), vec![StepId::ChatNotification]);

        h.chat.recover();
        let emails_before = h.email.sent().len();
        let sink = CollectingProgressSink::new();

        let retried = h
            .pipeline
            .retry_failed_steps(first.clone(), &reg, &sink)
            .await;

        assert!(retried.success);
        assert_eq!(retried.completed_steps, 6);
        assert_eq!(retried.failed_steps, 0);
        assert_eq!(retried.monday_record_id, first.monday_record_id);

        for (before, after) in first.steps.iter().zip(&retried.steps) {
            if before.id != StepId::ChatNotification {
                assert_eq!(before, after);
            }
        }

        let chat = retried.step(StepId::ChatNotification).unwrap();
        assert_eq!(chat.attempts, 1);
        assert_eq!(chat.error, None);
        assert_eq!(
            sink.statuses_for(StepId::ChatNotification),
            vec![StepStatus::Processing, StepStatus::Completed]
        );

        assert_eq!(h.records.len(), 1);
        assert_eq!(h.email.sent().len(), emails_before);
        assert_eq!(h.chat.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_tracking_failures_are_swallowed() {
        let mut records = MockRecordStore::new();
        records.expect_create_visitor_record().times(1).returning(|record| {
            Ok(RecordRef {
                id: 7,
                name: record.item_name(),
            })
        });
        records.expect_upload_file().returning(|item_id, column_id, file| {
            Ok(crate::services::UploadedFile {
                item_id,
                column_id: column_id.to_string(),
                filename: file.filename.clone(),
                size: file.size(),
                url: None,
            })
        });
        records.expect_update_item().times(2).returning(|_, _| Ok(()));
        records
            .expect_track_notification_status()
            .times(3)
            .returning(|_, _, _, _| Err(ServiceError::http(429, "Too Many Requests")));

        let backends = Backends {
            records: Arc::new(records),
            email: Arc::new(InMemoryEmailService::new()),
            chat: Arc::new(InMemoryChatService::new()),
        };
        let pipeline = NotificationPipeline::new(fast_config(), services(backends));

        let result = pipeline
            .process_visitor_registration(&registration(), &NoOpProgressSink)
            .await;

        assert!(result.success);
        assert_eq!(result.completed_steps, 6);
        assert_eq!(result.monday_record_id, Some(7));
    }

    struct SlowEmailService;

    #[async_trait]
    impl EmailService for SlowEmailService {
        async fn send_host_notification(
            &self,
            _notification: &HostNotification,
        ) -> Result<SendOutcome, ServiceError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(SendOutcome::sent("late"))
        }

        async fn send_welcome_package(
            &self,
            _registration: &VisitorRegistration,
            _options: &WelcomePackageOptions,
        ) -> Result<SendOutcome, ServiceError> {
            Ok(SendOutcome::sent("welcome"))
        }
    }

    #[tokio::test]
    async fn test_slow_send_times_out() {
        let backends = Backends {
            records: Arc::new(InMemoryRecordStore::new()),
            email: Arc::new(SlowEmailService),
            chat: Arc::new(InMemoryChatService::new()),
        };
        let config = fast_config().with_max_retries(1).with_timeout_ms(25);
        let pipeline = NotificationPipeline::new(config, services(backends));

        let result = pipeline
            .process_visitor_registration(&registration(), &NoOpProgressSink)
            .await;

        let host = result.step(StepId::HostEmail).unwrap();
        assert_eq!(host.status, StepStatus::Failed);
        assert_eq!(host.attempts, 2);
        assert_eq!(host.error.as_deref(), Some(TIMEOUT_MESSAGE));
        assert_eq!(
            result.step(StepId::WelcomeEmail).unwrap().status,
            StepStatus::Completed
        );
    }

    #[tokio::test]
    async fn test_progress_updates_follow_step_order() {
        let h = harness(fast_config());
        let sink = CollectingProgressSink::new();

        h.pipeline
            .process_visitor_registration(&registration(), &sink)
            .await;

        let updates = sink.updates();
        assert_eq!(updates.len(), 12);
        for (pair, id) in updates.chunks(2).zip(StepId::ALL) {
            assert_eq!(pair[0].id, id);
            assert_eq!(pair[0].status, StepStatus::Processing);
            assert_eq!(pair[1].id, id);
            assert_eq!(pair[1].status, StepStatus::Completed);
        }
    }

    #[tokio::test]
    async fn test_closure_sink_sees_retrying_status() {
        let h = harness(fast_config());
        h.email.fail_next(3, ServiceError::http(503, "Service Unavailable"));
        let seen = parking_lot::Mutex::new(Vec::new());
        let sink = |step: &crate::core::NotificationStep| {
            if step.id == StepId::HostEmail {
                seen.lock().push(step.status);
            }
        };

        let result = h
            .pipeline
            .process_visitor_registration(&registration(), &sink)
            .await;

        assert!(result.success);
        assert_eq!(
            *seen.lock(),
            vec![StepStatus::Processing, StepStatus::Retrying, StepStatus::Completed]
        );
    }

    #[test]
    fn test_step_status_summary() {
        let mut steps: Vec<_> = StepId::ALL
            .iter()
            .map(|id| crate::core::NotificationStep::new(*id, 3))
            .collect();
        steps[0].status = StepStatus::Completed;
        steps[1].status = StepStatus::Retrying;
        steps[2].status = StepStatus::Failed;

        let summary = NotificationPipeline::step_status_summary(&steps);
        assert_eq!(summary.completed, 1);
        assert_eq!(summary.processing, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.pending, 3);
        assert_eq!(summary.total, 6);
    }
}
