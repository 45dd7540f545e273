/// Event dispatcher (C5)
///
/// Parses the raw message body, checks and commits idempotency, and
/// invokes the uniform render-then-send handler for the event's type.
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tracing::{info, instrument, warn};

use crate::constants::IDEMPOTENCY_TTL_SECONDS;
use crate::error::ProcessingError;
use crate::event::{self, EventPayload, EventType, NotificationEvent};
use crate::gateway::EmailGateway;
use crate::renderer::TemplateRenderer;
use crate::services::idempotency::IdempotencyStore;

/// Every handler in this system does the same two things — render a
/// fixed template, send with a fixed subject — so the registry holds
/// data, not per-event-type functions.
#[derive(Debug, Clone)]
pub struct HandlerSpec {
    pub template_name: &'static str,
    pub subject: &'static str,
}

pub struct HandlerRegistry {
    handlers: HashMap<EventType, HandlerSpec>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        let mut handlers = HashMap::new();
        handlers.insert(
            EventType::InvoiceDueSoon,
            HandlerSpec {
                template_name: "invoice_due_soon.html",
                subject: "Your invoice is due soon",
            },
        );
        handlers.insert(
            EventType::InvoiceOverdue,
            HandlerSpec {
                template_name: "invoice_overdue.html",
                subject: "Your invoice is overdue",
            },
        );
        handlers.insert(
            EventType::ProfileDeletionScheduled,
            HandlerSpec {
                template_name: "profile_deletion_scheduled.html",
                subject: "Your account deletion is scheduled",
            },
        );
        Self { handlers }
    }

    pub fn get(&self, event_type: EventType) -> Option<&HandlerSpec> {
        self.handlers.get(&event_type)
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn render_context(event: &NotificationEvent) -> serde_json::Value {
    match &event.payload {
        EventPayload::InvoiceDueSoon {
            credit_card,
            month,
            year,
            due_date,
            amount,
            invoice_deep_link,
        } => json!({
            "recipient_name": event.recipient.name,
            "credit_card": credit_card,
            "month": month,
            "year": year,
            "due_date": due_date.to_rfc3339(),
            "amount": amount,
            "invoice_deep_link": invoice_deep_link,
        }),
        EventPayload::InvoiceOverdue {
            credit_card,
            month,
            year,
            due_date,
            amount,
            invoice_deep_link,
            days_overdue,
        } => json!({
            "recipient_name": event.recipient.name,
            "credit_card": credit_card,
            "month": month,
            "year": year,
            "due_date": due_date.to_rfc3339(),
            "amount": amount,
            "invoice_deep_link": invoice_deep_link,
            "days_overdue": days_overdue,
        }),
        EventPayload::ProfileDeletionScheduled {
            deletion_scheduled_at,
            reactivate_account_deep_link,
        } => json!({
            "recipient_name": event.recipient.name,
            "deletion_scheduled_at": deletion_scheduled_at.to_rfc3339(),
            "reactivate_account_deep_link": reactivate_account_deep_link,
        }),
    }
}

pub struct EventDispatcher {
    idempotency: Arc<dyn IdempotencyStore>,
    renderer: Arc<dyn TemplateRenderer>,
    gateway: Arc<dyn EmailGateway>,
    registry: HandlerRegistry,
}

impl EventDispatcher {
    pub fn new(
        idempotency: Arc<dyn IdempotencyStore>,
        renderer: Arc<dyn TemplateRenderer>,
        gateway: Arc<dyn EmailGateway>,
    ) -> Self {
        Self {
            idempotency,
            renderer,
            gateway,
            registry: HandlerRegistry::new(),
        }
    }

    /// Returns `Ok(true)` if the event was processed and delivered,
    /// `Ok(false)` if it was a duplicate (no handler invoked).
    #[instrument(
        skip(self, body),
        fields(correlation_id = correlation_id, trigger_type = tracing::field::Empty)
    )]
    pub async fn process(
        &self,
        body: &[u8],
        correlation_id: &str,
    ) -> Result<bool, ProcessingError> {
        let event = event::parse(body)?;
        tracing::Span::current().record("trigger_type", &event.trigger_type.as_str());
        let key = format!("idempotency:{}", event.message_id);

        if self.idempotency.exists(&key).await? {
            info!(
                message_id = %event.message_id,
                event_type = event.event_type.as_str(),
                trigger_type = %event.trigger_type,
                "duplicate message, skipping"
            );
            return Ok(false);
        }

        let spec = self.registry.get(event.event_type).ok_or_else(|| {
            ProcessingError::UnknownEventType(event.event_type.as_str().to_string())
        })?;

        let ctx = render_context(&event);
        let html_body = self.renderer.render(spec.template_name, &ctx)?;

        self.gateway
            .send(&event.recipient, spec.subject, &html_body, correlation_id)
            .await?;

        self.idempotency
            .set(&key, "processed", Duration::from_secs(IDEMPOTENCY_TTL_SECONDS))
            .await?;

        info!(
            message_id = %event.message_id,
            event_type = event.event_type.as_str(),
            trigger_type = %event.trigger_type,
            "notification delivered"
        );
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::idempotency::InMemoryIdempotencyStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubRenderer;
    impl TemplateRenderer for StubRenderer {
        fn render(&self, _name: &str, _ctx: &serde_json::Value) -> Result<String, ProcessingError> {
            Ok("<html>rendered</html>".to_string())
        }
    }

    struct FailingRenderer;
    impl TemplateRenderer for FailingRenderer {
        fn render(&self, name: &str, _ctx: &serde_json::Value) -> Result<String, ProcessingError> {
            Err(ProcessingError::TemplateNotFound(name.to_string()))
        }
    }

    struct CountingGateway {
        sends: AtomicUsize,
    }
    impl CountingGateway {
        fn new() -> Self {
            Self {
                sends: AtomicUsize::new(0),
            }
        }
    }
    #[async_trait]
    impl EmailGateway for CountingGateway {
        async fn send(
            &self,
            _to: &crate::event::Recipient,
            _subject: &str,
            _html_body: &str,
            _correlation_id: &str,
        ) -> Result<(), ProcessingError> {
            self.sends.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct FailingGateway;
    #[async_trait]
    impl EmailGateway for FailingGateway {
        async fn send(
            &self,
            _to: &crate::event::Recipient,
            _subject: &str,
            _html_body: &str,
            _correlation_id: &str,
        ) -> Result<(), ProcessingError> {
            Err(ProcessingError::Transient("smtp down".into()))
        }
    }

    fn sample_body() -> Vec<u8> {
        br#"{
            "message_id": "3d9d6bcd-bbfd-4b2d-9b5d-ab8dfbbd4bed",
            "timestamp": "2026-07-31T10:00:00Z",
            "trigger_type": "scheduled_job",
            "event_type": "INVOICE_DUE_SOON",
            "recipient": {"user_id": "u1", "email": "jane@example.com", "name": "Jane"},
            "payload": {
                "credit_card": "Visa ****1234",
                "month": 8,
                "year": 2026,
                "due_date": "2026-08-10T00:00:00Z",
                "amount": 129.90,
                "invoice_deep_link": "https://app.example.com/invoices/1"
            }
        }"#
        .to_vec()
    }

    #[tokio::test]
    async fn happy_path_delivers_and_records_idempotency() {
        let idempotency = Arc::new(InMemoryIdempotencyStore::new());
        let gateway = Arc::new(CountingGateway::new());
        let dispatcher = EventDispatcher::new(idempotency.clone(), Arc::new(StubRenderer), gateway.clone());

        let delivered = dispatcher.process(&sample_body(), "corr-1").await.unwrap();
        assert!(delivered);
        assert_eq!(gateway.sends.load(Ordering::SeqCst), 1);
        assert!(
            idempotency
                .exists("idempotency:3d9d6bcd-bbfd-4b2d-9b5d-ab8dfbbd4bed")
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn duplicate_message_skips_handler() {
        let idempotency = Arc::new(InMemoryIdempotencyStore::new());
        let gateway = Arc::new(CountingGateway::new());
        let dispatcher = EventDispatcher::new(idempotency.clone(), Arc::new(StubRenderer), gateway.clone());

        dispatcher.process(&sample_body(), "corr-1").await.unwrap();
        let second = dispatcher.process(&sample_body(), "corr-2").await.unwrap();

        assert!(!second);
        assert_eq!(gateway.sends.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn malformed_body_is_terminal_and_not_recorded() {
        let idempotency = Arc::new(InMemoryIdempotencyStore::new());
        let dispatcher = EventDispatcher::new(
            idempotency,
            Arc::new(StubRenderer),
            Arc::new(CountingGateway::new()),
        );

        let err = dispatcher.process(b"{not json", "corr-1").await.unwrap_err();
        assert!(err.is_terminal());
    }

    #[tokio::test]
    async fn template_failure_does_not_send_or_record() {
        let idempotency = Arc::new(InMemoryIdempotencyStore::new());
        let gateway = Arc::new(CountingGateway::new());
        let dispatcher = EventDispatcher::new(idempotency.clone(), Arc::new(FailingRenderer), gateway.clone());

        let err = dispatcher.process(&sample_body(), "corr-1").await.unwrap_err();
        assert!(matches!(err, ProcessingError::TemplateNotFound(_)));
        assert_eq!(gateway.sends.load(Ordering::SeqCst), 0);
        assert!(
            !idempotency
                .exists("idempotency:3d9d6bcd-bbfd-4b2d-9b5d-ab8dfbbd4bed")
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn transient_gateway_failure_is_not_recorded_as_processed() {
        let idempotency = Arc::new(InMemoryIdempotencyStore::new());
        let dispatcher = EventDispatcher::new(idempotency.clone(), Arc::new(StubRenderer), Arc::new(FailingGateway));

        let err = dispatcher.process(&sample_body(), "corr-1").await.unwrap_err();
        assert!(err.is_retriable());
        assert!(
            !idempotency
                .exists("idempotency:3d9d6bcd-bbfd-4b2d-9b5d-ab8dfbbd4bed")
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn mocked_gateway_is_invoked_with_the_registered_subject() {
        use crate::gateway::MockEmailGateway;

        let idempotency = Arc::new(InMemoryIdempotencyStore::new());
        let mut mock_gateway = MockEmailGateway::new();
        mock_gateway
            .expect_send()
            .withf(|_, subject, _, _| subject == "Your invoice is due soon")
            .times(1)
            .returning(|_, _, _, _| Ok(()));

        let dispatcher = EventDispatcher::new(idempotency, Arc::new(StubRenderer), Arc::new(mock_gateway));

        let delivered = dispatcher.process(&sample_body(), "corr-1").await.unwrap();
        assert!(delivered);
    }
}
