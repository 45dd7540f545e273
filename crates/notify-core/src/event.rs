/// Domain event schema and classifier (C1)
///
/// Parses a raw broker message body into a typed `NotificationEvent`,
/// in three stages so each failure mode maps to a distinct
/// `ProcessingError` variant: malformed JSON, schema shape violations,
/// and unrecognised event types.
use crate::error::ProcessingError;
use crate::utils::validation::validate_email_address;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    #[serde(rename = "INVOICE_DUE_SOON")]
    InvoiceDueSoon,
    #[serde(rename = "INVOICE_OVERDUE")]
    InvoiceOverdue,
    #[serde(rename = "PROFILE_DELETION_SCHEDULED")]
    ProfileDeletionScheduled,
}

impl EventType {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "INVOICE_DUE_SOON" => Some(Self::InvoiceDueSoon),
            "INVOICE_OVERDUE" => Some(Self::InvoiceOverdue),
            "PROFILE_DELETION_SCHEDULED" => Some(Self::ProfileDeletionScheduled),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvoiceDueSoon => "INVOICE_DUE_SOON",
            Self::InvoiceOverdue => "INVOICE_OVERDUE",
            Self::ProfileDeletionScheduled => "PROFILE_DELETION_SCHEDULED",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recipient {
    pub user_id: String,
    pub email: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventPayload {
    InvoiceDueSoon {
        credit_card: String,
        month: u32,
        year: i32,
        due_date: DateTime<Utc>,
        amount: f64,
        invoice_deep_link: String,
    },
    InvoiceOverdue {
        credit_card: String,
        month: u32,
        year: i32,
        due_date: DateTime<Utc>,
        amount: f64,
        invoice_deep_link: String,
        days_overdue: u32,
    },
    ProfileDeletionScheduled {
        deletion_scheduled_at: DateTime<Utc>,
        reactivate_account_deep_link: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationEvent {
    pub message_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub trigger_type: String,
    pub event_type: EventType,
    pub recipient: Recipient,
    pub payload: EventPayload,
}

fn require_object(value: &Value) -> Result<&serde_json::Map<String, Value>, ProcessingError> {
    value
        .as_object()
        .ok_or_else(|| ProcessingError::SchemaValidation("event body is not a JSON object".into()))
}

fn require_str<'a>(
    obj: &'a serde_json::Map<String, Value>,
    field: &str,
) -> Result<&'a str, ProcessingError> {
    obj.get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| ProcessingError::SchemaValidation(format!("missing or non-string field: {field}")))
}

fn parse_recipient(value: &Value) -> Result<Recipient, ProcessingError> {
    let obj = require_object(value)
        .map_err(|_| ProcessingError::SchemaValidation("recipient must be an object".into()))?;
    let user_id = require_str(obj, "user_id")?.to_string();
    let email = require_str(obj, "email")?.to_string();
    let name = require_str(obj, "name")?.to_string();

    validate_email_address(&email)?;

    Ok(Recipient {
        user_id,
        email,
        name,
    })
}

/// Parses a raw broker message body into a `NotificationEvent`.
///
/// Stage 1: well-formed JSON. Stage 2: required top-level shape.
/// Stage 3: event-type registry lookup and typed payload deserialization.
pub fn parse(body: &[u8]) -> Result<NotificationEvent, ProcessingError> {
    let value: Value = serde_json::from_slice(body)?;
    let obj = require_object(&value)?;

    let message_id_str = require_str(obj, "message_id")?;
    let message_id = Uuid::parse_str(message_id_str)
        .map_err(|e| ProcessingError::SchemaValidation(format!("invalid message_id: {e}")))?;

    let timestamp_str = require_str(obj, "timestamp")?;
    let timestamp = DateTime::parse_from_rfc3339(timestamp_str)
        .map_err(|e| ProcessingError::SchemaValidation(format!("invalid timestamp: {e}")))?
        .with_timezone(&Utc);

    let trigger_type = require_str(obj, "trigger_type")?.to_string();

    let event_type_str = require_str(obj, "event_type")?;
    let event_type = EventType::from_str(event_type_str)
        .ok_or_else(|| ProcessingError::UnknownEventType(event_type_str.to_string()))?;

    let recipient_value = obj
        .get("recipient")
        .ok_or_else(|| ProcessingError::SchemaValidation("missing field: recipient".into()))?;
    let recipient = parse_recipient(recipient_value)?;

    let payload_value = obj
        .get("payload")
        .ok_or_else(|| ProcessingError::SchemaValidation("missing field: payload".into()))?;
    if !payload_value.is_object() {
        return Err(ProcessingError::SchemaValidation(
            "payload must be an object".into(),
        ));
    }

    let payload = parse_payload(event_type, payload_value)?;

    Ok(NotificationEvent {
        message_id,
        timestamp,
        trigger_type,
        event_type,
        recipient,
        payload,
    })
}

fn parse_payload(event_type: EventType, value: &Value) -> Result<EventPayload, ProcessingError> {
    match event_type {
        EventType::InvoiceDueSoon => serde_json::from_value::<RawInvoiceDueSoon>(value.clone())
            .map(|raw| EventPayload::InvoiceDueSoon {
                credit_card: raw.credit_card,
                month: raw.month,
                year: raw.year,
                due_date: raw.due_date,
                amount: raw.amount,
                invoice_deep_link: raw.invoice_deep_link,
            })
            .map_err(|e| ProcessingError::SchemaValidation(format!("invalid INVOICE_DUE_SOON payload: {e}"))),
        EventType::InvoiceOverdue => serde_json::from_value::<RawInvoiceOverdue>(value.clone())
            .map(|raw| EventPayload::InvoiceOverdue {
                credit_card: raw.credit_card,
                month: raw.month,
                year: raw.year,
                due_date: raw.due_date,
                amount: raw.amount,
                invoice_deep_link: raw.invoice_deep_link,
                days_overdue: raw.days_overdue,
            })
            .map_err(|e| ProcessingError::SchemaValidation(format!("invalid INVOICE_OVERDUE payload: {e}"))),
        EventType::ProfileDeletionScheduled => {
            serde_json::from_value::<RawProfileDeletionScheduled>(value.clone())
                .map(|raw| EventPayload::ProfileDeletionScheduled {
                    deletion_scheduled_at: raw.deletion_scheduled_at,
                    reactivate_account_deep_link: raw.reactivate_account_deep_link,
                })
                .map_err(|e| {
                    ProcessingError::SchemaValidation(format!(
                        "invalid PROFILE_DELETION_SCHEDULED payload: {e}"
                    ))
                })
        }
    }
}

#[derive(Deserialize)]
struct RawInvoiceDueSoon {
    credit_card: String,
    month: u32,
    year: i32,
    due_date: DateTime<Utc>,
    amount: f64,
    invoice_deep_link: String,
}

#[derive(Deserialize)]
struct RawInvoiceOverdue {
    credit_card: String,
    month: u32,
    year: i32,
    due_date: DateTime<Utc>,
    amount: f64,
    invoice_deep_link: String,
    days_overdue: u32,
}

#[derive(Deserialize)]
struct RawProfileDeletionScheduled {
    deletion_scheduled_at: DateTime<Utc>,
    reactivate_account_deep_link: String,
}
