//! Recipient normalization.
//!
//! A trigger's `to` list is heterogeneous: bare subscriber-id strings,
//! inline subscriber definitions, and topic references. This module is
//! the single place that discriminates those shapes; everything
//! downstream works with typed descriptors.

use serde_json::Value;

use crate::error::AppError;
use crate::subscriber::SubscriberDefinition;

/// A typed recipient entry, valid for the duration of one trigger call.
#[derive(Debug, Clone)]
pub enum RecipientDescriptor {
    /// Reference to a subscriber by external id
    Subscriber(String),
    /// Reference to a topic by key
    Topic(String),
    /// Inline subscriber definition, registered lazily before fan-out
    Inline(SubscriberDefinition),
}

/// Convert the raw `to` list into ordered descriptors.
///
/// Rejects with `InvalidRecipient` when an entry matches none of the
/// three shapes, a topic reference is missing its key, or an inline
/// definition lacks `subscriberId`.
pub fn normalize_recipients(to: &[Value]) -> Result<Vec<RecipientDescriptor>, AppError> {
    let mut descriptors = Vec::with_capacity(to.len());

    for (index, entry) in to.iter().enumerate() {
        let descriptor = match entry {
            Value::String(id) => {
                if id.trim().is_empty() {
                    return Err(AppError::InvalidRecipient(format!(
                        "entry {index}: subscriber id must not be empty"
                    )));
                }
                RecipientDescriptor::Subscriber(id.clone())
            }
            Value::Object(fields) => {
                if let Some(topic_key) = fields.get("topicKey") {
                    let key = topic_key.as_str().unwrap_or("").trim();
                    if key.is_empty() {
                        return Err(AppError::InvalidRecipient(format!(
                            "entry {index}: topic reference is missing its key"
                        )));
                    }
                    RecipientDescriptor::Topic(key.to_string())
                } else if fields.contains_key("subscriberId") {
                    let definition: SubscriberDefinition = serde_json::from_value(entry.clone())
                        .map_err(|e| {
                            AppError::InvalidRecipient(format!(
                                "entry {index}: malformed subscriber definition: {e}"
                            ))
                        })?;
                    RecipientDescriptor::Inline(definition)
                } else {
                    return Err(AppError::InvalidRecipient(format!(
                        "entry {index}: object carries neither topicKey nor subscriberId"
                    )));
                }
            }
            other => {
                return Err(AppError::InvalidRecipient(format!(
                    "entry {index}: expected string or object, got {}",
                    json_type_name(other)
                )));
            }
        };
        descriptors.push(descriptor);
    }

    Ok(descriptors)
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_bare_subscriber_id() {
        let descriptors = normalize_recipients(&[json!("user-1")]).unwrap();
        assert!(matches!(
            &descriptors[0],
            RecipientDescriptor::Subscriber(id) if id == "user-1"
        ));
    }

    #[test]
    fn test_topic_reference() {
        let descriptors = normalize_recipients(&[json!({"topicKey": "orders"})]).unwrap();
        assert!(matches!(
            &descriptors[0],
            RecipientDescriptor::Topic(key) if key == "orders"
        ));
    }

    #[test]
    fn test_inline_definition() {
        let descriptors = normalize_recipients(&[json!({
            "subscriberId": "user-2",
            "firstName": "Ada",
            "email": "ada@example.com"
        })])
        .unwrap();

        match &descriptors[0] {
            RecipientDescriptor::Inline(definition) => {
                assert_eq!(definition.subscriber_id, "user-2");
                assert_eq!(definition.first_name.as_deref(), Some("Ada"));
            }
            other => panic!("expected inline descriptor, got {other:?}"),
        }
    }

    #[test]
    fn test_order_preserved() {
        let descriptors = normalize_recipients(&[
            json!("user-1"),
            json!({"topicKey": "orders"}),
            json!({"subscriberId": "user-2"}),
        ])
        .unwrap();

        assert!(matches!(descriptors[0], RecipientDescriptor::Subscriber(_)));
        assert!(matches!(descriptors[1], RecipientDescriptor::Topic(_)));
        assert!(matches!(descriptors[2], RecipientDescriptor::Inline(_)));
    }

    #[test]
    fn test_empty_string_rejected() {
        assert!(matches!(
            normalize_recipients(&[json!("  ")]),
            Err(AppError::InvalidRecipient(_))
        ));
    }

    #[test]
    fn test_topic_reference_without_key_rejected() {
        assert!(matches!(
            normalize_recipients(&[json!({"topicKey": ""})]),
            Err(AppError::InvalidRecipient(_))
        ));
        assert!(matches!(
            normalize_recipients(&[json!({"topicKey": 7})]),
            Err(AppError::InvalidRecipient(_))
        ));
    }

    #[test]
    fn test_object_with_neither_shape_rejected() {
        assert!(matches!(
            normalize_recipients(&[json!({"email": "ada@example.com"})]),
            Err(AppError::InvalidRecipient(_))
        ));
    }

    #[test]
    fn test_scalar_entry_rejected() {
        assert!(matches!(
            normalize_recipients(&[json!(42)]),
            Err(AppError::InvalidRecipient(_))
        ));
        assert!(matches!(
            normalize_recipients(&[json!(null)]),
            Err(AppError::InvalidRecipient(_))
        ));
    }
}
