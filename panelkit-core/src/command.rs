//! Typed inbound commands.
//!
//! Each panel defines one command enum and maps it to and from the exact
//! event-type strings on the bus. Parsing is the only place where strings
//! turn into commands.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::event::PanelEvent;

#[derive(Debug)]
pub enum CommandError {
    /// The event type is not one of this panel's commands
    UnknownEvent { event_type: String },
    /// The payload does not have the expected shape
    InvalidPayload {
        event_type: String,
        source: serde_json::Error,
    },
}

impl std::fmt::Display for CommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownEvent { event_type } => write!(f, "unknown command event: {}", event_type),
            Self::InvalidPayload { event_type, source } => {
                write!(f, "invalid payload for {}: {}", event_type, source)
            }
        }
    }
}

impl std::error::Error for CommandError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InvalidPayload { source, .. } => Some(source),
            Self::UnknownEvent { .. } => None,
        }
    }
}

/// A panel's inbound command set
pub trait PanelCommand: Sized + Send + std::fmt::Debug + 'static {
    /// Every event type this command set accepts
    const EVENT_TYPES: &'static [&'static str];

    fn parse(event_type: &str, payload: &Value) -> Result<Self, CommandError>;

    fn event_type(&self) -> &'static str;

    fn payload(&self) -> Value;

    fn from_event(event: &PanelEvent) -> Result<Self, CommandError> {
        Self::parse(&event.event_type, &event.payload)
    }

    fn to_event(&self, source: &str) -> PanelEvent {
        PanelEvent::new(self.event_type(), source, self.payload())
    }
}

/// Decode a command payload. A null payload decodes as an empty object so
/// commands whose fields are all optional accept a bare event.
pub fn decode<T: DeserializeOwned>(event_type: &str, payload: &Value) -> Result<T, CommandError> {
    let value = if payload.is_null() {
        Value::Object(Default::default())
    } else {
        payload.clone()
    };
    serde_json::from_value(value).map_err(|source| CommandError::InvalidPayload {
        event_type: event_type.to_string(),
        source,
    })
}

pub fn unknown(event_type: &str) -> CommandError {
    CommandError::UnknownEvent {
        event_type: event_type.to_string(),
    }
}

// ============================================================================
// Shared payload shapes
// ============================================================================

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterPayload {
    pub filter: String,
}

/// An entity reference: id, path, name, or `owner/repo`. Callers may send
/// several spellings at once; the first present in field order wins.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "IdentifierFields")]
pub struct IdentifierPayload {
    pub identifier: String,
}

#[derive(Deserialize)]
struct IdentifierFields {
    identifier: Option<String>,
    id: Option<String>,
    #[serde(rename = "fullName")]
    full_name_camel: Option<String>,
    full_name: Option<String>,
    path: Option<String>,
    name: Option<String>,
}

impl TryFrom<IdentifierFields> for IdentifierPayload {
    type Error = String;

    fn try_from(fields: IdentifierFields) -> Result<Self, Self::Error> {
        let identifier = first_present(
            "identifier",
            [
                fields.identifier,
                fields.id,
                fields.full_name_camel,
                fields.full_name,
                fields.path,
                fields.name,
            ],
        )?;
        Ok(Self { identifier })
    }
}

/// The first spelling of `field` a payload carries
pub fn first_present<const N: usize>(field: &str, spellings: [Option<String>; N]) -> Result<String, String> {
    spellings
        .into_iter()
        .flatten()
        .next()
        .ok_or_else(|| format!("missing field `{}`", field))
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatePayload {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_identifier_aliases() {
        for payload in [
            json!({ "identifier": "a/b" }),
            json!({ "name": "a/b" }),
            json!({ "path": "a/b" }),
            json!({ "fullName": "a/b" }),
        ] {
            let decoded: IdentifierPayload = decode("x:select", &payload).unwrap();
            assert_eq!(decoded.identifier, "a/b");
        }
    }

    #[test]
    fn test_identifier_takes_first_key_present() {
        let payload = json!({ "name": "api", "identifier": "/code/api", "path": "/code/api" });
        let decoded: IdentifierPayload = decode("x:select", &payload).unwrap();
        assert_eq!(decoded.identifier, "/code/api");

        let decoded: IdentifierPayload = decode("x:select", &json!({ "name": "api", "full_name": "acme/api" })).unwrap();
        assert_eq!(decoded.identifier, "acme/api");

        let err = decode::<IdentifierPayload>("x:select", &json!({ "filter": "api" })).unwrap_err();
        assert!(matches!(err, CommandError::InvalidPayload { .. }));
    }

    #[test]
    fn test_null_payload_decodes_as_empty_object() {
        #[derive(Deserialize)]
        struct Optional {
            #[serde(default)]
            path: Option<String>,
        }
        let decoded: Optional = decode("x:add", &Value::Null).unwrap();
        assert!(decoded.path.is_none());
    }

    #[test]
    fn test_invalid_payload_reports_event_type() {
        let err = decode::<FilterPayload>("x:filter", &json!({ "query": 1 })).unwrap_err();
        assert!(matches!(err, CommandError::InvalidPayload { .. }));
        assert!(err.to_string().starts_with("invalid payload for x:filter"));
    }
}
