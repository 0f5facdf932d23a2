use serde::{Deserialize, Serialize};

use crate::{CanonicalRequest, CanonicalResult, Phase, ProtocolError, ReplayOptions, Target};

/// Session id carried by errors that concern the execution unit itself rather
/// than one session.
pub const GLOBAL_SESSION_ID: &str = "__global__";

/// Messages exchanged between the controller and the execution unit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum WorkerMessage {
    #[serde(rename_all = "camelCase")]
    Execute {
        session_id: String,
        request: CanonicalRequest,
        targets: Vec<Target>,
        options: ReplayOptions,
    },
    #[serde(rename_all = "camelCase")]
    Cancel { session_id: String },
    #[serde(rename_all = "camelCase")]
    Result {
        session_id: String,
        result: CanonicalResult,
    },
    #[serde(rename_all = "camelCase")]
    Progress {
        session_id: String,
        target: String,
        phase: Phase,
    },
    #[serde(rename_all = "camelCase")]
    Error { session_id: String, message: String },
}

impl WorkerMessage {
    pub fn session_id(&self) -> &str {
        match self {
            Self::Execute { session_id, .. }
            | Self::Cancel { session_id }
            | Self::Result { session_id, .. }
            | Self::Progress { session_id, .. }
            | Self::Error { session_id, .. } => session_id,
        }
    }

    pub fn global_error(message: impl Into<String>) -> Self {
        Self::Error {
            session_id: GLOBAL_SESSION_ID.to_string(),
            message: message.into(),
        }
    }

    pub fn is_global_error(&self) -> bool {
        matches!(self, Self::Error { session_id, .. } if session_id == GLOBAL_SESSION_ID)
    }
}

/// Encodes one message as a single JSON line, without the trailing newline.
pub fn encode_line(message: &WorkerMessage) -> Result<String, ProtocolError> {
    serde_json::to_string(message).map_err(|err| ProtocolError::Encode(err.to_string()))
}

pub fn decode_line(line: &str) -> Result<WorkerMessage, ProtocolError> {
    serde_json::from_str(line.trim()).map_err(|err| ProtocolError::Malformed(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_are_tagged_by_type() {
        let message = WorkerMessage::Progress {
            session_id: "s1".to_string(),
            target: "http://localhost:8080".to_string(),
            phase: Phase::Sending,
        };
        let line = encode_line(&message).unwrap();
        assert_eq!(
            line,
            r#"{"type":"progress","sessionId":"s1","target":"http://localhost:8080","phase":"sending"}"#
        );
        assert_eq!(decode_line(&line).unwrap(), message);
    }

    #[test]
    fn cancel_decodes_from_wire_form() {
        let message = decode_line(r#"{"type":"cancel","sessionId":"abc"}"#).unwrap();
        assert_eq!(
            message,
            WorkerMessage::Cancel {
                session_id: "abc".to_string()
            }
        );
    }

    #[test]
    fn execute_accepts_partial_options() {
        let line = r#"{"type":"execute","sessionId":"s","request":{"method":"GET","path":"/"},"targets":[{"name":"a","baseUrl":"http://a"}],"options":{"timeoutMs":10}}"#;
        let WorkerMessage::Execute { options, request, .. } = decode_line(line).unwrap() else {
            panic!("expected execute");
        };
        assert_eq!(options.timeout_ms, 10);
        assert_eq!(options.concurrency_limit, 5);
        assert!(request.headers.is_empty());
    }

    #[test]
    fn unknown_type_is_malformed() {
        let err = decode_line(r#"{"type":"restart","sessionId":"s"}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::Malformed(_)));
    }

    #[test]
    fn global_errors_are_recognized() {
        assert!(WorkerMessage::global_error("boom").is_global_error());
        let scoped = WorkerMessage::Error {
            session_id: "s".to_string(),
            message: "boom".to_string(),
        };
        assert!(!scoped.is_global_error());
    }
}
