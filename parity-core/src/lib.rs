mod error;
mod model;
mod protocol;
mod session;

pub use error::{ModelError, ProtocolError};
pub use model::{
    CanonicalRequest, CanonicalResult, DEFAULT_IGNORE_PATHS, FailureKind, Phase, ReplayOptions,
    ResultError, Target, normalize_header_name,
};
pub use protocol::{GLOBAL_SESSION_ID, WorkerMessage, decode_line, encode_line};
pub use session::{ExecutionSession, RecordOutcome, SessionSummary};
