mod classify;
mod client;
#[cfg(test)]
mod client_test;
mod error;
mod normalize;
mod request;
mod response;

pub use classify::{CANCELLED_MESSAGE, classify_error, classify_message};
pub use client::{CancelToken, Client, ClientConfig, DEFAULT_MAX_REDIRECTS};
pub use error::RequestError;
pub use normalize::{
    MAX_BODY_BYTES, TRUNCATION_MARKER, normalize_body, normalize_headers, normalize_response,
};
pub use request::{Request, RequestBuilder, RequestMethod};
pub use response::Response;
