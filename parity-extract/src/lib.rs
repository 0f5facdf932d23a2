mod blocks;
mod curl;
mod detect;
mod har;
mod log;
mod query;
mod raw_http;

pub use blocks::{RequestBlock, extract_first_block, parse_all_blocks};
pub use curl::extract_curl;
pub use detect::{Extraction, SourceFormat, UNDETECTED_REASON, detect_format, extract_request};
pub use har::{HarEntry, extract_har_entry, parse_har};
pub use log::extract_log;
pub use query::{parse_query_string, split_path_query};
pub use raw_http::extract_raw_http;
