mod diff;
mod dispatch;
mod error;
mod model;

pub use diff::{
    diff_bodies, diff_headers, diff_json_values, diff_results, diff_text, render_text_diff,
    summarize,
};
pub use dispatch::{DispatchStream, build_path_with_query, dispatch, merge_headers};
pub use error::ReplayError;
pub use model::{
    BodyDiff, DiffKind, DiffNode, DiffOptions, DiffResult, DiffSummary, DispatchEvent, StatusDiff,
};
