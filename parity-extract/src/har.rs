use parity_codec::url_encode_component;
use parity_core::CanonicalRequest;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::query::{parse_query_string, split_path_query};

/// A request recovered from an HTTP Archive. `index` is the position of the
/// entry in the archive, so it stays stable when other entries are skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HarEntry {
    pub index: usize,
    pub method: String,
    pub url: String,
    pub path: String,
    pub summary: String,
    pub request: CanonicalRequest,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct HarDocument {
    log: HarLog,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct HarLog {
    entries: Vec<HarRawEntry>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct HarRawEntry {
    request: Option<HarRequest>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct HarRequest {
    method: Option<String>,
    url: Option<String>,
    headers: Vec<NameValue>,
    query_string: Vec<NameValue>,
    post_data: Option<PostData>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct NameValue {
    name: String,
    value: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct PostData {
    mime_type: Option<String>,
    text: Option<String>,
    params: Vec<NameValue>,
}

/// Lists every archive entry that has both a method and a URL. Content that
/// is not a HAR document yields an empty list.
pub fn parse_har(content: &str) -> Vec<HarEntry> {
    let Ok(document) = serde_json::from_str::<HarDocument>(content) else {
        return Vec::new();
    };
    document
        .log
        .entries
        .into_iter()
        .enumerate()
        .filter_map(|(index, entry)| convert_entry(index, entry.request?))
        .collect()
}

pub fn extract_har_entry(content: &str, index: usize) -> Option<CanonicalRequest> {
    parse_har(content)
        .into_iter()
        .find(|entry| entry.index == index)
        .map(|entry| entry.request)
}

fn convert_entry(index: usize, raw: HarRequest) -> Option<HarEntry> {
    let method = raw.method.filter(|method| !method.trim().is_empty())?;
    let url = raw.url.filter(|url| !url.trim().is_empty())?;

    let (path, url_query) = match Url::parse(&url) {
        Ok(parsed) => (
            parsed.path().to_string(),
            parsed.query().map(parse_query_string).unwrap_or_default(),
        ),
        Err(_) => split_path_query(&url),
    };
    let display_path = match url.split_once('?') {
        Some((_, search)) if !search.is_empty() => format!("{path}?{search}"),
        _ => path.clone(),
    };

    let query = if raw.query_string.is_empty() {
        url_query
    } else {
        raw.query_string
            .into_iter()
            .map(|pair| (pair.name, pair.value))
            .collect()
    };

    let mut request = CanonicalRequest::new(&method, path).with_query(query);
    for header in raw.headers {
        let name = header.name.trim();
        if name.starts_with(':') || name.eq_ignore_ascii_case("content-length") {
            continue;
        }
        request.set_header(name, header.value);
    }

    let mut body = None;
    if let Some(post_data) = raw.post_data {
        body = match post_data.text.filter(|text| !text.is_empty()) {
            Some(text) => Some(text),
            None if !post_data.params.is_empty() => Some(
                post_data
                    .params
                    .iter()
                    .map(|param| {
                        format!(
                            "{}={}",
                            url_encode_component(&param.name),
                            url_encode_component(&param.value)
                        )
                    })
                    .collect::<Vec<_>>()
                    .join("&"),
            ),
            None => None,
        };
        if !request.has_header("content-type") {
            if let Some(mime_type) = post_data.mime_type.filter(|mime| !mime.is_empty()) {
                request.set_header("content-type", mime_type);
            }
        }
    }

    let request = request.with_body(body);
    let method = request.method.clone();
    Some(HarEntry {
        index,
        summary: format!("{method} {display_path}"),
        method,
        url,
        path: display_path,
        request,
    })
}
