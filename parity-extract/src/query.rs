use std::collections::BTreeMap;

use parity_codec::url_decode_str;

/// Parses `a=1&b&c=x%20y` into a map. A leading `?` is ignored, tokens
/// without `=` map to an empty value and later keys overwrite earlier ones.
pub fn parse_query_string(search: &str) -> BTreeMap<String, String> {
    let mut result = BTreeMap::new();
    let qs = search.strip_prefix('?').unwrap_or(search);
    for part in qs.split('&').filter(|part| !part.is_empty()) {
        match part.split_once('=') {
            Some((key, value)) => {
                result.insert(url_decode_str(key), url_decode_str(value));
            }
            None => {
                result.insert(url_decode_str(part), String::new());
            }
        }
    }
    result
}

/// Splits a request target at the first `?`.
pub fn split_path_query(target: &str) -> (String, BTreeMap<String, String>) {
    match target.split_once('?') {
        Some((path, query)) => (path.to_string(), parse_query_string(query)),
        None => (target.to_string(), BTreeMap::new()),
    }
}
