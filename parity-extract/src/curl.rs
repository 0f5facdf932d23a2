use std::sync::LazyLock;

use parity_codec::base64_encode_str;
use parity_core::CanonicalRequest;
use regex::Regex;
use url::Url;

use crate::query::parse_query_string;

static LINE_CONTINUATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\\n[ \t]*").expect("valid continuation regex"));

static CURL_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*curl\s+").expect("valid curl regex"));

/// Flags whose argument is consumed and ignored.
const SKIPPED_WITH_VALUE: &[&str] = &[
    "-o",
    "--output",
    "--max-time",
    "--connect-timeout",
    "--proxy",
    "-x",
    "--cert",
    "--key",
    "--cacert",
    "--user-agent",
    "-A",
    "--referer",
    "-e",
    "-b",
    "--cookie",
    "--cookie-jar",
    "-c",
    "--max-redirs",
    "--retry",
];

pub(crate) fn fold_continuations(text: &str) -> String {
    let normalized = text.replace("\r\n", "\n");
    LINE_CONTINUATION
        .replace_all(&normalized, " ")
        .trim()
        .to_string()
}

pub(crate) fn looks_like_curl(text: &str) -> bool {
    CURL_PREFIX.is_match(&fold_continuations(text))
}

pub fn extract_curl(text: &str) -> Option<CanonicalRequest> {
    let command = fold_continuations(text);
    if !CURL_PREFIX.is_match(&command) {
        return None;
    }
    let tokens = tokenize(&command);

    let mut method: Option<String> = None;
    let mut url: Option<String> = None;
    let mut body: Option<String> = None;
    let mut headers: Vec<(String, String)> = Vec::new();
    let mut json_mode = false;

    let mut index = 1;
    while index < tokens.len() {
        let token = tokens[index].as_str();
        let value = tokens.get(index + 1).cloned();
        let mut consumed = 1;

        match token {
            "-X" | "--request" => {
                method = value.map(|value| value.to_ascii_uppercase());
                consumed = 2;
            }
            "-H" | "--header" => {
                if let Some((name, value)) = value.as_deref().and_then(|raw| raw.split_once(':')) {
                    headers.push((name.to_string(), value.trim().to_string()));
                }
                consumed = 2;
            }
            "-d" | "--data" | "--data-raw" | "--data-binary" | "--data-ascii" => {
                body = value;
                consumed = 2;
            }
            "--json" => {
                body = value;
                json_mode = true;
                consumed = 2;
            }
            "-F" | "--form" => consumed = 2,
            "-u" | "--user" => {
                if let Some(credentials) = value {
                    headers.push((
                        "authorization".to_string(),
                        format!("Basic {}", base64_encode_str(&credentials)),
                    ));
                }
                consumed = 2;
            }
            "--url" => {
                url = value;
                consumed = 2;
            }
            flag if SKIPPED_WITH_VALUE.contains(&flag) => consumed = 2,
            flag if flag.starts_with('-') => {}
            positional => {
                if url.is_none() {
                    url = Some(positional.to_string());
                }
            }
        }
        index += consumed;
    }

    let url = parse_url(url?.trim())?;
    let method = match (method, &body) {
        (Some(method), _) => method,
        (None, Some(_)) => "POST".to_string(),
        (None, None) => "GET".to_string(),
    };

    let mut request = CanonicalRequest::new(&method, url.path());
    if json_mode {
        request.set_header("content-type", "application/json");
        request.set_header("accept", "application/json");
    }
    for (name, value) in headers {
        request.set_header(&name, value);
    }
    if let Some(body) = body.as_deref() {
        let trimmed = body.trim_start();
        if !request.has_header("content-type") && (trimmed.starts_with('{') || trimmed.starts_with('[')) {
            request.set_header("content-type", "application/json");
        }
    }

    let query = url.query().map(parse_query_string).unwrap_or_default();
    Some(request.with_query(query).with_body(body))
}

fn parse_url(raw: &str) -> Option<Url> {
    let is_http = |url: &Url| matches!(url.scheme(), "http" | "https") && url.has_host();
    match Url::parse(raw) {
        Ok(url) if is_http(&url) => Some(url),
        _ => Url::parse(&format!("http://{raw}"))
            .ok()
            .filter(|url| is_http(url)),
    }
}

/// Splits a shell command line into words. Single quotes are literal; inside
/// double quotes a backslash only escapes `"`, `\`, `$`, `` ` `` and newline.
pub(crate) fn tokenize(command: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut chars = command.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '\'' => {
                in_word = true;
                for quoted in chars.by_ref() {
                    if quoted == '\'' {
                        break;
                    }
                    current.push(quoted);
                }
            }
            '"' => {
                in_word = true;
                while let Some(quoted) = chars.next() {
                    match quoted {
                        '"' => break,
                        '\\' => match chars.peek() {
                            Some(&next @ ('"' | '\\' | '$' | '`')) => {
                                current.push(next);
                                chars.next();
                            }
                            Some('\n') => {
                                chars.next();
                            }
                            _ => current.push('\\'),
                        },
                        other => current.push(other),
                    }
                }
            }
            ' ' | '\t' | '\n' | '\r' => {
                if in_word {
                    tokens.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            other => {
                in_word = true;
                current.push(other);
            }
        }
    }
    if in_word {
        tokens.push(current);
    }
    tokens
}
