use parity_extract::{extract_har_entry, parse_har};

const ARCHIVE: &str = r#"{
  "log": {
    "entries": [
      {
        "request": {
          "method": "POST",
          "url": "https://api.example.com/v2/login?next=%2Fhome",
          "headers": [
            {"name": ":authority", "value": "api.example.com"},
            {"name": "Host", "value": "api.example.com"},
            {"name": "Content-Length", "value": "27"},
            {"name": "X-Client", "value": "web"}
          ],
          "queryString": [],
          "postData": {"mimeType": "application/json", "text": "{\"user\":\"a\",\"pw\":\"b\"}"}
        }
      },
      {"request": {"url": "https://api.example.com/no-method"}},
      {
        "request": {
          "method": "PUT",
          "url": "https://api.example.com/form",
          "headers": [],
          "queryString": [{"name": "v", "value": "2"}],
          "postData": {"mimeType": "application/x-www-form-urlencoded", "params": [{"name": "a b", "value": "c&d"}]}
        }
      }
    ]
  }
}"#;

#[test]
fn lists_entries_with_method_and_url() {
    let entries = parse_har(ARCHIVE);
    assert_eq!(entries.len(), 2);

    let login = &entries[0];
    assert_eq!(login.index, 0);
    assert_eq!(login.summary, "POST /v2/login?next=%2Fhome");
    assert_eq!(login.request.path, "/v2/login");
    assert_eq!(
        login.request.query.as_ref().and_then(|q| q.get("next")).map(String::as_str),
        Some("/home")
    );
    assert_eq!(login.request.headers.len(), 2);
    assert_eq!(login.request.header("x-client"), Some("web"));
    assert_eq!(login.request.header("content-type"), Some("application/json"));

    let form = &entries[1];
    assert_eq!(form.index, 2);
    assert_eq!(form.request.body.as_deref(), Some("a%20b=c%26d"));
    assert_eq!(
        form.request.query.as_ref().and_then(|q| q.get("v")).map(String::as_str),
        Some("2")
    );
}

#[test]
fn extracts_entry_by_archive_index() {
    let request = extract_har_entry(ARCHIVE, 2).expect("request");
    assert_eq!(request.method, "PUT");
    assert_eq!(extract_har_entry(ARCHIVE, 1), None);
}

#[test]
fn invalid_documents_have_no_entries() {
    assert!(parse_har("not json").is_empty());
    assert!(parse_har("{\"log\": {}}").is_empty());
}
