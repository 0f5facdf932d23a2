use parity_extract::extract_curl;

#[test]
fn extracts_post_with_json_body() {
    let command = r#"curl -X POST http://localhost:8080/api/users -H "Content-Type: application/json" -d '{"name":"hari"}'"#;
    let request = extract_curl(command).expect("request");

    assert_eq!(request.method, "POST");
    assert_eq!(request.path, "/api/users");
    assert_eq!(request.header("content-type"), Some("application/json"));
    assert_eq!(request.body.as_deref(), Some(r#"{"name":"hari"}"#));
    assert_eq!(request.query, None);
}

#[test]
fn folds_line_continuations_and_splits_query() {
    let command = "curl 'https://api.example.com/search?q=rust%20lang&page=2' \\\n  -H 'Accept: text/html' \\\n  -H 'Host: other.example.com'";
    let request = extract_curl(command).expect("request");

    assert_eq!(request.method, "GET");
    assert_eq!(request.path, "/search");
    let query = request.query.as_ref().expect("query");
    assert_eq!(query.get("q").map(String::as_str), Some("rust lang"));
    assert_eq!(query.get("page").map(String::as_str), Some("2"));
    assert_eq!(request.header("accept"), Some("text/html"));
    assert!(!request.has_header("host"));
}

#[test]
fn body_without_method_defaults_to_post_and_infers_json() {
    let request = extract_curl("curl localhost:3000/items --data '[1,2]'").expect("request");
    assert_eq!(request.method, "POST");
    assert_eq!(request.path, "/items");
    assert_eq!(request.header("content-type"), Some("application/json"));
}

#[test]
fn json_flag_sets_defaults_and_user_flag_sets_basic_auth() {
    let command = r#"curl --json '{"a":1}' -u user:pass -H "Accept: text/plain" --url http://h/x"#;
    let request = extract_curl(command).expect("request");

    assert_eq!(request.method, "POST");
    assert_eq!(request.header("content-type"), Some("application/json"));
    assert_eq!(request.header("accept"), Some("text/plain"));
    assert_eq!(request.header("authorization"), Some("Basic dXNlcjpwYXNz"));
}

#[test]
fn skips_value_flags_and_form_arguments() {
    let command = "curl -s -o out.txt --max-time 5 -A agent -F file=@a.txt -X PUT http://h/upload";
    let request = extract_curl(command).expect("request");
    assert_eq!(request.method, "PUT");
    assert_eq!(request.path, "/upload");
    assert_eq!(request.body, None);
    assert!(request.headers.is_empty());
}

#[test]
fn double_quote_escapes_are_honored() {
    let command = r#"curl -d "{\"msg\":\"a \$b\"}" http://h/"#;
    let request = extract_curl(command).expect("request");
    assert_eq!(request.body.as_deref(), Some(r#"{"msg":"a $b"}"#));
}

#[test]
fn missing_url_yields_nothing() {
    assert_eq!(extract_curl("curl -X GET"), None);
    assert_eq!(extract_curl("wget http://h/"), None);
}
