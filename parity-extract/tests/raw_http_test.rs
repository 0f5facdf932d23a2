use parity_extract::extract_raw_http;

#[test]
fn request_line_alone() {
    let request = extract_raw_http("GET /health HTTP/1.1").expect("request");
    assert_eq!(request.method, "GET");
    assert_eq!(request.path, "/health");
    assert!(request.headers.is_empty());
    assert_eq!(request.body, None);
}

#[test]
fn parses_headers_and_body() {
    let text = "\n\npost /orders?expand=items HTTP/1.1\r\nHost: shop.local\r\nContent-Type: application/json\r\nX-Trace: abc\r\nnot a header\r\n\r\n{\"id\": 7}\r\n\r\n";
    let request = extract_raw_http(text).expect("request");

    assert_eq!(request.method, "POST");
    assert_eq!(request.path, "/orders");
    assert_eq!(
        request.query.as_ref().expect("query").get("expand").map(String::as_str),
        Some("items")
    );
    assert_eq!(request.headers.len(), 2);
    assert_eq!(request.header("x-trace"), Some("abc"));
    assert!(!request.has_header("host"));
    assert_eq!(request.body.as_deref(), Some("{\"id\": 7}"));
}

#[test]
fn header_values_keep_colons() {
    let request =
        extract_raw_http("GET / HTTP/1.1\nReferer: http://a.example:8080/x\n").expect("request");
    assert_eq!(request.header("referer"), Some("http://a.example:8080/x"));
}

#[test]
fn rejects_text_without_request_line() {
    assert_eq!(extract_raw_http("hello world"), None);
    assert_eq!(extract_raw_http("FETCH /x HTTP/1.1"), None);
    assert_eq!(extract_raw_http(""), None);
}
