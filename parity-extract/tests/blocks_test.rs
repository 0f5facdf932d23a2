use parity_extract::{extract_first_block, parse_all_blocks};

const FILE: &str = "# shared notes\n### Create user\n# a comment\nPOST /users\nContent-Type: application/json\n# inline comment\n\n{\"name\":\"a\"}\n\n###\nGET /users/1\n### Broken\nnot a request\n";

#[test]
fn parses_every_block_with_line_ranges() {
    let blocks = parse_all_blocks(FILE);
    assert_eq!(blocks.len(), 2);

    assert_eq!(blocks[0].name, "Create user");
    assert_eq!(blocks[0].start_line, 1);
    assert_eq!(blocks[0].end_line, 8);
    assert_eq!(blocks[0].request.method, "POST");
    assert_eq!(blocks[0].request.headers.len(), 1);
    assert_eq!(blocks[0].request.body.as_deref(), Some("{\"name\":\"a\"}"));

    assert_eq!(blocks[1].name, "Request 2");
    assert_eq!(blocks[1].start_line, 9);
    assert_eq!(blocks[1].end_line, 10);
    assert_eq!(blocks[1].request.path, "/users/1");
}

#[test]
fn first_block_is_extracted() {
    let request = extract_first_block(FILE).expect("request");
    assert_eq!(request.method, "POST");
    assert_eq!(request.path, "/users");
}

#[test]
fn file_without_separator_is_one_block() {
    let blocks = parse_all_blocks("# note\nDELETE /items/3 HTTP/1.1\nAuthorization: Bearer t\n");
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0].name, "Request");
    assert_eq!(blocks[0].start_line, 0);
    assert_eq!(blocks[0].end_line, 3);
    assert_eq!(blocks[0].request.header("authorization"), Some("Bearer t"));
}

#[test]
fn request_before_first_separator_is_kept() {
    let text = "GET /health\nAccept: text/plain\n\n### Create\nPOST /users\n";
    let blocks = parse_all_blocks(text);
    assert_eq!(blocks.len(), 2);

    assert_eq!(blocks[0].name, "Request");
    assert_eq!(blocks[0].start_line, 0);
    assert_eq!(blocks[0].end_line, 2);
    assert_eq!(blocks[0].request.path, "/health");
    assert_eq!(blocks[1].name, "Create");
    assert_eq!(blocks[1].start_line, 3);

    let first = extract_first_block(text).expect("request");
    assert_eq!(first.method, "GET");
    assert_eq!(first.path, "/health");
}
