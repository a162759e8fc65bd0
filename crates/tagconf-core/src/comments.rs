//! JSON comment stripping
//!
//! Blanks `// line` and `/* block */` comments with ASCII spaces so the result
//! can go straight to a JSON parser. Comment markers inside string literals are
//! data and left untouched. Output length always equals input length.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Normal,
    InString,
    LineComment,
    BlockComment,
}

/// Blank every comment in `data`, in place
///
/// Unterminated strings or block comments are not errors here; the state is
/// simply abandoned at end of input and the JSON decoder reports the problem.
pub fn strip_comments(data: &mut [u8]) {
    let len = data.len();
    let mut state = State::Normal;
    let mut i = 0;

    while i < len {
        let ch = data[i];

        match state {
            State::Normal => {
                if ch == b'"' {
                    state = State::InString;
                } else if ch == b'/' && i + 1 < len {
                    match data[i + 1] {
                        b'/' => state = State::LineComment,
                        b'*' => state = State::BlockComment,
                        _ => {}
                    }
                    if state != State::Normal {
                        data[i] = b' ';
                        data[i + 1] = b' ';
                        i += 1;
                    }
                }
            }
            State::InString => {
                if ch == b'\\' {
                    if i + 1 < len {
                        i += 1;
                    }
                } else if ch == b'"' {
                    state = State::Normal;
                }
            }
            State::LineComment => {
                if ch == b'\n' {
                    state = State::Normal;
                } else {
                    data[i] = b' ';
                }
            }
            State::BlockComment => {
                if ch == b'*' && i + 1 < len && data[i + 1] == b'/' {
                    data[i] = b' ';
                    data[i + 1] = b' ';
                    i += 1;
                    state = State::Normal;
                } else {
                    data[i] = b' ';
                }
            }
        }

        i += 1;
    }
}

/// Owned variant of [`strip_comments`]
pub fn strip_comments_owned(mut data: Vec<u8>) -> Vec<u8> {
    strip_comments(&mut data);
    data
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn strip(input: &str) -> String {
        String::from_utf8(strip_comments_owned(input.as_bytes().to_vec())).unwrap()
    }

    #[test]
    fn test_no_comments_unchanged() {
        let input = r#"{"a": 1, "b": [true, null]}"#;
        assert_eq!(strip(input), input);
    }

    #[test]
    fn test_line_comment() {
        assert_eq!(
            strip("{\"a\": 1} // trailing\n"),
            "{\"a\": 1}            \n"
        );
    }

    #[test]
    fn test_line_comment_keeps_newline() {
        let out = strip("// one\n// two\n{}");
        assert_eq!(out, "      \n      \n{}");
    }

    #[test]
    fn test_block_comment() {
        assert_eq!(strip("{/* x */\"a\":1}"), "{       \"a\":1}");
    }

    #[test]
    fn test_block_comment_multiline() {
        let out = strip("{\n/*\n * doc\n */\n}");
        assert_eq!(out, "{\n             \n}");
    }

    #[test]
    fn test_comment_markers_inside_string() {
        let input = r#"{"url": "http://host/*x*/", "c": "// not a comment"}"#;
        assert_eq!(strip(input), input);
    }

    #[test]
    fn test_escaped_quote_inside_string() {
        let input = r#"{"a": "say \"// hi\""} // gone"#;
        assert_eq!(strip(input), r#"{"a": "say \"// hi\""}        "#);
    }

    #[test]
    fn test_unterminated_block_comment() {
        let out = strip("{} /* open");
        assert_eq!(out, "{}        ");
    }

    #[test]
    fn test_unterminated_string() {
        let input = "{\"a\": \"open // still string";
        assert_eq!(strip(input), input);
    }

    #[test]
    fn test_lone_slash_at_end() {
        assert_eq!(strip("{}/"), "{}/");
    }

    #[test]
    fn test_length_preserved() {
        let inputs = [
            "",
            "/",
            "//",
            "/**/",
            "/* a */ // b\n\"c // d\" /* e",
            "{\"k\": \"\\\\\"} // end",
        ];
        for input in inputs {
            assert_eq!(strip(input).len(), input.len(), "input: {:?}", input);
        }
    }

    #[test]
    fn test_in_place() {
        let mut data = b"[1, /* two */ 3]".to_vec();
        strip_comments(&mut data);
        assert_eq!(&data, b"[1,           3]");
    }
}
