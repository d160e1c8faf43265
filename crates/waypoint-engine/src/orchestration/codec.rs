//! Field codec for node payloads
//!
//! Fields are joined with `|`. A literal `|` or `\` inside a field is written
//! with a leading `\`.

const SEPARATOR: char = '|';
const ESCAPE: char = '\\';

/// Join fields into a single escaped payload string
pub fn encode_fields(fields: &[&str]) -> String {
    let mut out = String::with_capacity(fields.iter().map(|f| f.len() + 1).sum());
    for (index, field) in fields.iter().enumerate() {
        if index > 0 {
            out.push(SEPARATOR);
        }
        for ch in field.chars() {
            if ch == SEPARATOR || ch == ESCAPE {
                out.push(ESCAPE);
            }
            out.push(ch);
        }
    }
    out
}

/// Split a payload string produced by [`encode_fields`]
///
/// A dangling escape at the end of the input is kept as a literal `\`.
pub fn decode_fields(data: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut escaped = false;

    for ch in data.chars() {
        if escaped {
            current.push(ch);
            escaped = false;
        } else if ch == ESCAPE {
            escaped = true;
        } else if ch == SEPARATOR {
            fields.push(std::mem::take(&mut current));
        } else {
            current.push(ch);
        }
    }

    if escaped {
        current.push(ESCAPE);
    }
    fields.push(current);
    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_escapes_separators() {
        assert_eq!(encode_fields(&["a|b", "c\\d"]), "a\\|b|c\\\\d");
        assert_eq!(encode_fields(&[]), "");
    }

    #[test]
    fn test_decode_reverses_encode() {
        let fields = ["", "|", "\\", "x\\|y", "plain"];
        let decoded = decode_fields(&encode_fields(&fields));
        assert_eq!(decoded, fields);
    }

    #[test]
    fn test_decode_empty_fields() {
        assert_eq!(decode_fields(""), vec![String::new()]);
        assert_eq!(decode_fields("a||b"), vec!["a", "", "b"]);
    }

    #[test]
    fn test_decode_dangling_escape() {
        assert_eq!(decode_fields("abc\\"), vec!["abc\\"]);
    }
}
