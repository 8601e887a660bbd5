use serde_json::Value;

use crate::error::Result;

/// Direct serialization of the raw fetched rows: a pretty-printed JSON
/// array, matching what the rows looked like coming off the wire.
pub fn render(rows: &[Value]) -> Result<Vec<u8>> {
    let mut bytes = serde_json::to_vec_pretty(rows)?;
    bytes.push(b'\n');
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn renders_a_pretty_array() {
        let rows = vec![json!({"id": 7, "status": "open"})];
        let bytes = render(&rows).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.starts_with('['));
        assert!(text.contains("\"status\": \"open\""));
        assert!(text.ends_with("]\n"));
    }

    #[test]
    fn zero_rows_render_an_empty_array_not_an_error() {
        let bytes = render(&[]).unwrap();
        assert_eq!(bytes, b"[]\n");
    }
}
