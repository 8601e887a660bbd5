use serde_json::Value;

use crate::error::{ReportError, Result};

/// Flattens the raw fetched rows into CSV: one header row from the first
/// row's keys in the order they serialized (serde_json's `preserve_order`
/// keeps the models' declared field order), then one record per row with
/// nested values serialized inline. Quoting and escaping are the csv
/// crate's standard behavior.
pub fn render(rows: &[Value]) -> Result<Vec<u8>> {
    let mut writer = ::csv::Writer::from_writer(Vec::new());

    let Some(first) = rows.first() else {
        // An explicitly labeled empty export beats a zero-byte file.
        writer
            .write_record(["no_data"])
            .map_err(generation)?;
        writer
            .write_record(["No data found"])
            .map_err(generation)?;
        return finish(writer);
    };

    let header = keys_of(first)?;
    writer.write_record(&header).map_err(generation)?;

    for row in rows {
        let Value::Object(map) = row else {
            return Err(ReportError::Validation(
                "CSV export expects an array of objects".to_string(),
            ));
        };
        let record: Vec<String> = header
            .iter()
            .map(|key| flatten(map.get(key.as_str())))
            .collect();
        writer.write_record(&record).map_err(generation)?;
    }
    finish(writer)
}

fn keys_of(row: &Value) -> Result<Vec<String>> {
    match row {
        Value::Object(map) => Ok(map.keys().cloned().collect()),
        _ => Err(ReportError::Validation(
            "CSV export expects an array of objects".to_string(),
        )),
    }
}

fn flatten(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
    }
}

fn finish(writer: ::csv::Writer<Vec<u8>>) -> Result<Vec<u8>> {
    writer
        .into_inner()
        .map_err(|err| ReportError::Generation(err.to_string()))
}

fn generation(err: ::csv::Error) -> ReportError {
    ReportError::Generation(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn header_comes_from_the_first_row() {
        let rows = vec![
            json!({"building": "North Annex", "count": 3}),
            json!({"building": "South Hall", "count": 1}),
        ];
        let text = String::from_utf8(render(&rows).unwrap()).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("building,count"));
        assert_eq!(lines.next(), Some("North Annex,3"));
        assert_eq!(lines.next(), Some("South Hall,1"));
    }

    #[test]
    fn columns_keep_the_declared_field_order() {
        #[derive(serde::Serialize)]
        struct Row {
            key_code: String,
            assignee: Option<String>,
            building: String,
        }
        let rows = vec![serde_json::to_value(Row {
            key_code: "K-104".to_string(),
            assignee: None,
            building: "North Annex".to_string(),
        })
        .unwrap()];
        let text = String::from_utf8(render(&rows).unwrap()).unwrap();
        assert_eq!(text.lines().next(), Some("key_code,assignee,building"));
    }

    #[test]
    fn fields_with_commas_and_quotes_are_escaped() {
        let rows = vec![json!({"note": "replace \"flickering\" tube, bay 4"})];
        let text = String::from_utf8(render(&rows).unwrap()).unwrap();
        assert!(text.contains("\"replace \"\"flickering\"\" tube, bay 4\""));
    }

    #[test]
    fn nulls_render_as_empty_fields() {
        let rows = vec![json!({"assignee": null, "key_code": "K-104"})];
        let text = String::from_utf8(render(&rows).unwrap()).unwrap();
        assert!(text.lines().any(|line| line == ",K-104"));
    }

    #[test]
    fn zero_rows_produce_a_labeled_export() {
        let text = String::from_utf8(render(&[]).unwrap()).unwrap();
        assert!(text.contains("No data found"));
    }

    #[test]
    fn non_object_rows_fail_validation() {
        let err = render(&[json!([1, 2, 3])]).unwrap_err();
        assert_eq!(err.category(), "validation");
    }
}
