use crate::db::repository::format_timestamp;
use crate::models::ChecklistEntry;

pub const CSV_HEADER: [&str; 9] = [
    "id", "timestamp", "area", "shift", "stage", "item", "compliant", "remarks", "user",
];

/// Render entries as CSV (RFC 4180: CRLF line endings, quoted fields
/// where needed).
pub fn entries_to_csv(entries: &[ChecklistEntry]) -> String {
    let mut out = String::new();
    push_record(&mut out, CSV_HEADER.iter().copied());
    for e in entries {
        let id = e.id.to_string();
        let timestamp = format_timestamp(&e.recorded_at);
        let compliant = if e.compliant { "yes" } else { "no" };
        push_record(
            &mut out,
            [
                id.as_str(),
                timestamp.as_str(),
                e.area.as_str(),
                e.shift.as_str(),
                e.stage.as_str(),
                e.item.as_str(),
                compliant,
                e.remarks.as_deref().unwrap_or(""),
                e.submitted_by.as_str(),
            ],
        );
    }
    out
}

fn push_record<'a>(out: &mut String, fields: impl IntoIterator<Item = &'a str>) {
    for (i, field) in fields.into_iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&escape_field(field));
    }
    out.push_str("\r\n");
}

fn escape_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::*;
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    fn entry(remarks: Option<&str>) -> ChecklistEntry {
        ChecklistEntry {
            id: 7,
            submission_id: Uuid::nil(),
            recorded_at: Utc.with_ymd_and_hms(2025, 2, 3, 4, 5, 6).unwrap(),
            area: "ICU".into(),
            shift: Shift::Night,
            stage: Stage::Preparation,
            item: "labelled".into(),
            compliant: true,
            remarks: remarks.map(String::from),
            submitted_by: "nurse1".into(),
            metadata: None,
            ten_corrects: TenCorrects::default(),
        }
    }

    #[test]
    fn test_header_and_plain_row() {
        let csv = entries_to_csv(&[entry(None)]);
        let lines: Vec<_> = csv.split("\r\n").collect();
        assert_eq!(lines[0], "id,timestamp,area,shift,stage,item,compliant,remarks,user");
        assert_eq!(lines[1], "7,2025-02-03 04:05:06,ICU,night,preparation,labelled,yes,,nurse1");
    }

    #[test]
    fn test_quotes_fields_with_separators() {
        let csv = entries_to_csv(&[entry(Some("said \"ok\", then left"))]);
        assert!(csv.contains(",\"said \"\"ok\"\", then left\",nurse1"));
    }

    #[test]
    fn test_empty_export_is_header_only() {
        assert_eq!(entries_to_csv(&[]).lines().count(), 1);
    }
}
