//! Text projections of the recorder buffers.

use chrono::SecondsFormat;

use crate::job::OutcomeRecord;

/// Fixed header of the tracking log.
pub const TRACKING_HEADER: &str = "item_id,job_handle,source,target,state,timestamp";

/// Quotes a CSV field when it contains a delimiter, quote or line break.
pub fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// One line per event, newline-terminated.
pub fn event_log_text(lines: &[String]) -> String {
    let mut out = String::with_capacity(lines.iter().map(|l| l.len() + 1).sum());
    for line in lines {
        out.push_str(line);
        out.push('\n');
    }
    out
}

/// One CSV row per record (no header), newline-terminated.
pub fn tracking_csv_text(records: &[OutcomeRecord]) -> String {
    let mut out = String::new();
    for r in records {
        let row = [
            r.item_id.to_string(),
            csv_field(r.handle_str()),
            csv_field(&r.source.to_string()),
            csv_field(&r.target.to_string()),
            r.state.as_str().to_string(),
            r.finished_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        ];
        out.push_str(&row.join(","));
        out.push('\n');
    }
    out
}
