//! Flat CSV projection of `AnalysisRecord` for the whole-history CSV export
//! (§4.G, §6 `/analysis/history/download/csv`).

use crate::types::AnalysisRecord;

fn escape(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

pub fn to_csv(records: &[AnalysisRecord]) -> String {
    let mut out = String::from("record_id,created_at,event_id,prompt_summary,ok_count,error_count,fastest_provider\n");
    for r in records {
        out.push_str(&format!(
            "{},{},{},{},{},{},{}\n",
            r.record_id,
            r.created_at.to_rfc3339(),
            r.event_id,
            escape(&r.prompt_summary),
            r.performance_summary.ok_count,
            r.performance_summary.error_count,
            r.performance_summary
                .fastest_provider
                .as_deref()
                .unwrap_or(""),
        ));
    }
    out
}
