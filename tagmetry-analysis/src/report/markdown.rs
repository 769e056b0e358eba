//! Markdown rendering of the metrics report

use crate::models::MetricsReport;

/// Render the human-facing metrics summary: M1-M6 as a table, M7-M11 as
/// lists.
pub fn render_metrics_markdown(report: &MetricsReport) -> String {
    let mut md = String::new();

    md.push_str("# Tag Health Metrics Summary\n\n");
    md.push_str(&format!(
        "Generated at {}.\n\n",
        tagmetry_common::time::to_iso8601(&report.generated_at_utc)
    ));
    md.push_str(&format!(
        "Samples: {} | Tokens: {} | Unique tags: {}\n\n",
        report.sample_count, report.token_count, report.unique_tag_count
    ));

    md.push_str("| Metric | Value |\n");
    md.push_str("|---|---|\n");
    md.push_str(&format!("| M1 Entropy | {:.6} |\n", report.entropy));
    md.push_str(&format!(
        "| M2 Effective tag count | {:.6} |\n",
        report.effective_tag_count
    ));
    md.push_str(&format!("| M3 Gini | {:.6} |\n", report.gini));
    md.push_str(&format!("| M4 HHI | {:.6} |\n", report.hhi));
    let top_k = report
        .top_k_mass
        .iter()
        .map(|(k, mass)| format!("k={}: {:.6}", k, mass))
        .collect::<Vec<_>>()
        .join(", ");
    md.push_str(&format!(
        "| M5 Top-K mass | {} |\n",
        if top_k.is_empty() {
            "n/a".to_string()
        } else {
            top_k
        }
    ));
    md.push_str(&format!(
        "| M6 JSD to target | {} |\n\n",
        report
            .jsd_to_target
            .map(|v| format!("{:.6}", v))
            .unwrap_or_else(|| "n/a".to_string())
    ));

    md.push_str("## M7 Stop-tag candidates\n\n");
    if report.stop_tag_candidates.is_empty() {
        md.push_str("- none\n");
    } else {
        for candidate in &report.stop_tag_candidates {
            md.push_str(&format!(
                "- `{}` (df={}, idf={:.4})\n",
                candidate.tag, candidate.document_frequency, candidate.idf
            ));
        }
    }
    md.push('\n');

    md.push_str("## M8 PMI anomalies\n\n");
    if report.pmi_anomalies.is_empty() {
        md.push_str("- none\n");
    } else {
        for anomaly in &report.pmi_anomalies {
            md.push_str(&format!(
                "- `{}` + `{}` (count={}, pmi={:.4})\n",
                anomaly.left, anomaly.right, anomaly.cooccurrence, anomaly.pmi
            ));
        }
    }
    md.push('\n');

    md.push_str("## M9 Community hint\n\n");
    md.push_str(&format!(
        "- communities: {}, modularity hint: {:.4}\n",
        report.community_hint.community_count, report.community_hint.modularity_hint
    ));
    for preview in &report.community_hint.previews {
        md.push_str(&format!("- [{}]\n", preview.join(", ")));
    }
    md.push('\n');

    md.push_str("## M10 Near-duplicate rate\n\n");
    match report.near_duplicate_rate_hook.rate {
        Some(rate) => md.push_str(&format!("- rate: {:.6}\n", rate)),
        None => md.push_str("- rate: n/a\n"),
    }
    md.push_str(&format!(
        "- note: {}\n\n",
        report.near_duplicate_rate_hook.note
    ));

    md.push_str("## M11 Token-length overflow rate\n\n");
    md.push_str(&format!(
        "- rate: {:.6}\n",
        report.token_length_overflow_rate
    ));

    md
}
