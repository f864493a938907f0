//! Plain-text rendering of a feasibility report, shared by the console
//! summary and the exported report file.

use std::fmt::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use sheetscout_engine::{Component, FeasibilityReport, Finding};

const RULE: usize = 80;
const SECTION: usize = 40;

fn heading(out: &mut String, title: &str) -> fmt::Result {
    writeln!(out)?;
    writeln!(out, "{title}")?;
    writeln!(out, "{}", "-".repeat(SECTION))
}

fn finding_line(out: &mut String, finding: &Finding) -> fmt::Result {
    match finding.delta {
        Some(delta) => writeln!(out, "  - {} ({delta:+.1})", finding.message),
        None => writeln!(out, "  - {}", finding.message),
    }
}

/// Render `report` for `source`. `generated` adds a timestamp line, which
/// the exported file carries and the console summary omits.
pub fn render_report(
    report: &FeasibilityReport,
    source: &Path,
    generated: Option<DateTime<Local>>,
) -> Result<String, fmt::Error> {
    let mut out = String::new();
    writeln!(out, "{}", "=".repeat(RULE))?;
    writeln!(out, "EXCEL AUTOMATION FEASIBILITY REPORT")?;
    writeln!(out, "{}", "=".repeat(RULE))?;
    writeln!(out, "File: {}", source.display())?;
    if let Some(at) = generated {
        writeln!(out, "Generated: {}", at.format("%Y-%m-%d %H:%M:%S"))?;
    }
    writeln!(out, "Overall score: {:.1}/100", report.composite())?;
    writeln!(out, "Feasibility: {}", report.feasibility())?;
    writeln!(
        out,
        "Effort: {} ({})",
        report.effort(),
        report.feasibility().effort_text()
    )?;

    heading(&mut out, "COMPONENT SCORES")?;
    for component in Component::ALL {
        let sub = report.subscore(component);
        writeln!(out, "{component}: {:.1}/100", sub.value())?;
        for finding in sub.findings() {
            finding_line(&mut out, finding)?;
        }
    }

    if !report.risk_findings().is_empty() {
        heading(&mut out, "RISK FINDINGS")?;
        for risk in report.risk_findings() {
            let blocking = if risk.blocking { ", blocking" } else { "" };
            writeln!(
                out,
                "[{}{blocking}] {}: {} (-{:.1})",
                risk.severity, risk.rule, risk.rationale, risk.deduction
            )?;
        }
    }

    if !report.patterns().is_empty() {
        heading(&mut out, "DETECTED PATTERNS")?;
        for pattern in report.patterns() {
            writeln!(out, "{}: {}", pattern.pattern, pattern.evidence)?;
        }
    }

    if !report.opportunities().is_empty() {
        heading(&mut out, "AUTOMATION OPPORTUNITIES")?;
        for opportunity in report.opportunities() {
            writeln!(out, "- {opportunity}")?;
        }
    }

    if !report.recommendations().is_empty() {
        heading(&mut out, "RECOMMENDED AUTOMATION TOOLS")?;
        for (i, rec) in report.recommendations().iter().enumerate() {
            writeln!(
                out,
                "{}. {} (suitability {:.1}): {}",
                i + 1,
                rec.tool,
                rec.suitability,
                rec.rationale
            )?;
        }
    }

    let summary = report.summary();
    heading(&mut out, "TECHNICAL ANALYSIS")?;
    writeln!(
        out,
        "Sheets: {} ({} analyzed)",
        summary.sheet_count, summary.analyzed_sheets
    )?;
    writeln!(out, "File size: {:.2} MB", summary.file_size_bytes as f64 / (1024.0 * 1024.0))?;
    writeln!(out, "Named ranges: {}", summary.named_ranges)?;
    writeln!(
        out,
        "Formula cells: {} ({} distinct)",
        summary.formula_cells, summary.distinct_formulas
    )?;
    for (tier, count) in summary.tier_histogram.iter().filter(|(_, n)| **n > 0) {
        writeln!(out, "  {tier}: {count}")?;
    }

    if !report.engine_findings().is_empty() {
        heading(&mut out, "ANALYSIS NOTES")?;
        for finding in report.engine_findings() {
            finding_line(&mut out, finding)?;
        }
    }

    writeln!(out)?;
    writeln!(out, "END OF REPORT")?;
    writeln!(out, "{}", "=".repeat(RULE))?;
    Ok(out)
}

/// `<dir>/<stem>_automation_report.txt` next to the analyzed file.
pub fn default_export_path(source: &Path) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "workbook".to_string());
    source.with_file_name(format!("{stem}_automation_report.txt"))
}
