use anyhow::{Context, Result};
use fleetstats_core::domain::{ProcessingStatus, RepoStatistics};
use fleetstats_core::ports::RenderPort;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use crate::summary::RunSummary;

pub const REPORT_FILE: &str = "index.html";
pub const SUMMARY_FILE: &str = "multi_repo_summary.html";

const TOP_AUTHORS: usize = 10;

const STYLE: &str = "body{font-family:sans-serif;margin:2em}\
table{border-collapse:collapse}\
td,th{border:1px solid #ccc;padding:4px 8px;text-align:left}\
.failed{color:#b00}.skipped{color:#888}";

/// Minimal static HTML report, one page per repository
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlReport;

impl RenderPort for HtmlReport {
    fn render(&self, stats: &RepoStatistics, output_dir: &Path) -> Result<()> {
        let path = output_dir.join(REPORT_FILE);
        fs::write(&path, repository_page(stats)).with_context(|| format!("Failed to write {}", path.display()))
    }
}

fn repository_page(stats: &RepoStatistics) -> String {
    let mut html = String::new();
    let name = escape_html(&stats.name);
    page_header(&mut html, &format!("{} - repository statistics", name));

    let _ = writeln!(html, "<h1>{}</h1>", name);
    html.push_str("<table>\n");
    row(&mut html, "Commits", &stats.total_commits.to_string());
    row(&mut html, "Authors", &stats.authors.len().to_string());
    row(&mut html, "First commit", &format_timestamp(stats.first_commit));
    row(&mut html, "Last commit", &format_timestamp(stats.last_commit));
    row(&mut html, "Files", &stats.total_files().to_string());
    row(&mut html, "Lines", &stats.total_lines().to_string());
    html.push_str("</table>\n");

    if !stats.authors.is_empty() {
        html.push_str("<h2>Top authors</h2>\n<table>\n<tr><th>Author</th><th>Commits</th></tr>\n");
        for (author, commits) in stats.top_authors(TOP_AUTHORS) {
            let _ = writeln!(html, "<tr><td>{}</td><td>{}</td></tr>", escape_html(author), commits);
        }
        html.push_str("</table>\n");
    }

    if !stats.extensions.is_empty() {
        html.push_str("<h2>Extensions</h2>\n<table>\n<tr><th>Extension</th><th>Files</th><th>Lines</th></tr>\n");
        for (ext, totals) in &stats.extensions {
            let label = if ext.is_empty() { "(none)" } else { ext.as_str() };
            let _ = writeln!(
                html,
                "<tr><td>{}</td><td>{}</td><td>{}</td></tr>",
                escape_html(label),
                totals.files,
                totals.lines
            );
        }
        html.push_str("</table>\n");
    }

    html.push_str("</body>\n</html>\n");
    html
}

/// Write the fleet-wide summary page into `output_dir` and return its path.
pub fn write_summary_page(summary: &RunSummary, output_dir: &Path) -> Result<PathBuf> {
    let mut html = String::new();
    page_header(&mut html, "Repository fleet summary");

    html.push_str("<h1>Repository fleet summary</h1>\n<table>\n");
    row(&mut html, "Discovered", &summary.discovered().to_string());
    row(&mut html, "Succeeded", &summary.succeeded().to_string());
    row(&mut html, "Failed", &summary.failed().to_string());
    row(&mut html, "Skipped", &summary.skipped().to_string());
    row(&mut html, "Total time", &format!("{:.1}s", summary.elapsed().as_secs_f64()));
    html.push_str("</table>\n");

    html.push_str("<h2>Repositories</h2>\n<table>\n<tr><th>Repository</th><th>Kind</th><th>Status</th><th>Time</th><th>Details</th></tr>\n");
    for result in summary.sorted_results() {
        let name = match &result.report_dir {
            Some(dir) => {
                let target = dir
                    .strip_prefix(output_dir)
                    .unwrap_or(dir)
                    .join(REPORT_FILE);
                format!(
                    "<a href=\"{}\">{}</a>",
                    escape_html(&target.to_string_lossy()),
                    escape_html(&result.repo_name)
                )
            }
            None => escape_html(&result.repo_name),
        };
        let class = match result.status {
            ProcessingStatus::Success => "ok",
            ProcessingStatus::Failed => "failed",
            ProcessingStatus::Skipped => "skipped",
        };
        let _ = writeln!(
            html,
            "<tr class=\"{}\"><td>{}</td><td>{}</td><td>{}</td><td>{} ms</td><td>{}</td></tr>",
            class,
            name,
            result.kind,
            result.status,
            result.duration_ms(),
            escape_html(result.error_message.as_deref().unwrap_or(""))
        );
    }
    html.push_str("</table>\n</body>\n</html>\n");

    let path = output_dir.join(SUMMARY_FILE);
    fs::write(&path, html).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}

fn page_header(html: &mut String, title: &str) {
    let _ = writeln!(
        html,
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n<style>{}</style>\n</head>\n<body>",
        title, STYLE
    );
}

fn row(html: &mut String, label: &str, value: &str) {
    let _ = writeln!(html, "<tr><th>{}</th><td>{}</td></tr>", label, escape_html(value));
}

/// Unix timestamp rendered as a YYYY-MM-DD date (UTC)
fn format_timestamp(timestamp: Option<i64>) -> String {
    let Some(ts) = timestamp else {
        return "-".to_string();
    };
    let (year, month, day) = civil_from_days(ts.div_euclid(86_400));
    format!("{:04}-{:02}-{:02}", year, month, day)
}

// Howard Hinnant's days-to-civil conversion
fn civil_from_days(days: i64) -> (i64, u32, u32) {
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let month = (if mp < 10 { mp + 3 } else { mp - 9 }) as u32;
    let year = yoe + era * 400 + i64::from(month <= 2);
    (year, month, day)
}

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
