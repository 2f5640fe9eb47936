//! summary.html generation
//!
//! A single self-contained page (inline CSS, no scripts, no network) that
//! links every artifact of the bundle with relative paths, so the bundle can
//! be zipped or published as-is.

use serde_json::Value;

use super::manifest::Manifest;

/// Render the summary page for a finished bundle.
pub fn render(manifest: &Manifest, issues: &[Value]) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Audit Summary - {source}</title>
    <style>{css}</style>
</head>
<body>
    <div class="container">
        {header}
        {links}
        {issues_table}
        {gallery}
        {footer}
    </div>
</body>
</html>"#,
        source = html_escape(&manifest.source.name),
        css = inline_css(),
        header = render_header(manifest),
        links = render_links(manifest),
        issues_table = render_issues_table(issues),
        gallery = render_gallery(manifest),
        footer = render_footer(manifest),
    )
}

fn render_header(manifest: &Manifest) -> String {
    let counts = &manifest.counts;
    format!(
        r#"<header>
            <h1>Audit Summary</h1>
            <dl class="identity">
                <dt>Source</dt><dd>{name}</dd>
                <dt>SHA-256</dt><dd><code>{sha}</code></dd>
                <dt>Generated</dt><dd>{generated}</dd>
                <dt>Mapping version</dt><dd>{mapping}</dd>
                <dt>Validator version</dt><dd>{validator}</dd>
            </dl>
            <div class="counts">
                <span class="count error">{errors} error(s)</span>
                <span class="count warning">{warnings} warning(s)</span>
                <span class="count other">{other} other</span>
                <span class="count total">{total} total</span>
            </div>
        </header>"#,
        name = html_escape(&manifest.source.name),
        sha = html_escape(&manifest.source.sha256),
        generated = html_escape(&manifest.generated_at),
        mapping = manifest
            .mapping_version
            .as_deref()
            .map(html_escape)
            .unwrap_or_else(|| "<em>none</em>".to_string()),
        validator = html_escape(&manifest.validator_version),
        errors = counts.errors,
        warnings = counts.warnings,
        other = counts.other,
        total = counts.total,
    )
}

fn render_links(manifest: &Manifest) -> String {
    let paths = &manifest.paths;
    format!(
        r##"<nav class="links">
            <a href="{manifest}">Manifest</a>
            <a href="{report}">Validation report</a>
            <a href="{source}">Source copy</a>
            <a href="#gallery">Screenshots</a>
        </nav>"##,
        manifest = html_escape(&paths.manifest),
        report = html_escape(&paths.validation_report),
        source = html_escape(&paths.source_copy),
    )
}

fn text_field<'a>(issue: &'a Value, key: &str) -> &'a str {
    issue.get(key).and_then(Value::as_str).unwrap_or("")
}

fn render_issues_table(issues: &[Value]) -> String {
    if issues.is_empty() {
        return r#"<section><h2>Issues</h2><p class="empty">No issues reported.</p></section>"#.to_string();
    }

    let rows: String = issues
        .iter()
        .map(|issue| {
            let level = text_field(issue, "level");
            let row = match issue.get("row") {
                Some(Value::Number(n)) => n.to_string(),
                Some(Value::String(s)) => s.clone(),
                _ => String::new(),
            };
            let thumb = match issue.get("screenshot_ref").and_then(Value::as_str) {
                Some(r) => format!(
                    r#"<a href="{r}"><img class="thumb" src="{r}" alt="screenshot"></a>"#,
                    r = html_escape(r)
                ),
                None => String::new(),
            };
            format!(
                r#"<tr class="level-{class}">
                    <td>{level}</td>
                    <td>{rule}</td>
                    <td>{column}!{row}</td>
                    <td>{message}</td>
                    <td>{thumb}</td>
                </tr>"#,
                class = level_class(level),
                level = html_escape(level),
                rule = html_escape(text_field(issue, "rule")),
                column = html_escape(text_field(issue, "column")),
                row = html_escape(&row),
                message = html_escape(text_field(issue, "message")),
                thumb = thumb,
            )
        })
        .collect();

    format!(
        r#"<section>
            <h2>Issues</h2>
            <table>
                <thead><tr><th>Level</th><th>Rule</th><th>Cell</th><th>Message</th><th>Evidence</th></tr></thead>
                <tbody>{rows}</tbody>
            </table>
        </section>"#,
        rows = rows
    )
}

fn level_class(level: &str) -> &'static str {
    match level.to_ascii_lowercase().as_str() {
        "error" => "error",
        "warning" => "warning",
        _ => "other",
    }
}

fn on_off(on: bool) -> &'static str {
    if on {
        "on"
    } else {
        "off"
    }
}

fn render_gallery(manifest: &Manifest) -> String {
    let figures: String = manifest
        .screenshots
        .iter()
        .map(|shot| {
            format!(
                r#"<figure>
                    <a href="{file}"><img src="{file}" alt="{file}"></a>
                    <figcaption>{file} &middot; errors {errors} &middot; warnings {warnings}</figcaption>
                </figure>"#,
                file = html_escape(&shot.file),
                errors = on_off(shot.filter.errors),
                warnings = on_off(shot.filter.warnings),
            )
        })
        .collect();
    format!(
        r#"<section id="gallery">
            <h2>Screenshots</h2>
            <div class="gallery">{figures}</div>
        </section>"#,
        figures = figures
    )
}

fn render_footer(manifest: &Manifest) -> String {
    format!(
        r#"<footer>Generated by {} at {}</footer>"#,
        html_escape(&manifest.validator_version),
        html_escape(&manifest.generated_at)
    )
}

fn inline_css() -> &'static str {
    r#"
body { font-family: -apple-system, "Segoe UI", Helvetica, Arial, sans-serif; margin: 0; background: #f6f7f9; color: #1f2328; }
.container { max-width: 1200px; margin: 0 auto; padding: 24px; }
h1 { margin: 0 0 12px; font-size: 24px; }
h2 { font-size: 18px; margin: 28px 0 12px; }
dl.identity { display: grid; grid-template-columns: max-content 1fr; gap: 4px 16px; margin: 0; }
dl.identity dt { font-weight: 600; color: #57606a; }
dl.identity dd { margin: 0; }
.counts { margin-top: 12px; display: flex; gap: 8px; }
.count { padding: 2px 10px; border-radius: 12px; font-size: 13px; background: #eaeef2; }
.count.error { background: #ffebe9; color: #cf222e; }
.count.warning { background: #fff8c5; color: #9a6700; }
nav.links { margin-top: 16px; display: flex; gap: 16px; }
table { width: 100%; border-collapse: collapse; background: #fff; }
th, td { text-align: left; padding: 6px 10px; border-bottom: 1px solid #d0d7de; vertical-align: top; font-size: 14px; }
tr.level-error td:first-child { color: #cf222e; font-weight: 600; }
tr.level-warning td:first-child { color: #9a6700; font-weight: 600; }
img.thumb { width: 160px; border: 1px solid #d0d7de; }
.gallery { display: grid; grid-template-columns: repeat(auto-fill, minmax(360px, 1fr)); gap: 16px; }
figure { margin: 0; background: #fff; border: 1px solid #d0d7de; padding: 8px; }
figure img { width: 100%; }
figcaption { font-size: 13px; color: #57606a; margin-top: 6px; }
.empty { color: #57606a; font-style: italic; }
footer { margin-top: 32px; font-size: 12px; color: #57606a; }
"#
}

/// Escape text for HTML element and attribute content.
pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::manifest::{BundlePaths, ScreenshotEntry, SourceIdentity};
    use crate::bundle::ALL_ISSUES;
    use auditgrid_engine::filter::IssueCounts;
    use serde_json::json;

    fn manifest() -> Manifest {
        Manifest {
            generated_at: "2026-03-01T10:00:00Z".into(),
            source: SourceIdentity { name: "q1 <draft>.xlsx".into(), sha256: "ab".into(), reference: "q1.xlsx".into() },
            mapping_version: None,
            validator_version: "agrid 0.3.0".into(),
            counts: IssueCounts { errors: 1, warnings: 0, other: 0, total: 1 },
            screenshots: vec![ScreenshotEntry::new("screenshots/01_all_issues.svg".into(), &ALL_ISSUES)],
            paths: BundlePaths {
                source_copy: "source/q1-ab.xlsx".into(),
                validation_report: "validation/validation_report.json".into(),
                screenshots_dir: "screenshots".into(),
                manifest: "manifest.json".into(),
                summary: "summary.html".into(),
            },
        }
    }

    #[test]
    fn escapes_all_special_characters() {
        assert_eq!(html_escape(r#"<a href="x">Tom & Jerry's</a>"#),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; Jerry&#39;s&lt;/a&gt;");
    }

    #[test]
    fn user_text_is_escaped_in_page() {
        let issues = vec![json!({
            "rule": "R<1>", "level": "error", "row": 2, "column": "Price",
            "message": "<script>alert('x')</script> & more",
            "screenshot_ref": "screenshots/01_all_issues.svg"
        })];
        let html = render(&manifest(), &issues);
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;alert(&#39;x&#39;)&lt;/script&gt; &amp; more"));
        assert!(html.contains("R&lt;1&gt;"));
        assert!(html.contains("q1 &lt;draft&gt;.xlsx"));
    }

    #[test]
    fn links_and_gallery_present() {
        let html = render(&manifest(), &[]);
        assert!(html.contains(r#"href="manifest.json""#));
        assert!(html.contains(r#"href="validation/validation_report.json""#));
        assert!(html.contains("errors on &middot; warnings on"));
        assert!(html.contains("No issues reported."));
        assert!(!html.contains("http://") && !html.contains("https://"));
    }
}
