//! Standalone HTML document handed to the external renderer.

use crate::job::ReportJob;
use base64::Engine;

const STYLE: &str = r#"    :root { color-scheme: light; }
    body { margin: 0; color: #0f172a; background: #fff; font-family: Arial, sans-serif; font-size: 10.5pt; line-height: 1.25; }
    .brand-strip { background: linear-gradient(90deg, #0a3e73 0%, #148aff 100%); padding: 0.55rem 0.75rem; color: #fff; }
    .brand-row, .cover-head { display: flex; align-items: center; justify-content: space-between; gap: 12px; }
    .brand-title { margin: 0; font-weight: 700; font-size: 0.9rem; }
    .brand-meta { margin: 0.1rem 0 0 0; font-size: 0.72rem; opacity: 0.9; }
    .brand-logo { height: 56px; width: auto; object-fit: contain; }
    .cover { break-inside: avoid; margin: 0.45rem 0.6rem; padding: 0.55rem 0.65rem; border: 1px solid #e2e8f0; border-radius: 0.75rem; background: #f8fbff; }
    .cover-head { margin-bottom: 0.5rem; }
    .cover-title { margin: 0; color: #0a3e73; font-size: 0.9rem; font-weight: 700; }
    .cover-logo { height: 58px; width: auto; object-fit: contain; }
    .cover-grid { margin-top: 0.5rem; display: grid; gap: 0.35rem; }
    .cover-grid p { margin: 0; font-size: 0.78rem; line-height: 1.18; color: #1e293b; }
    .report-body { padding: 0.5rem 0.75rem 0.65rem 0.75rem; font-size: 0.78rem; line-height: 1.25; color: #1f2937; }
    .report-body h1, .report-body h2, .report-body h3 { color: #06223d; }
    .report-body h1 { margin: 0.72rem 0 0.26rem 0; font-size: 0.95rem; line-height: 1.2; }
    .report-body h2, .report-body h3 { margin: 0.3rem 0 0.15rem 0; font-size: 0.86rem; line-height: 1.2; }
    .report-body li { margin: 0.08rem 0 0.12rem 0; }
    .report-body td { border: 1px solid #d1d5db; padding: 0.2rem 0.24rem; text-align: left; vertical-align: top; line-height: 1.2; }
    .report-footer { border-top: 1px solid #e2e8f0; padding: 0.45rem 0.75rem 0.55rem 0.75rem; font-size: 0.68rem; color: #475569; }
    .report-footer p { margin: 0.08rem 0; }
    @page { size: A4; margin: 8mm; }
"#;

pub fn escape_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

/// `**a**` pairs become `<strong>`; an unmatched `**` is left alone.
fn strong_spans(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut rest = line;
    while let Some(open) = rest.find("**") {
        let after = &rest[open + 2..];
        match after.find("**") {
            Some(close) => {
                out.push_str(&rest[..open]);
                out.push_str("<strong>");
                out.push_str(&after[..close]);
                out.push_str("</strong>");
                rest = &after[close + 2..];
            }
            None => break,
        }
    }
    out.push_str(rest);
    out
}

fn markdown_line(line: &str) -> String {
    let escaped = escape_html(line);
    let line = if let Some(text) = escaped.strip_prefix("### ") {
        format!("<h3>{text}</h3>")
    } else if let Some(text) = escaped.strip_prefix("## ") {
        format!("<h2>{text}</h2>")
    } else if let Some(text) = escaped.strip_prefix("# ") {
        format!("<h1>{text}</h1>")
    } else {
        escaped
    };
    let line = strong_spans(&line);
    if line.len() >= 3 && line.starts_with('|') && line.ends_with('|') {
        return format!("<tr><td>{}</td></tr>", &line[1..line.len() - 1]);
    }
    match line.strip_prefix("- ") {
        Some(text) => format!("<li>{text}</li>"),
        None => line,
    }
}

/// Line-oriented conversion of the report markup. Every input newline becomes
/// `<br />`, so blank lines survive as vertical space.
pub fn markdown_to_html(lines: &[String]) -> String {
    lines
        .iter()
        .map(|line| markdown_line(line))
        .collect::<Vec<_>>()
        .join("<br />")
}

pub fn png_data_url(png: &[u8]) -> String {
    format!(
        "data:image/png;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(png)
    )
}

/// Full document: brand strip, cover card, body, footer. The logo is omitted
/// when `logo_png` is `None`.
pub fn build_report_html(job: &ReportJob, logo_png: Option<&[u8]>) -> String {
    let logo = logo_png.map(png_data_url);
    let logo_img = |class: &str| match &logo {
        Some(url) => format!(r#"<img class="{class}" src="{url}" alt="Vytronix" />"#),
        None => String::new(),
    };

    let mut html = String::new();
    html.push_str("<!doctype html>\n<html lang=\"es\">\n<head>\n");
    html.push_str("  <meta charset=\"utf-8\" />\n");
    html.push_str(
        "  <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\" />\n",
    );
    html.push_str("  <title>Informe VyAudit</title>\n  <style>\n");
    html.push_str(STYLE);
    html.push_str("  </style>\n</head>\n<body>\n  <article>\n");

    html.push_str("    <div class=\"brand-strip\">\n      <div class=\"brand-row\">\n        <div>\n");
    html.push_str(
        "          <p class=\"brand-title\">VyAudit | Producto oficial de Vytronix SpA</p>\n",
    );
    html.push_str("          <p class=\"brand-meta\">Informe profesional de auditoria web</p>\n");
    html.push_str("        </div>\n");
    html.push_str(&format!("        {}\n", logo_img("brand-logo")));
    html.push_str("      </div>\n    </div>\n");

    html.push_str("    <section class=\"cover\">\n      <div class=\"cover-head\">\n");
    html.push_str("        <h3 class=\"cover-title\">Informe Final</h3>\n");
    html.push_str(&format!("        {}\n", logo_img("cover-logo")));
    html.push_str("      </div>\n      <div class=\"cover-grid\">\n");
    let cover = [
        ("Dominio", escape_html(&job.domain)),
        ("Fecha de emision", escape_html(&job.date_label())),
        ("Tipo de auditoria", escape_html(&job.tier)),
        ("ID de informe", escape_html(&job.report_id())),
        ("Puntaje total", format!("{}/100", job.total_score)),
    ];
    for (label, value) in cover {
        html.push_str(&format!(
            "        <p><strong>{label}:</strong> {value}</p>\n"
        ));
    }
    html.push_str("      </div>\n    </section>\n");

    html.push_str(&format!(
        "    <section class=\"report-body\"><div>{}</div></section>\n",
        markdown_to_html(&job.lines)
    ));
    html.push_str("    <footer class=\"report-footer\">\n");
    html.push_str("      <p>Vytronix SpA | VyAudit</p>\n");
    html.push_str(
        "      <p>Este informe corresponde a una medicion puntual automatizada.</p>\n",
    );
    html.push_str("    </footer>\n  </article>\n</body>\n</html>\n");
    html
}
