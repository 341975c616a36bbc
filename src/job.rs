use chrono::{DateTime, FixedOffset};

/// One report to render. Built per request and consumed by a single render call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportJob {
    pub domain: String,
    /// RFC 3339 / ISO 8601 timestamp of when the audit was generated.
    pub generated_at: String,
    /// Audit tier label ("Free", "Pro", "Enterprise", ...).
    pub tier: String,
    /// Total score, 0-100.
    pub total_score: u32,
    pub lines: Vec<String>,
}

impl ReportJob {
    pub fn new(
        domain: impl Into<String>,
        generated_at: impl Into<String>,
        tier: impl Into<String>,
        total_score: u32,
        markup: &str,
    ) -> Self {
        Self {
            domain: domain.into(),
            generated_at: generated_at.into(),
            tier: tier.into(),
            total_score,
            lines: split_markup_lines(markup),
        }
    }

    fn timestamp(&self) -> Option<DateTime<FixedOffset>> {
        DateTime::parse_from_rfc3339(self.generated_at.trim()).ok()
    }

    /// `VYA-EXAMPLE-COM-<epoch millis>`; an unparseable timestamp yields millis `0`.
    pub fn report_id(&self) -> String {
        let millis = self.timestamp().map(|ts| ts.timestamp_millis()).unwrap_or(0);
        format!(
            "VYA-{}-{}",
            self.domain.replace('.', "-").to_uppercase(),
            millis
        )
    }

    /// Day-first date label in the timestamp's own offset.
    pub fn date_label(&self) -> String {
        match self.timestamp() {
            Some(ts) => ts.format("%d-%m-%Y, %H:%M:%S").to_string(),
            None => self.generated_at.clone(),
        }
    }
}

/// Splits on `\n` and `\r\n`, keeping blank lines.
pub fn split_markup_lines(markup: &str) -> Vec<String> {
    markup
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line).to_string())
        .collect()
}

/// Suggested attachment name: `Informe-VyAudit-<domain>.pdf` with every
/// character outside `[A-Za-z0-9.-]` replaced by `_`.
pub fn report_filename(domain: &str) -> String {
    let safe: String = domain
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '.' || ch == '-' {
                ch
            } else {
                '_'
            }
        })
        .collect();
    format!("Informe-VyAudit-{safe}.pdf")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filename_replaces_unsafe_characters() {
        assert_eq!(
            report_filename("example.com"),
            "Informe-VyAudit-example.com.pdf"
        );
        assert_eq!(
            report_filename("sub domain/ñ:8080"),
            "Informe-VyAudit-sub_domain___8080.pdf"
        );
    }

    #[test]
    fn report_id_uses_domain_and_epoch_millis() {
        let job = ReportJob::new("shop.example.cl", "2024-05-01T12:00:00Z", "Pro", 90, "");
        assert_eq!(job.report_id(), "VYA-SHOP-EXAMPLE-CL-1714564800000");
    }

    #[test]
    fn report_id_falls_back_to_zero_for_bad_timestamp() {
        let job = ReportJob::new("a.b", "yesterday", "Free", 10, "");
        assert_eq!(job.report_id(), "VYA-A-B-0");
        assert_eq!(job.date_label(), "yesterday");
    }

    #[test]
    fn date_label_keeps_timestamp_offset() {
        let job = ReportJob::new("a.b", "2024-05-01T08:05:09-04:00", "Free", 10, "");
        assert_eq!(job.date_label(), "01-05-2024, 08:05:09");
    }

    #[test]
    fn markup_lines_handle_crlf_and_blanks() {
        let lines = split_markup_lines("# A\r\n\r\n- b\nc");
        assert_eq!(lines, vec!["# A", "", "- b", "c"]);
    }
}
