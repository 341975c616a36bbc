use crate::StrategyUsed;

/// Per-render figures returned next to the document.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderMetrics {
    pub strategy: StrategyUsed,
    /// Pages in the delivered document (from the layout, or counted via lopdf
    /// for external output).
    pub page_count: usize,
    /// Objects written by the built-in writer; `None` for external output.
    pub object_count: Option<usize>,
    pub total_bytes: usize,
    pub render_ms: f64,
    pub logo_embedded: bool,
    /// Why the external renderer was not used, when it was attempted.
    pub fallback_reason: Option<String>,
}

impl RenderMetrics {
    pub fn bytes_per_page(&self) -> f64 {
        if self.page_count == 0 {
            0.0
        } else {
            self.total_bytes as f64 / self.page_count as f64
        }
    }
}
