use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::StrategyUsed;

/// Something worth one line in the JSONL trace.
#[derive(Debug, Clone, Copy)]
pub(crate) enum TraceEvent<'a> {
    /// The browser path was abandoned for the built-in writer.
    Fallback { domain: &'a str, reason: &'a str },
    /// Shape of a document produced by the built-in writer.
    PdfSummary {
        pages: usize,
        objects: usize,
        commands: usize,
        bytes: usize,
        xref_offset: usize,
    },
    /// Final outcome of one render.
    Strategy {
        domain: &'a str,
        strategy: StrategyUsed,
        pages: usize,
        bytes: usize,
        logo: bool,
    },
}

impl TraceEvent<'_> {
    fn kind(&self) -> &'static str {
        match self {
            TraceEvent::Fallback { .. } => "render.fallback",
            TraceEvent::PdfSummary { .. } => "pdf.summary",
            TraceEvent::Strategy { .. } => "render.strategy",
        }
    }

    /// Tally key and amount folded into the per-render totals line.
    fn tally(&self) -> (&'static str, u64) {
        match self {
            TraceEvent::Fallback { .. } => ("render.fallback", 1),
            TraceEvent::PdfSummary { objects, .. } => ("pdf.objects", *objects as u64),
            TraceEvent::Strategy { strategy, .. } => match strategy {
                StrategyUsed::External => ("render.external", 1),
                StrategyUsed::Manual => ("render.manual", 1),
            },
        }
    }

    fn to_json(&self) -> String {
        let line = JsonLine::new(self.kind());
        match *self {
            TraceEvent::Fallback { domain, reason } => {
                line.text("domain", domain).text("reason", reason).close()
            }
            TraceEvent::PdfSummary {
                pages,
                objects,
                commands,
                bytes,
                xref_offset,
            } => line
                .number("pages", pages as u64)
                .number("objects", objects as u64)
                .number("commands", commands as u64)
                .number("bytes", bytes as u64)
                .number("xref_offset", xref_offset as u64)
                .close(),
            TraceEvent::Strategy {
                domain,
                strategy,
                pages,
                bytes,
                logo,
            } => line
                .text("domain", domain)
                .text("strategy", strategy.as_str())
                .number("pages", pages as u64)
                .number("bytes", bytes as u64)
                .flag("logo", logo)
                .close(),
        }
    }
}

/// Flat JSON object written left to right.
struct JsonLine {
    buf: String,
}

impl JsonLine {
    fn new(kind: &str) -> Self {
        let mut buf = String::from("{\"type\":");
        push_quoted(&mut buf, kind);
        Self { buf }
    }

    fn key(mut self, key: &str) -> Self {
        self.buf.push(',');
        push_quoted(&mut self.buf, key);
        self.buf.push(':');
        self
    }

    fn text(self, key: &str, value: &str) -> Self {
        let mut line = self.key(key);
        push_quoted(&mut line.buf, value);
        line
    }

    fn number(self, key: &str, value: u64) -> Self {
        let mut line = self.key(key);
        let _ = write!(line.buf, "{value}");
        line
    }

    fn flag(self, key: &str, value: bool) -> Self {
        let mut line = self.key(key);
        line.buf.push_str(if value { "true" } else { "false" });
        line
    }

    fn raw(self, key: &str, json: &str) -> Self {
        let mut line = self.key(key);
        line.buf.push_str(json);
        line
    }

    fn close(mut self) -> String {
        self.buf.push('}');
        self.buf
    }
}

fn push_quoted(buf: &mut String, raw: &str) {
    buf.push('"');
    for ch in raw.chars() {
        match ch {
            '"' | '\\' => {
                buf.push('\\');
                buf.push(ch);
            }
            '\n' => buf.push_str("\\n"),
            '\r' => buf.push_str("\\r"),
            '\t' => buf.push_str("\\t"),
            c if (c as u32) < 0x20 => {
                let _ = write!(buf, "\\u{:04x}", c as u32);
            }
            c => buf.push(c),
        }
    }
    buf.push('"');
}

/// JSONL trace file shared by every render of one renderer. Each render
/// appends its events and closes with a `render.totals` line.
#[derive(Clone)]
pub(crate) struct TraceLog {
    sink: Arc<Mutex<TraceSink>>,
}

struct TraceSink {
    out: BufWriter<File>,
    totals: BTreeMap<&'static str, u64>,
}

impl std::fmt::Debug for TraceLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TraceLog").finish_non_exhaustive()
    }
}

impl TraceLog {
    pub fn create(path: &Path) -> io::Result<Self> {
        let out = BufWriter::new(File::create(path)?);
        Ok(Self {
            sink: Arc::new(Mutex::new(TraceSink {
                out,
                totals: BTreeMap::new(),
            })),
        })
    }

    pub fn record(&self, event: TraceEvent<'_>) {
        let Ok(mut sink) = self.sink.lock() else {
            return;
        };
        let (key, amount) = event.tally();
        let total = sink.totals.entry(key).or_default();
        *total = total.saturating_add(amount);
        let _ = writeln!(sink.out, "{}", event.to_json());
    }

    /// Writes the totals gathered since the previous call, resets them and
    /// flushes the file.
    pub fn finish_render(&self, domain: &str) {
        let Ok(mut sink) = self.sink.lock() else {
            return;
        };
        let totals = std::mem::take(&mut sink.totals);
        let mut counts = String::from("{");
        for (idx, (key, value)) in totals.iter().enumerate() {
            if idx > 0 {
                counts.push(',');
            }
            push_quoted(&mut counts, key);
            let _ = write!(counts, ":{value}");
        }
        counts.push('}');
        let line = JsonLine::new("render.totals")
            .text("domain", domain)
            .raw("counts", &counts)
            .close();
        let _ = writeln!(sink.out, "{line}");
        if let Err(err) = sink.out.flush() {
            log::warn!("could not flush render trace: {err}");
        }
    }
}
