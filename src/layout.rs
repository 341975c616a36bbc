use crate::canvas::{Command, PageSet};
use crate::glyph::{self, IconKind, IconSpacing};
use crate::job::ReportJob;
use crate::png::DecodedImage;
use crate::types::{Color, FontFace, Margins, Rect, Size};

/// Approximate advance of one character as a fraction of the font size.
/// Helvetica is not monospaced; this is a deliberately coarse average.
pub const CHAR_WIDTH_FACTOR: f32 = 0.52;
pub const LINE_HEIGHT_FACTOR: f32 = 1.35;
pub const MIN_WRAP_CHARS: usize = 12;

const BLANK_LINE_GAP: f32 = 6.0;
const LIST_INDENT: f32 = 8.0;

const TEXT_COLOR: Color = Color::rgb(0.08, 0.11, 0.16);
const HEADING_COLOR: Color = Color::rgb(0.02, 0.12, 0.32);
const MUTED_COLOR: Color = Color::rgb(0.35, 0.42, 0.52);
const TABLE_COLOR: Color = Color::rgb(0.2, 0.24, 0.32);
const BRAND_FILL: Color = Color::rgb(0.04, 0.45, 0.93);
const BRAND_SUBTITLE: Color = Color::rgb(0.91, 0.96, 1.0);
const CARD_FILL: Color = Color::rgb(0.975, 0.988, 1.0);
const CARD_BORDER: Color = Color::rgb(0.77, 0.82, 0.91);
const CARD_TITLE: Color = Color::rgb(0.02, 0.2, 0.46);
const CARD_TEXT: Color = Color::rgb(0.1, 0.14, 0.22);
const FOOTER_PRIMARY: Color = Color::rgb(0.42, 0.47, 0.55);
const FOOTER_SECONDARY: Color = Color::rgb(0.5, 0.54, 0.6);

const STRIP_HEIGHT: f32 = 38.0;
const STRIP_RESERVE: f32 = 52.0;
const STRIP_LOGO_WIDTH: f32 = 70.0;
const CARD_HEIGHT: f32 = 132.0;
const CARD_RESERVE: f32 = 170.0;
const CARD_LOGO_WIDTH: f32 = 76.0;
const FOOTER_RESERVE: f32 = 28.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutConfig {
    pub page_size: Size,
    pub margins: Margins,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            page_size: Size::a4(),
            margins: Margins::all(36.0),
        }
    }
}

impl LayoutConfig {
    pub fn content_width(&self) -> f32 {
        self.page_size.width - self.margins.horizontal * 2.0
    }

    pub fn top_y(&self) -> f32 {
        self.page_size.height - self.margins.top
    }
}

pub fn line_height(font_size: f32) -> f32 {
    font_size * LINE_HEIGHT_FACTOR
}

/// Character budget for one line of `font_size` text in `max_width` points.
pub fn max_chars(font_size: f32, max_width: f32) -> usize {
    let per_char = font_size * CHAR_WIDTH_FACTOR;
    if per_char <= 0.0 || !max_width.is_finite() {
        return MIN_WRAP_CHARS;
    }
    ((max_width / per_char).floor().max(0.0) as usize).max(MIN_WRAP_CHARS)
}

/// Greedy word wrap of already normalized text. A word longer than the budget
/// gets a line to itself; it is only cut when the text has no words at all.
pub fn wrap_normalized(text: &str, font_size: f32, max_width: f32) -> Vec<String> {
    if text.is_empty() {
        return vec![String::new()];
    }
    let limit = max_chars(font_size, max_width);
    if text.chars().count() <= limit {
        return vec![text.to_string()];
    }

    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        if current.is_empty() {
            current.push_str(word);
            continue;
        }
        if current.len() + 1 + word.len() > limit {
            lines.push(std::mem::take(&mut current));
            current.push_str(word);
        } else {
            current.push(' ');
            current.push_str(word);
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }

    if lines.is_empty() {
        lines.push(text.chars().take(limit).collect());
    }
    lines
}

pub fn wrap_text(text: &str, font_size: f32, max_width: f32) -> Vec<String> {
    wrap_normalized(&glyph::normalize_text(text), font_size, max_width)
}

/// Removes leading `#`s, a leading `-` and `**bold**` markers.
pub fn clean_line(line: &str) -> String {
    let line = line.trim_start_matches('#').trim_start();
    let line = match line.strip_prefix('-') {
        Some(rest) => rest.trim_start(),
        None => line,
    };
    strip_bold_markers(line).trim().to_string()
}

fn strip_bold_markers(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(open) = rest.find("**") {
        let after_open = &rest[open + 2..];
        match after_open.find("**") {
            Some(close) => {
                out.push_str(&rest[..open]);
                out.push_str(&after_open[..close]);
                rest = &after_open[close + 2..];
            }
            None => break,
        }
    }
    out.push_str(rest);
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulletIcon {
    None,
    Leading(IconKind),
    Inline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    NumberedHeading,
    Heading,
    Bullet(BulletIcon),
    TableRow,
    Blank,
    Paragraph,
}

/// One classified markup line. `text` is the display text, before ASCII folding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub kind: BlockKind,
    pub text: String,
}

fn is_numbered_heading(row: &str) -> bool {
    let Some(rest) = row.strip_prefix('#') else {
        return false;
    };
    let trimmed = rest.trim_start();
    if trimmed.len() == rest.len() {
        return false;
    }
    let digits = trimmed.chars().take_while(|c| c.is_ascii_digit()).count();
    digits > 0 && trimmed[digits..].starts_with('.')
}

/// Classifies one markup line. Checked in order: numbered heading, heading,
/// bullet, table row, blank, paragraph.
pub fn classify(raw: &str) -> Block {
    let row = raw.trim();
    if row.is_empty() {
        return Block {
            kind: BlockKind::Blank,
            text: String::new(),
        };
    }
    if is_numbered_heading(row) {
        return Block {
            kind: BlockKind::NumberedHeading,
            text: clean_line(row),
        };
    }
    if row.starts_with("# ") {
        return Block {
            kind: BlockKind::Heading,
            text: clean_line(row),
        };
    }
    if row.starts_with("- ") {
        return classify_bullet(&clean_line(row));
    }
    if row.starts_with('|') {
        return Block {
            kind: BlockKind::TableRow,
            text: clean_line(row).replace('|', " | "),
        };
    }
    Block {
        kind: BlockKind::Paragraph,
        text: clean_line(row),
    }
}

fn classify_bullet(bullet: &str) -> Block {
    if glyph::contains_icon(bullet) && !glyph::starts_with_icon(bullet) {
        let text = glyph::substitute_icons(bullet, IconSpacing::Tight);
        return Block {
            kind: BlockKind::Bullet(BulletIcon::Inline),
            text: format!("- {text}"),
        };
    }
    let first = bullet.split_whitespace().next().unwrap_or("");
    if let Some(kind) = glyph::leading_icon(first) {
        let rest = glyph::strip_leading_icon(bullet);
        return Block {
            kind: BlockKind::Bullet(BulletIcon::Leading(kind)),
            text: format!("- {} {}", kind.marker(), rest),
        };
    }
    Block {
        kind: BlockKind::Bullet(BulletIcon::None),
        text: format!("- {bullet}"),
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextStyle {
    pub size: f32,
    pub font: FontFace,
    pub color: Color,
    pub indent: f32,
    pub gap_after: f32,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            size: 10.0,
            font: FontFace::Regular,
            color: TEXT_COLOR,
            indent: 0.0,
            gap_after: 2.0,
        }
    }
}

impl BlockKind {
    pub fn style(self) -> TextStyle {
        match self {
            BlockKind::NumberedHeading => TextStyle {
                size: 11.2,
                font: FontFace::Bold,
                color: HEADING_COLOR,
                gap_after: 4.0,
                ..TextStyle::default()
            },
            BlockKind::Heading => TextStyle {
                size: 10.4,
                font: FontFace::Bold,
                color: HEADING_COLOR,
                gap_after: 3.0,
                ..TextStyle::default()
            },
            BlockKind::Bullet(_) => TextStyle {
                indent: LIST_INDENT,
                gap_after: 1.0,
                ..TextStyle::default()
            },
            BlockKind::TableRow => TextStyle {
                size: 9.0,
                color: TABLE_COLOR,
                gap_after: 1.0,
                ..TextStyle::default()
            },
            BlockKind::Blank | BlockKind::Paragraph => TextStyle {
                gap_after: 1.0,
                ..TextStyle::default()
            },
        }
    }
}

/// Places text and boxes top-down with a single running cursor. Before any
/// line is written the cursor is checked against the bottom margin; a line
/// that does not fit moves whole to a fresh page.
pub struct LayoutEngine {
    config: LayoutConfig,
    pages: PageSet,
    y: f32,
}

impl LayoutEngine {
    pub fn new(config: LayoutConfig) -> Self {
        Self {
            config,
            pages: PageSet::new(config.page_size),
            y: config.top_y(),
        }
    }

    pub fn ensure_space(&mut self, required: f32) {
        if self.y - required < self.config.margins.bottom {
            self.pages.start_page();
            self.y = self.config.top_y();
        }
    }

    fn push(&mut self, command: Command) {
        self.pages.current_mut().push(command);
    }

    fn text_at(&mut self, x: f32, y: f32, text: &str, size: f32, font: FontFace, color: Color) {
        self.push(Command::DrawString {
            x,
            y,
            text: glyph::normalize_text(text),
            font,
            size,
            color,
        });
    }

    pub fn write_paragraph(&mut self, text: &str, style: TextStyle) {
        let width = self.config.content_width() - style.indent;
        let step = line_height(style.size);
        for line in wrap_text(text, style.size, width) {
            self.ensure_space(step);
            let x = self.config.margins.horizontal + style.indent;
            let y = self.y;
            self.push(Command::DrawString {
                x,
                y,
                text: line,
                font: style.font,
                size: style.size,
                color: style.color,
            });
            self.y -= step;
        }
        self.y -= style.gap_after;
    }

    pub fn write_block(&mut self, block: &Block) {
        match block.kind {
            BlockKind::Blank => self.y -= BLANK_LINE_GAP,
            kind => self.write_paragraph(&block.text, kind.style()),
        }
    }

    pub fn write_markup_line(&mut self, raw: &str) {
        let block = classify(raw);
        self.write_block(&block);
    }

    fn logo(&mut self, image: &DecodedImage, right_inset: f32, top: f32, max_width: f32, max_height: f32) {
        let (width, height) = fit_image(image, max_width, max_height);
        let x = self.config.page_size.width - self.config.margins.horizontal - width - right_inset;
        self.push(Command::DrawImage {
            rect: Rect {
                x,
                y: top - height,
                width,
                height,
            },
        });
    }

    fn header(&mut self, job: &ReportJob) {
        self.write_paragraph(
            "Resultado de auditoria VyAudit",
            TextStyle {
                size: 19.0,
                font: FontFace::Bold,
                color: HEADING_COLOR,
                gap_after: 0.0,
                ..TextStyle::default()
            },
        );
        self.write_paragraph(
            &format!("Analisis para: https://{}", job.domain),
            TextStyle {
                color: MUTED_COLOR,
                gap_after: 14.0,
                ..TextStyle::default()
            },
        );
    }

    fn brand_strip(&mut self, logo: Option<&DecodedImage>) {
        self.ensure_space(STRIP_RESERVE);
        let top = self.y;
        let left = self.config.margins.horizontal;
        let width = self.config.content_width();
        self.push(Command::FillRect {
            rect: Rect {
                x: left,
                y: top - STRIP_HEIGHT,
                width,
                height: STRIP_HEIGHT,
            },
            color: BRAND_FILL,
        });
        self.text_at(
            left + 12.0,
            top - 14.0,
            "VyAudit | Producto oficial de Vytronix SpA",
            10.0,
            FontFace::Bold,
            Color::WHITE,
        );
        self.text_at(
            left + 12.0,
            top - 27.0,
            "Informe profesional de auditoria web",
            8.5,
            FontFace::Regular,
            BRAND_SUBTITLE,
        );
        if let Some(image) = logo {
            self.logo(image, 22.0, top - 2.0, STRIP_LOGO_WIDTH, STRIP_HEIGHT - 4.0);
        }
        self.y = top - STRIP_HEIGHT - 12.0;
    }

    fn cover_card(&mut self, job: &ReportJob, logo: Option<&DecodedImage>) {
        self.ensure_space(CARD_RESERVE);
        let top = self.y;
        let left = self.config.margins.horizontal;
        let rect = Rect {
            x: left,
            y: top - CARD_HEIGHT,
            width: self.config.content_width(),
            height: CARD_HEIGHT,
        };
        self.push(Command::FillRect {
            rect,
            color: CARD_FILL,
        });
        self.push(Command::StrokeRect {
            rect,
            color: CARD_BORDER,
        });

        self.y -= 24.0;
        let y = self.y;
        self.text_at(left + 12.0, y, "Informe Final", 12.5, FontFace::Bold, CARD_TITLE);
        self.y -= 24.0;

        let rows = [
            (format!("Dominio: {}", job.domain), FontFace::Regular),
            (format!("Fecha de emision: {}", job.date_label()), FontFace::Regular),
            (format!("Tipo de auditoria: {}", job.tier), FontFace::Regular),
            (format!("ID de informe: {}", job.report_id()), FontFace::Regular),
            (format!("Puntaje total: {}/100", job.total_score), FontFace::Bold),
        ];
        for (row, font) in rows {
            let y = self.y;
            self.text_at(left + 12.0, y, &row, 10.0, font, CARD_TEXT);
            self.y -= 15.0;
        }

        if let Some(image) = logo {
            self.logo(image, 12.0, top - 10.0, CARD_LOGO_WIDTH, CARD_HEIGHT - 20.0);
        }
        self.y = top - CARD_HEIGHT - 16.0;
    }

    fn footer(&mut self) {
        self.ensure_space(FOOTER_RESERVE);
        let left = self.config.margins.horizontal;
        let bottom = self.config.margins.bottom;
        self.text_at(
            left,
            bottom + 12.0,
            "Vytronix SpA | VyAudit",
            9.0,
            FontFace::Regular,
            FOOTER_PRIMARY,
        );
        self.text_at(
            left,
            bottom + 2.0,
            "Este informe corresponde a una medicion puntual automatizada.",
            8.0,
            FontFace::Regular,
            FOOTER_SECONDARY,
        );
    }

    pub fn finish(self) -> PageSet {
        self.pages
    }
}

/// Scales the image to `max_width`, shrinking further if it would exceed `max_height`.
fn fit_image(image: &DecodedImage, max_width: f32, max_height: f32) -> (f32, f32) {
    if image.width == 0 || image.height == 0 {
        return (max_width, max_height);
    }
    let aspect = image.height as f32 / image.width as f32;
    let mut width = max_width;
    let mut height = width * aspect;
    if height > max_height {
        height = max_height;
        width = height / aspect;
    }
    (width, height)
}

/// Full report: title, brand strip, cover card, markup body, footer.
pub fn layout_report(job: &ReportJob, logo: Option<&DecodedImage>, config: LayoutConfig) -> PageSet {
    let mut engine = LayoutEngine::new(config);
    engine.header(job);
    engine.brand_strip(logo);
    engine.cover_card(job, logo);
    for line in &job.lines {
        engine.write_markup_line(line);
    }
    engine.footer();
    engine.finish()
}
