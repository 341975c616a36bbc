use crate::canvas::{Command, Page, PageSet};
use crate::error::ReportError;
use crate::glyph::escape_literal;
use crate::png::DecodedImage;
use crate::types::{Color, FontFace, Rect};
use flate2::Compression;
use flate2::write::ZlibEncoder;
use std::fmt::Write as _;
use std::io::Write as _;

pub const PDF_HEADER: &[u8] = b"%PDF-1.4\n";
// Binary comment so transports treat the file as binary.
const PDF_BINARY_MARKER: &[u8] = b"%\xE2\xE3\xCF\xD3\n";

pub const CATALOG_ID: usize = 1;
pub const PAGES_ID: usize = 2;
pub const FONT_REGULAR_ID: usize = 3;
pub const FONT_BOLD_ID: usize = 4;
pub const IMAGE_ID: usize = 5;
pub const IMAGE_MASK_ID: usize = 6;
pub const FIRST_PAGE_ID: usize = 7;

const IMAGE_RESOURCE: &str = "ImLogo";

/// Object bodies keyed by id, `1..=max_id`. Ids are handed out by role up front;
/// serialization refuses to run while any id in the range is still empty.
#[derive(Debug, Clone, Default)]
pub struct ObjectGraph {
    slots: Vec<Option<String>>,
}

impl ObjectGraph {
    pub fn with_max_id(max_id: usize) -> Self {
        Self {
            slots: vec![None; max_id + 1],
        }
    }

    pub fn max_id(&self) -> usize {
        self.slots.len().saturating_sub(1)
    }

    pub fn set(&mut self, id: usize, body: impl Into<String>) {
        if id == 0 {
            return;
        }
        if id >= self.slots.len() {
            self.slots.resize(id + 1, None);
        }
        self.slots[id] = Some(body.into());
    }

    pub fn get(&self, id: usize) -> Option<&str> {
        self.slots.get(id).and_then(|slot| slot.as_deref())
    }

    /// First id in `1..=max_id` without a body.
    pub fn first_missing(&self) -> Option<usize> {
        (1..=self.max_id()).find(|&id| self.get(id).is_none())
    }

    /// Writes header, objects in id order, xref table and trailer. Each
    /// object's offset is taken from the buffer length right before it is
    /// appended, so the xref can only be produced after every object is written.
    pub fn serialize(&self) -> Result<SerializedPdf, ReportError> {
        if let Some(id) = self.first_missing() {
            return Err(ReportError::MissingObject(id));
        }
        let max_id = self.max_id();

        let mut out: Vec<u8> = Vec::new();
        out.extend_from_slice(PDF_HEADER);
        out.extend_from_slice(PDF_BINARY_MARKER);

        let mut offsets = Vec::with_capacity(max_id);
        for id in 1..=max_id {
            let body = self.get(id).ok_or(ReportError::MissingObject(id))?;
            offsets.push(out.len());
            out.extend_from_slice(format!("{id} 0 obj\n").as_bytes());
            out.extend_from_slice(body.as_bytes());
            out.extend_from_slice(b"\nendobj\n");
        }

        let xref_start = out.len();
        out.extend_from_slice(format!("xref\n0 {}\n", max_id + 1).as_bytes());
        out.extend_from_slice(b"0000000000 65535 f \n");
        for offset in &offsets {
            out.extend_from_slice(format!("{offset:010} 00000 n \n").as_bytes());
        }
        out.extend_from_slice(
            format!(
                "trailer\n<< /Size {} /Root {} 0 R >>\nstartxref\n{}\n%%EOF",
                max_id + 1,
                CATALOG_ID,
                xref_start
            )
            .as_bytes(),
        );

        Ok(SerializedPdf {
            bytes: out,
            offsets,
            xref_start,
        })
    }
}

#[derive(Debug, Clone)]
pub struct SerializedPdf {
    pub bytes: Vec<u8>,
    /// `offsets[k - 1]` is where object `k` starts.
    pub offsets: Vec<usize>,
    pub xref_start: usize,
}

impl SerializedPdf {
    pub fn object_count(&self) -> usize {
        self.offsets.len()
    }
}

/// Page object ids in output order: 7, 9, 11, ... (content stream follows each).
pub fn page_object_ids(page_count: usize) -> Vec<usize> {
    (0..page_count).map(|i| FIRST_PAGE_ID + i * 2).collect()
}

/// Assigns every object of the document: fixed ids for catalog, page tree,
/// fonts and image, then a page/content pair per page. Image slots that are
/// not needed hold `null` so the id range stays contiguous.
pub fn build_object_graph(pages: &PageSet, image: Option<&DecodedImage>) -> ObjectGraph {
    let page_ids = page_object_ids(pages.len());
    let max_id = FIRST_PAGE_ID + pages.len() * 2 - 1;
    let mut graph = ObjectGraph::with_max_id(max_id.max(IMAGE_MASK_ID));

    graph.set(CATALOG_ID, format!("<< /Type /Catalog /Pages {PAGES_ID} 0 R >>"));
    let kids: Vec<String> = page_ids.iter().map(|id| format!("{id} 0 R")).collect();
    graph.set(
        PAGES_ID,
        format!(
            "<< /Type /Pages /Kids [{}] /Count {} >>",
            kids.join(" "),
            page_ids.len()
        ),
    );
    graph.set(FONT_REGULAR_ID, font_object(FontFace::Regular));
    graph.set(FONT_BOLD_ID, font_object(FontFace::Bold));

    match image {
        Some(image) => {
            let smask = image.alpha.as_ref().map(|alpha| {
                graph.set(
                    IMAGE_MASK_ID,
                    image_stream_object(image.width, image.height, "/DeviceGray", alpha, None),
                );
                IMAGE_MASK_ID
            });
            if smask.is_none() {
                graph.set(IMAGE_MASK_ID, "null");
            }
            graph.set(
                IMAGE_ID,
                image_stream_object(image.width, image.height, "/DeviceRGB", &image.rgb, smask),
            );
        }
        None => {
            graph.set(IMAGE_ID, "null");
            graph.set(IMAGE_MASK_ID, "null");
        }
    }

    let media_box = format!(
        "[0 0 {} {}]",
        fmt(pages.page_size.width),
        fmt(pages.page_size.height)
    );
    let xobjects = if image.is_some() {
        format!(" /XObject << /{IMAGE_RESOURCE} {IMAGE_ID} 0 R >>")
    } else {
        String::new()
    };
    for (page, &page_id) in pages.pages().iter().zip(&page_ids) {
        let content_id = page_id + 1;
        graph.set(
            content_id,
            stream_object(&render_page_content(page, image.is_some())),
        );
        graph.set(
            page_id,
            format!(
                "<< /Type /Page /Parent {PAGES_ID} 0 R /MediaBox {media_box} /Resources << /Font << /{} {FONT_REGULAR_ID} 0 R /{} {FONT_BOLD_ID} 0 R >>{xobjects} >> /Contents {content_id} 0 R >>",
                FontFace::Regular.resource_name(),
                FontFace::Bold.resource_name(),
            ),
        );
    }

    graph
}

pub fn build_document(
    pages: &PageSet,
    image: Option<&DecodedImage>,
) -> Result<SerializedPdf, ReportError> {
    build_object_graph(pages, image).serialize()
}

/// Operators for one page. Image paints are dropped when the document has no
/// image object to point at.
pub fn render_page_content(page: &Page, has_image: bool) -> String {
    let mut out = String::new();
    for command in &page.commands {
        match command {
            Command::DrawString {
                x,
                y,
                text,
                font,
                size,
                color,
            } => {
                out.push_str("BT\n");
                let _ = writeln!(out, "/{} {} Tf", font.resource_name(), fmt(*size));
                out.push_str(&color_to_pdf_fill(*color));
                let _ = writeln!(out, "{} {} Td", fmt(*x), fmt(*y));
                let _ = writeln!(out, "({}) Tj", escape_literal(text));
                out.push_str("ET\n");
            }
            Command::StrokeRect { rect, color } => {
                out.push_str(&color_to_pdf_stroke(*color));
                let _ = writeln!(out, "{} re S", rect_operands(rect));
            }
            Command::FillRect { rect, color } => {
                out.push_str(&color_to_pdf_fill(*color));
                let _ = writeln!(out, "{} re f", rect_operands(rect));
            }
            Command::DrawImage { rect } => {
                if !has_image {
                    continue;
                }
                out.push_str("q\n");
                let _ = writeln!(
                    out,
                    "{} 0 0 {} {} {} cm",
                    fmt(rect.width),
                    fmt(rect.height),
                    fmt(rect.x),
                    fmt(rect.y)
                );
                let _ = writeln!(out, "/{IMAGE_RESOURCE} Do");
                out.push_str("Q\n");
            }
        }
    }
    out
}

fn rect_operands(rect: &Rect) -> String {
    format!(
        "{} {} {} {}",
        fmt(rect.x),
        fmt(rect.y),
        fmt(rect.width),
        fmt(rect.height)
    )
}

fn font_object(face: FontFace) -> String {
    format!(
        "<< /Type /Font /Subtype /Type1 /BaseFont /{} /Encoding /WinAnsiEncoding >>",
        face.base_font()
    )
}

/// 8-bit image XObject, deflated then hex-encoded so the body stays ASCII.
fn image_stream_object(
    width: u32,
    height: u32,
    color_space: &str,
    samples: &[u8],
    smask_id: Option<usize>,
) -> String {
    let stream_data = encode_stream_data(&flate_compress(samples));
    let smask = smask_id
        .map(|id| format!(" /SMask {id} 0 R"))
        .unwrap_or_default();
    format!(
        "<< /Type /XObject /Subtype /Image /Width {width} /Height {height} /ColorSpace {color_space} /BitsPerComponent 8 /Filter [/ASCIIHexDecode /FlateDecode] /Length {}{smask} >>\nstream\n{stream_data}\nendstream",
        stream_data.len(),
    )
}

fn flate_compress(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    let _ = encoder.write_all(data);
    encoder.finish().unwrap_or_default()
}

fn encode_stream_data(data: &[u8]) -> String {
    let mut hex = ascii_hex_encode(data);
    hex.push('>');
    hex
}

fn ascii_hex_encode(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len() * 2 + data.len() / 32);
    for (index, byte) in data.iter().enumerate() {
        let _ = write!(out, "{byte:02X}");
        if index % 32 == 31 {
            out.push('\n');
        }
    }
    out
}

fn stream_object(content: &str) -> String {
    format!(
        "<< /Length {} >>\nstream\n{}\nendstream",
        content.len(),
        content
    )
}

/// Number operand rounded to three decimals, trailing zeros trimmed. Scaling
/// happens in f64 and saturates at the i64 range, so no operand can overflow.
pub(crate) fn fmt(value: f32) -> String {
    if !value.is_finite() {
        return "0".to_string();
    }
    let milli = (value as f64 * 1000.0).round();
    format_milli(milli.clamp(i64::MIN as f64, i64::MAX as f64) as i64)
}

fn format_milli(milli: i64) -> String {
    if milli == 0 {
        return "0".to_string();
    }
    let sign = if milli < 0 { "-" } else { "" };
    let abs = milli.unsigned_abs();
    let (int_part, frac_part) = (abs / 1000, abs % 1000);
    if frac_part == 0 {
        return format!("{sign}{int_part}");
    }
    let frac = format!("{frac_part:03}");
    format!("{sign}{int_part}.{}", frac.trim_end_matches('0'))
}

fn color_to_pdf_fill(color: Color) -> String {
    format!("{} {} {} rg\n", fmt(color.r), fmt(color.g), fmt(color.b))
}

fn color_to_pdf_stroke(color: Color) -> String {
    format!("{} {} {} RG\n", fmt(color.r), fmt(color.g), fmt(color.b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Size;
    use flate2::read::ZlibDecoder;
    use lopdf::Document as LoDocument;
    use proptest::prelude::*;
    use std::io::Read;

    fn text(y: f32, value: &str) -> Command {
        Command::DrawString {
            x: 36.0,
            y,
            text: value.to_string(),
            font: FontFace::Regular,
            size: 10.0,
            color: Color::BLACK,
        }
    }

    fn page_set(page_texts: &[&[&str]]) -> PageSet {
        let mut set = PageSet::new(Size::a4());
        for (idx, texts) in page_texts.iter().enumerate() {
            if idx > 0 {
                set.start_page();
            }
            for (line, value) in texts.iter().enumerate() {
                set.current_mut().push(text(800.0 - line as f32 * 14.0, value));
            }
        }
        set
    }

    fn logo_rect() -> Command {
        Command::DrawImage {
            rect: Rect {
                x: 400.0,
                y: 700.0,
                width: 70.0,
                height: 23.5,
            },
        }
    }

    fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
        haystack.windows(needle.len()).position(|w| w == needle)
    }

    /// Reads the xref table back out of the buffer via `startxref`.
    fn parse_xref(bytes: &[u8]) -> Vec<usize> {
        let marker = bytes
            .windows(10)
            .rposition(|w| w == b"startxref\n")
            .expect("startxref");
        let tail = std::str::from_utf8(&bytes[marker + 10..]).expect("ascii tail");
        let start: usize = tail.lines().next().expect("offset").trim().parse().expect("num");
        let text = std::str::from_utf8(&bytes[start..]).expect("ascii xref");
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("xref"));
        let header = lines.next().expect("subsection");
        let count: usize = header.split(' ').nth(1).expect("count").parse().expect("num");
        lines
            .take(count)
            .skip(1)
            .map(|entry| entry[..10].parse().expect("offset"))
            .collect()
    }

    fn stream_body<'a>(bytes: &'a [u8], id: usize) -> &'a [u8] {
        let start = find(bytes, format!("\n{id} 0 obj\n").as_bytes()).expect("object") + 1;
        let obj = &bytes[start..];
        let body_start = find(obj, b"stream\n").expect("stream") + 7;
        let body_end = find(obj, b"\nendstream").expect("endstream");
        &obj[body_start..body_end]
    }

    fn declared_length(bytes: &[u8], id: usize) -> usize {
        let start = find(bytes, format!("\n{id} 0 obj\n").as_bytes()).expect("object");
        let obj = String::from_utf8_lossy(&bytes[start..]);
        let at = obj.find("/Length ").expect("length") + 8;
        obj[at..]
            .split(|c: char| !c.is_ascii_digit())
            .next()
            .expect("digits")
            .parse()
            .expect("num")
    }

    fn unhex_inflate(body: &[u8]) -> Vec<u8> {
        let hex: Vec<u8> = body
            .iter()
            .copied()
            .filter(|b| !b.is_ascii_whitespace() && *b != b'>')
            .collect();
        let raw: Vec<u8> = hex
            .chunks(2)
            .map(|pair| u8::from_str_radix(std::str::from_utf8(pair).expect("ascii"), 16).expect("hex"))
            .collect();
        let mut out = Vec::new();
        ZlibDecoder::new(raw.as_slice())
            .read_to_end(&mut out)
            .expect("inflate");
        out
    }

    fn sample_image(alpha: bool) -> DecodedImage {
        DecodedImage {
            width: 4,
            height: 3,
            rgb: (0..36).map(|i| (i * 7) as u8).collect(),
            alpha: alpha.then(|| (0..12).map(|i| (i * 20) as u8).collect()),
        }
    }

    #[test]
    fn formats_numbers_compactly() {
        assert_eq!(fmt(0.0), "0");
        assert_eq!(fmt(36.0), "36");
        assert_eq!(fmt(0.975), "0.975");
        assert_eq!(fmt(11.2), "11.2");
        assert_eq!(fmt(-2.5), "-2.5");
        assert_eq!(fmt(f32::NAN), "0");
    }

    #[test]
    fn large_operands_do_not_overflow() {
        assert_eq!(fmt(3_000_000.0), "3000000");
        assert_eq!(fmt(-3_000_000.0), "-3000000");
        assert_eq!(fmt(f32::MAX), format_milli(i64::MAX));
        assert_eq!(fmt(f32::MIN), format_milli(i64::MIN));

        let set = PageSet::new(Size {
            width: 3_000_000.0,
            height: 842.0,
        });
        let pdf = build_document(&set, None).expect("pdf");
        assert!(find(&pdf.bytes, b"/MediaBox [0 0 3000000 842]").is_some());
    }

    #[test]
    fn single_page_without_image_has_expected_structure() {
        let set = page_set(&[&["Hola (mundo)"]]);
        let pdf = build_document(&set, None).expect("pdf");
        let bytes = &pdf.bytes;

        assert!(bytes.starts_with(b"%PDF-1.4\n"));
        assert!(bytes.ends_with(b"%%EOF"));
        assert_eq!(pdf.object_count(), 8);
        assert!(find(bytes, b"1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>").is_some());
        assert!(find(bytes, b"/Kids [7 0 R] /Count 1").is_some());
        assert!(find(bytes, b"5 0 obj\nnull\nendobj").is_some());
        assert!(find(bytes, b"6 0 obj\nnull\nendobj").is_some());
        assert!(find(bytes, b"/XObject").is_none());
        assert!(find(bytes, b"(Hola \\(mundo\\)) Tj").is_some());
        assert!(find(bytes, b"trailer\n<< /Size 9 /Root 1 0 R >>").is_some());
    }

    #[test]
    fn xref_points_at_object_headers() {
        let set = page_set(&[&["uno", "dos"], &["tres"], &["cuatro"]]);
        let pdf = build_document(&set, Some(&sample_image(true))).expect("pdf");
        let xref = parse_xref(&pdf.bytes);
        assert_eq!(xref, pdf.offsets);
        for (idx, offset) in xref.iter().enumerate() {
            let header = format!("{} 0 obj\n", idx + 1);
            assert!(
                pdf.bytes[*offset..].starts_with(header.as_bytes()),
                "object {} not at {}",
                idx + 1,
                offset
            );
        }
        let trailer = format!("startxref\n{}\n%%EOF", pdf.xref_start);
        assert!(pdf.bytes.ends_with(trailer.as_bytes()));
        assert!(pdf.bytes[pdf.xref_start..].starts_with(b"xref\n0 13\n"));
    }

    #[test]
    fn kids_follow_page_order() {
        let set = page_set(&[&["a"], &["b"], &["c"]]);
        let graph = build_object_graph(&set, None);
        assert_eq!(
            graph.get(PAGES_ID),
            Some("<< /Type /Pages /Kids [7 0 R 9 0 R 11 0 R] /Count 3 >>")
        );
        assert!(graph.get(7).expect("page").contains("/Contents 8 0 R"));
        assert!(graph.get(11).expect("page").contains("/Contents 12 0 R"));
        assert_eq!(graph.max_id(), 12);
    }

    #[test]
    fn content_stream_lengths_are_exact() {
        let set = page_set(&[&["\u{00C1}rbol", "a\\b"], &["x"]]);
        let pdf = build_document(&set, Some(&sample_image(false))).expect("pdf");
        for id in [IMAGE_ID, 8, 10] {
            assert_eq!(
                declared_length(&pdf.bytes, id),
                stream_body(&pdf.bytes, id).len(),
                "object {id}"
            );
        }
    }

    #[test]
    fn image_declarations_match_decoded_image() {
        let image = sample_image(true);
        let pdf = build_document(&page_set(&[&["x"]]), Some(&image)).expect("pdf");
        let text = String::from_utf8_lossy(&pdf.bytes);
        assert!(text.contains(
            "/Width 4 /Height 3 /ColorSpace /DeviceRGB /BitsPerComponent 8 /Filter [/ASCIIHexDecode /FlateDecode]"
        ));
        assert!(text.contains("/SMask 6 0 R"));
        assert!(text.contains("/ColorSpace /DeviceGray"));
        assert!(text.contains("/XObject << /ImLogo 5 0 R >>"));
        assert_eq!(unhex_inflate(stream_body(&pdf.bytes, IMAGE_ID)), image.rgb);
        assert_eq!(
            unhex_inflate(stream_body(&pdf.bytes, IMAGE_MASK_ID)),
            image.alpha.clone().expect("alpha")
        );
    }

    #[test]
    fn opaque_image_has_no_mask() {
        let pdf = build_document(&page_set(&[&["x"]]), Some(&sample_image(false))).expect("pdf");
        assert!(find(&pdf.bytes, b"/SMask").is_none());
        assert!(find(&pdf.bytes, b"6 0 obj\nnull\nendobj").is_some());
    }

    #[test]
    fn image_paint_is_dropped_without_image_object() {
        let mut page = Page::new();
        page.push(logo_rect());
        assert_eq!(render_page_content(&page, false), "");
        assert_eq!(
            render_page_content(&page, true),
            "q\n70 0 0 23.5 400 700 cm\n/ImLogo Do\nQ\n"
        );
    }

    #[test]
    fn rect_operators() {
        let mut page = Page::new();
        let rect = Rect {
            x: 36.0,
            y: 600.0,
            width: 523.0,
            height: 132.0,
        };
        page.push(Command::FillRect {
            rect,
            color: Color::rgb(0.975, 0.988, 1.0),
        });
        page.push(Command::StrokeRect {
            rect,
            color: Color::rgb(0.77, 0.82, 0.91),
        });
        assert_eq!(
            render_page_content(&page, false),
            "0.975 0.988 1 rg\n36 600 523 132 re f\n0.77 0.82 0.91 RG\n36 600 523 132 re S\n"
        );
    }

    #[test]
    fn missing_object_is_reported() {
        let mut graph = ObjectGraph::with_max_id(3);
        graph.set(1, "<< >>");
        graph.set(3, "<< >>");
        match graph.serialize() {
            Err(ReportError::MissingObject(id)) => assert_eq!(id, 2),
            other => panic!("expected missing object, got {other:?}"),
        }
    }

    #[test]
    fn lopdf_reads_generated_document() {
        let set = page_set(&[&["uno"], &["dos"]]);
        let pdf = build_document(&set, Some(&sample_image(true))).expect("pdf");
        let doc = LoDocument::load_mem(&pdf.bytes).expect("lopdf load");
        assert_eq!(doc.get_pages().len(), 2);
        let size = doc
            .trailer
            .get(b"Size")
            .and_then(|obj| obj.as_i64())
            .expect("size");
        assert_eq!(size, pdf.object_count() as i64 + 1);
    }

    proptest! {
        #[test]
        fn xref_matches_object_positions_for_any_page_set(
            pages in proptest::collection::vec(
                proptest::collection::vec("[ -~]{0,60}", 0..6),
                1..5,
            ),
            with_image in any::<bool>(),
        ) {
            let mut set = PageSet::new(Size::a4());
            for (idx, lines) in pages.iter().enumerate() {
                if idx > 0 {
                    set.start_page();
                }
                for (n, line) in lines.iter().enumerate() {
                    set.current_mut().push(text(780.0 - n as f32 * 12.0, line));
                }
            }
            let image = sample_image(true);
            let pdf = build_document(&set, with_image.then_some(&image)).unwrap();
            let xref = parse_xref(&pdf.bytes);
            prop_assert_eq!(xref.len(), FIRST_PAGE_ID - 1 + pages.len() * 2);
            for (idx, offset) in xref.iter().enumerate() {
                let header = format!("{} 0 obj\n", idx + 1);
                prop_assert!(pdf.bytes[*offset..].starts_with(header.as_bytes()));
            }
            for page in 0..pages.len() {
                let content_id = FIRST_PAGE_ID + page * 2 + 1;
                prop_assert_eq!(
                    declared_length(&pdf.bytes, content_id),
                    stream_body(&pdf.bytes, content_id).len()
                );
            }
        }
    }
}
