use crate::error::PngError;
use flate2::read::ZlibDecoder;
use std::io::Read;

const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

const COLOR_GRAY: u8 = 0;
const COLOR_RGB: u8 = 2;
const COLOR_RGBA: u8 = 6;

/// Raw pixels repacked for the PDF writer: `rgb` is always 3 bytes per pixel,
/// `alpha` (RGBA sources only) 1 byte per pixel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub rgb: Vec<u8>,
    pub alpha: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Copy)]
struct Header {
    width: u32,
    height: u32,
    bit_depth: u8,
    color_type: u8,
    interlace: u8,
}

fn read_u32_be(data: &[u8], at: usize) -> Result<u32, PngError> {
    let bytes = data.get(at..at + 4).ok_or(PngError::Truncated)?;
    Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// Decodes an 8-bit, non-interlaced grayscale, RGB or RGBA PNG. Every other
/// combination is rejected rather than approximated.
pub fn decode_png(data: &[u8]) -> Result<DecodedImage, PngError> {
    if data.len() < PNG_SIGNATURE.len() || data[..PNG_SIGNATURE.len()] != PNG_SIGNATURE {
        return Err(PngError::InvalidSignature);
    }

    let mut offset = PNG_SIGNATURE.len();
    let mut header: Option<Header> = None;
    let mut idat: Vec<u8> = Vec::new();

    while offset < data.len() {
        let length = read_u32_be(data, offset)? as usize;
        let kind = data.get(offset + 4..offset + 8).ok_or(PngError::Truncated)?;
        let body_start = offset + 8;
        let body_end = body_start.checked_add(length).ok_or(PngError::Truncated)?;
        let body = data.get(body_start..body_end).ok_or(PngError::Truncated)?;
        // Skip the CRC; a damaged stream surfaces as an inflate or length error.
        offset = body_end + 4;

        match kind {
            b"IHDR" => {
                if body.len() < 13 {
                    return Err(PngError::MissingHeader);
                }
                header = Some(Header {
                    width: read_u32_be(body, 0)?,
                    height: read_u32_be(body, 4)?,
                    bit_depth: body[8],
                    color_type: body[9],
                    interlace: body[12],
                });
            }
            b"IDAT" => idat.extend_from_slice(body),
            b"IEND" => break,
            _ => {}
        }
    }

    let header = match header {
        Some(h) if h.width > 0 && h.height > 0 => h,
        _ => return Err(PngError::MissingHeader),
    };
    if header.interlace != 0 {
        return Err(PngError::InterlaceUnsupported(header.interlace));
    }
    if header.bit_depth != 8 {
        return Err(PngError::BitDepthUnsupported(header.bit_depth));
    }
    let channels = match header.color_type {
        COLOR_GRAY => 1usize,
        COLOR_RGB => 3,
        COLOR_RGBA => 4,
        other => return Err(PngError::ColorTypeUnsupported(other)),
    };

    let width = header.width as usize;
    let height = header.height as usize;
    let stride = width.checked_mul(channels).ok_or(PngError::Truncated)?;
    let expected = stride
        .checked_add(1)
        .and_then(|row| row.checked_mul(height))
        .ok_or(PngError::Truncated)?;

    let mut inflated = Vec::with_capacity(expected.min(idat.len().saturating_mul(4)));
    ZlibDecoder::new(idat.as_slice())
        .read_to_end(&mut inflated)
        .map_err(PngError::Inflate)?;
    if inflated.len() < expected {
        return Err(PngError::Truncated);
    }

    let pixels = unfilter_scanlines(&inflated[..expected], stride, channels, height)?;
    let (rgb, alpha) = repack(&pixels, header.color_type);

    Ok(DecodedImage {
        width: header.width,
        height: header.height,
        rgb,
        alpha,
    })
}

/// Reverses the per-row filters. `filtered` holds `height` rows of one filter
/// byte followed by `stride` bytes. Each row is reconstructed against the
/// already reconstructed row above it, so rows are processed strictly in order.
pub(crate) fn unfilter_scanlines(
    filtered: &[u8],
    stride: usize,
    bpp: usize,
    height: usize,
) -> Result<Vec<u8>, PngError> {
    if filtered.len() < (stride + 1) * height {
        return Err(PngError::Truncated);
    }
    let mut out = vec![0u8; stride * height];

    for row in 0..height {
        let src = &filtered[row * (stride + 1)..(row + 1) * (stride + 1)];
        let filter = src[0];
        let raw = &src[1..];
        let (done, rest) = out.split_at_mut(row * stride);
        let prev: Option<&[u8]> = if row > 0 {
            Some(&done[(row - 1) * stride..])
        } else {
            None
        };
        let cur = &mut rest[..stride];

        for x in 0..stride {
            let left = if x >= bpp { cur[x - bpp] } else { 0 };
            let up = prev.map(|p| p[x]).unwrap_or(0);
            let up_left = match prev {
                Some(p) if x >= bpp => p[x - bpp],
                _ => 0,
            };
            let predicted = match filter {
                0 => 0,
                1 => left,
                2 => up,
                3 => ((left as u16 + up as u16) / 2) as u8,
                4 => paeth(left, up, up_left),
                other => return Err(PngError::UnknownFilter(other)),
            };
            cur[x] = raw[x].wrapping_add(predicted);
        }
    }

    Ok(out)
}

/// Picks whichever of left, above, upper-left is closest to
/// `left + above - upper_left`; ties go to left, then above.
pub(crate) fn paeth(left: u8, up: u8, up_left: u8) -> u8 {
    let p = left as i16 + up as i16 - up_left as i16;
    let pa = (p - left as i16).abs();
    let pb = (p - up as i16).abs();
    let pc = (p - up_left as i16).abs();
    if pa <= pb && pa <= pc {
        left
    } else if pb <= pc {
        up
    } else {
        up_left
    }
}

fn repack(pixels: &[u8], color_type: u8) -> (Vec<u8>, Option<Vec<u8>>) {
    match color_type {
        COLOR_RGB => (pixels.to_vec(), None),
        COLOR_RGBA => {
            let count = pixels.len() / 4;
            let mut rgb = Vec::with_capacity(count * 3);
            let mut alpha = Vec::with_capacity(count);
            for px in pixels.chunks_exact(4) {
                rgb.extend_from_slice(&px[..3]);
                alpha.push(px[3]);
            }
            (rgb, Some(alpha))
        }
        _ => {
            let mut rgb = Vec::with_capacity(pixels.len() * 3);
            for &v in pixels {
                rgb.extend_from_slice(&[v, v, v]);
            }
            (rgb, None)
        }
    }
}
