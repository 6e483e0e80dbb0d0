//! Multi-line text rendering onto NV12 planes.
//!
//! Two render paths share the same blending rules: TrueType through the
//! shared [`FontSet`], and a built-in 8x8 bitmap font used when no face can
//! be loaded. Glyph pixels are alpha-blended onto the Y plane per pixel and
//! onto the UV plane once per 2x2 block; the optional background box uses a
//! single-level alpha.

use rusttype::{point, Scale};

use crate::overlay::font::{FaceKind, FontSet, BASE_FONT_SIZE};

/// Mutable view of the NV12 planes a text block is drawn onto.
pub struct Planes<'a> {
    pub y: &'a mut [u8],
    pub uv: &'a mut [u8],
    pub y_stride: usize,
    pub uv_stride: usize,
    /// Visible frame geometry; the planes may carry alignment padding
    /// beyond it.
    pub width: u32,
    pub height: u32,
}

/// Colours and geometry of one text block.
pub struct TextStyle {
    pub scale: u32,
    /// Foreground (y, u, v).
    pub fg: (u8, u8, u8),
    /// Background box (y, u, v, alpha); `None` skips the box.
    pub bg: Option<(u8, u8, u8, u8)>,
    pub padding: u32,
}

const GLYPH_SIDE: u32 = 8;

/// Measure a text block: TrueType metrics when a face is available, the
/// bitmap cell grid otherwise.
pub fn measure(fonts: &FontSet, face: FaceKind, text: &str, scale: u32) -> (u32, u32) {
    fonts
        .with_face(face, |font| {
            let px = BASE_FONT_SIZE * scale as f32;
            let rt_scale = Scale::uniform(px);
            let v = font.v_metrics(rt_scale);
            let line_h = (v.ascent - v.descent + v.line_gap).ceil().max(1.0);
            let mut max_w = 0f32;
            let mut lines = 0u32;
            for line in text.split('\n') {
                lines += 1;
                let glyphs: Vec<_> = font.layout(line, rt_scale, point(0.0, 0.0)).collect();
                let w = glyphs
                    .last()
                    .map(|g| g.position().x + g.unpositioned().h_metrics().advance_width)
                    .unwrap_or(0.0);
                max_w = max_w.max(w);
            }
            (max_w.ceil() as u32, (lines as f32 * line_h).ceil() as u32)
        })
        .unwrap_or_else(|| measure_bitmap(text, scale))
}

fn measure_bitmap(text: &str, scale: u32) -> (u32, u32) {
    let mut max_chars = 0u32;
    let mut lines = 0u32;
    for line in text.split('\n') {
        lines += 1;
        max_chars = max_chars.max(line.chars().count() as u32);
    }
    (max_chars * GLYPH_SIDE * scale, lines * GLYPH_SIDE * scale)
}

/// Draw one text block with its top-left box corner at `(x, y)`.
///
/// The reserve box is the measured text plus padding on every side, clamped
/// so it stays fully in-frame. The box background (if any) is drawn first,
/// then the glyphs.
pub fn draw_block(
    planes: &mut Planes<'_>,
    fonts: &FontSet,
    face: FaceKind,
    x: u32,
    y: u32,
    text: &str,
    style: &TextStyle,
) {
    let scale = style.scale.max(1);
    let (tw, th) = measure(fonts, face, text, scale);
    if tw == 0 || th == 0 {
        return;
    }
    let box_w = (tw + 2 * style.padding).min(planes.width);
    let box_h = (th + 2 * style.padding).min(planes.height);
    let x = x.min(planes.width - box_w);
    let y = y.min(planes.height - box_h);

    if let Some(bg) = style.bg {
        draw_box(planes, x, y, box_w, box_h, bg);
    }

    let ox = x + style.padding;
    let oy = y + style.padding;
    let drew_ttf = fonts
        .with_face(face, |font| {
            draw_ttf(planes, font, ox, oy, text, scale, style.fg);
        })
        .is_some();
    if !drew_ttf {
        draw_bitmap(planes, ox, oy, text, scale, style.fg);
    }
}

/// Background box blend: `out = (alpha * bg + (256 - alpha) * cur) >> 8` on
/// all three components. UV is touched once per 2x2 block.
fn draw_box(planes: &mut Planes<'_>, x: u32, y: u32, w: u32, h: u32, bg: (u8, u8, u8, u8)) {
    let (bg_y, bg_u, bg_v, alpha) = bg;
    let a = alpha as u32;
    let na = 256 - a;
    for row in y..(y + h).min(planes.height) {
        let off = row as usize * planes.y_stride;
        for col in x..(x + w).min(planes.width) {
            let cur = planes.y[off + col as usize] as u32;
            planes.y[off + col as usize] = ((a * bg_y as u32 + na * cur) >> 8) as u8;
        }
    }
    let mut row = y & !1;
    while row < (y + h).min(planes.height) {
        let off = (row / 2) as usize * planes.uv_stride;
        let mut col = x & !1;
        while col < (x + w).min(planes.width) {
            let ui = off + col as usize;
            let cur_u = planes.uv[ui] as u32;
            let cur_v = planes.uv[ui + 1] as u32;
            planes.uv[ui] = ((a * bg_u as u32 + na * cur_u) >> 8) as u8;
            planes.uv[ui + 1] = ((a * bg_v as u32 + na * cur_v) >> 8) as u8;
            col += 2;
        }
        row += 2;
    }
}

/// Glyph pixel blend: `out = (alpha * fg + (255 - alpha) * cur) / 255` on Y;
/// the UV pair of the enclosing 2x2 block is blended when the pixel sits at
/// even coordinates.
fn blend_glyph_pixel(planes: &mut Planes<'_>, px: u32, py: u32, alpha: u8, fg: (u8, u8, u8)) {
    if px >= planes.width || py >= planes.height {
        return;
    }
    let a = alpha as u32;
    let na = 255 - a;
    let yi = py as usize * planes.y_stride + px as usize;
    let cur = planes.y[yi] as u32;
    planes.y[yi] = ((a * fg.0 as u32 + na * cur) / 255) as u8;

    if px % 2 == 0 && py % 2 == 0 {
        let ui = (py / 2) as usize * planes.uv_stride + px as usize;
        let cur_u = planes.uv[ui] as u32;
        let cur_v = planes.uv[ui + 1] as u32;
        planes.uv[ui] = ((a * fg.1 as u32 + na * cur_u) / 255) as u8;
        planes.uv[ui + 1] = ((a * fg.2 as u32 + na * cur_v) / 255) as u8;
    }
}

fn draw_ttf(
    planes: &mut Planes<'_>,
    font: &rusttype::Font<'_>,
    ox: u32,
    oy: u32,
    text: &str,
    scale: u32,
    fg: (u8, u8, u8),
) {
    let px_size = BASE_FONT_SIZE * scale as f32;
    let rt_scale = Scale::uniform(px_size);
    let v = font.v_metrics(rt_scale);
    let line_h = (v.ascent - v.descent + v.line_gap).ceil().max(1.0);

    for (li, line) in text.split('\n').enumerate() {
        let baseline = oy as f32 + li as f32 * line_h + v.ascent;
        // Collect first: the rasterisation callback needs `planes` mutable.
        let glyphs: Vec<_> = font
            .layout(line, rt_scale, point(ox as f32, baseline))
            .collect();
        for glyph in glyphs {
            let Some(bb) = glyph.pixel_bounding_box() else {
                continue;
            };
            glyph.draw(|gx, gy, coverage| {
                let px = bb.min.x + gx as i32;
                let py = bb.min.y + gy as i32;
                if px < 0 || py < 0 {
                    return;
                }
                let alpha = (coverage * 255.0).round() as u8;
                if alpha > 0 {
                    blend_glyph_pixel(planes, px as u32, py as u32, alpha, fg);
                }
            });
        }
    }
}

fn draw_bitmap(
    planes: &mut Planes<'_>,
    ox: u32,
    oy: u32,
    text: &str,
    scale: u32,
    fg: (u8, u8, u8),
) {
    for (li, line) in text.split('\n').enumerate() {
        let line_top = oy + li as u32 * GLYPH_SIDE * scale;
        for (ci, ch) in line.chars().enumerate() {
            let Some(glyph) = bitmap_glyph(ch) else {
                continue;
            };
            let glyph_left = ox + ci as u32 * GLYPH_SIDE * scale;
            for (gy, bits) in glyph.iter().enumerate() {
                for gx in 0..GLYPH_SIDE {
                    if bits & (1 << gx) == 0 {
                        continue;
                    }
                    // Replicate each font pixel scale x scale times.
                    for sy in 0..scale {
                        for sx in 0..scale {
                            blend_glyph_pixel(
                                planes,
                                glyph_left + gx * scale + sx,
                                line_top + gy as u32 * scale + sy,
                                255,
                                fg,
                            );
                        }
                    }
                }
            }
        }
    }
}

fn bitmap_glyph(ch: char) -> Option<&'static [u8; 8]> {
    let code = ch as usize;
    if (0x20..=0x7E).contains(&code) {
        Some(&FONT8X8_BASIC[code - 0x20])
    } else {
        None
    }
}

// Classic public-domain 8x8 bitmap font, printable ASCII. Bit 0 of each row
// byte is the leftmost pixel.
#[rustfmt::skip]
const FONT8X8_BASIC: [[u8; 8]; 95] = [
    [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00], // ' '
    [0x18, 0x3C, 0x3C, 0x18, 0x18, 0x00, 0x18, 0x00], // '!'
    [0x36, 0x36, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00], // '"'
    [0x36, 0x36, 0x7F, 0x36, 0x7F, 0x36, 0x36, 0x00], // '#'
    [0x0C, 0x3E, 0x03, 0x1E, 0x30, 0x1F, 0x0C, 0x00], // '$'
    [0x00, 0x63, 0x33, 0x18, 0x0C, 0x66, 0x63, 0x00], // '%'
    [0x1C, 0x36, 0x1C, 0x6E, 0x3B, 0x33, 0x6E, 0x00], // '&'
    [0x06, 0x06, 0x03, 0x00, 0x00, 0x00, 0x00, 0x00], // '\''
    [0x18, 0x0C, 0x06, 0x06, 0x06, 0x0C, 0x18, 0x00], // '('
    [0x06, 0x0C, 0x18, 0x18, 0x18, 0x0C, 0x06, 0x00], // ')'
    [0x00, 0x66, 0x3C, 0xFF, 0x3C, 0x66, 0x00, 0x00], // '*'
    [0x00, 0x0C, 0x0C, 0x3F, 0x0C, 0x0C, 0x00, 0x00], // '+'
    [0x00, 0x00, 0x00, 0x00, 0x00, 0x0C, 0x0C, 0x06], // ','
    [0x00, 0x00, 0x00, 0x3F, 0x00, 0x00, 0x00, 0x00], // '-'
    [0x00, 0x00, 0x00, 0x00, 0x00, 0x0C, 0x0C, 0x00], // '.'
    [0x60, 0x30, 0x18, 0x0C, 0x06, 0x03, 0x01, 0x00], // '/'
    [0x3E, 0x63, 0x73, 0x7B, 0x6F, 0x67, 0x3E, 0x00], // '0'
    [0x0C, 0x0E, 0x0C, 0x0C, 0x0C, 0x0C, 0x3F, 0x00], // '1'
    [0x1E, 0x33, 0x30, 0x1C, 0x06, 0x33, 0x3F, 0x00], // '2'
    [0x1E, 0x33, 0x30, 0x1C, 0x30, 0x33, 0x1E, 0x00], // '3'
    [0x38, 0x3C, 0x36, 0x33, 0x7F, 0x30, 0x78, 0x00], // '4'
    [0x3F, 0x03, 0x1F, 0x30, 0x30, 0x33, 0x1E, 0x00], // '5'
    [0x1C, 0x06, 0x03, 0x1F, 0x33, 0x33, 0x1E, 0x00], // '6'
    [0x3F, 0x33, 0x30, 0x18, 0x0C, 0x0C, 0x0C, 0x00], // '7'
    [0x1E, 0x33, 0x33, 0x1E, 0x33, 0x33, 0x1E, 0x00], // '8'
    [0x1E, 0x33, 0x33, 0x3E, 0x30, 0x18, 0x0E, 0x00], // '9'
    [0x00, 0x0C, 0x0C, 0x00, 0x00, 0x0C, 0x0C, 0x00], // ':'
    [0x00, 0x0C, 0x0C, 0x00, 0x00, 0x0C, 0x0C, 0x06], // ';'
    [0x18, 0x0C, 0x06, 0x03, 0x06, 0x0C, 0x18, 0x00], // '<'
    [0x00, 0x00, 0x3F, 0x00, 0x00, 0x3F, 0x00, 0x00], // '='
    [0x06, 0x0C, 0x18, 0x30, 0x18, 0x0C, 0x06, 0x00], // '>'
    [0x1E, 0x33, 0x30, 0x18, 0x0C, 0x00, 0x0C, 0x00], // '?'
    [0x3E, 0x63, 0x7B, 0x7B, 0x7B, 0x03, 0x1E, 0x00], // '@'
    [0x0C, 0x1E, 0x33, 0x33, 0x3F, 0x33, 0x33, 0x00], // 'A'
    [0x3F, 0x66, 0x66, 0x3E, 0x66, 0x66, 0x3F, 0x00], // 'B'
    [0x3C, 0x66, 0x03, 0x03, 0x03, 0x66, 0x3C, 0x00], // 'C'
    [0x1F, 0x36, 0x66, 0x66, 0x66, 0x36, 0x1F, 0x00], // 'D'
    [0x7F, 0x46, 0x16, 0x1E, 0x16, 0x46, 0x7F, 0x00], // 'E'
    [0x7F, 0x46, 0x16, 0x1E, 0x16, 0x06, 0x0F, 0x00], // 'F'
    [0x3C, 0x66, 0x03, 0x03, 0x73, 0x66, 0x7C, 0x00], // 'G'
    [0x33, 0x33, 0x33, 0x3F, 0x33, 0x33, 0x33, 0x00], // 'H'
    [0x1E, 0x0C, 0x0C, 0x0C, 0x0C, 0x0C, 0x1E, 0x00], // 'I'
    [0x78, 0x30, 0x30, 0x30, 0x33, 0x33, 0x1E, 0x00], // 'J'
    [0x67, 0x66, 0x36, 0x1E, 0x36, 0x66, 0x67, 0x00], // 'K'
    [0x0F, 0x06, 0x06, 0x06, 0x46, 0x66, 0x7F, 0x00], // 'L'
    [0x63, 0x77, 0x7F, 0x7F, 0x6B, 0x63, 0x63, 0x00], // 'M'
    [0x63, 0x67, 0x6F, 0x7B, 0x73, 0x63, 0x63, 0x00], // 'N'
    [0x1C, 0x36, 0x63, 0x63, 0x63, 0x36, 0x1C, 0x00], // 'O'
    [0x3F, 0x66, 0x66, 0x3E, 0x06, 0x06, 0x0F, 0x00], // 'P'
    [0x1E, 0x33, 0x33, 0x33, 0x3B, 0x1E, 0x38, 0x00], // 'Q'
    [0x3F, 0x66, 0x66, 0x3E, 0x36, 0x66, 0x67, 0x00], // 'R'
    [0x1E, 0x33, 0x07, 0x0E, 0x38, 0x33, 0x1E, 0x00], // 'S'
    [0x3F, 0x2D, 0x0C, 0x0C, 0x0C, 0x0C, 0x1E, 0x00], // 'T'
    [0x33, 0x33, 0x33, 0x33, 0x33, 0x33, 0x3F, 0x00], // 'U'
    [0x33, 0x33, 0x33, 0x33, 0x33, 0x1E, 0x0C, 0x00], // 'V'
    [0x63, 0x63, 0x63, 0x6B, 0x7F, 0x77, 0x63, 0x00], // 'W'
    [0x63, 0x63, 0x36, 0x1C, 0x1C, 0x36, 0x63, 0x00], // 'X'
    [0x33, 0x33, 0x33, 0x1E, 0x0C, 0x0C, 0x1E, 0x00], // 'Y'
    [0x7F, 0x63, 0x31, 0x18, 0x4C, 0x66, 0x7F, 0x00], // 'Z'
    [0x1E, 0x06, 0x06, 0x06, 0x06, 0x06, 0x1E, 0x00], // '['
    [0x03, 0x06, 0x0C, 0x18, 0x30, 0x60, 0x40, 0x00], // '\\'
    [0x1E, 0x18, 0x18, 0x18, 0x18, 0x18, 0x1E, 0x00], // ']'
    [0x08, 0x1C, 0x36, 0x63, 0x00, 0x00, 0x00, 0x00], // '^'
    [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xFF], // '_'
    [0x0C, 0x0C, 0x18, 0x00, 0x00, 0x00, 0x00, 0x00], // '`'
    [0x00, 0x00, 0x1E, 0x30, 0x3E, 0x33, 0x6E, 0x00], // 'a'
    [0x07, 0x06, 0x06, 0x3E, 0x66, 0x66, 0x3B, 0x00], // 'b'
    [0x00, 0x00, 0x1E, 0x33, 0x03, 0x33, 0x1E, 0x00], // 'c'
    [0x38, 0x30, 0x30, 0x3E, 0x33, 0x33, 0x6E, 0x00], // 'd'
    [0x00, 0x00, 0x1E, 0x33, 0x3F, 0x03, 0x1E, 0x00], // 'e'
    [0x1C, 0x36, 0x06, 0x0F, 0x06, 0x06, 0x0F, 0x00], // 'f'
    [0x00, 0x00, 0x6E, 0x33, 0x33, 0x3E, 0x30, 0x1F], // 'g'
    [0x07, 0x06, 0x36, 0x6E, 0x66, 0x66, 0x67, 0x00], // 'h'
    [0x0C, 0x00, 0x0E, 0x0C, 0x0C, 0x0C, 0x1E, 0x00], // 'i'
    [0x30, 0x00, 0x30, 0x30, 0x30, 0x33, 0x33, 0x1E], // 'j'
    [0x07, 0x06, 0x66, 0x36, 0x1E, 0x36, 0x67, 0x00], // 'k'
    [0x0E, 0x0C, 0x0C, 0x0C, 0x0C, 0x0C, 0x1E, 0x00], // 'l'
    [0x00, 0x00, 0x33, 0x7F, 0x7F, 0x6B, 0x63, 0x00], // 'm'
    [0x00, 0x00, 0x1F, 0x33, 0x33, 0x33, 0x33, 0x00], // 'n'
    [0x00, 0x00, 0x1E, 0x33, 0x33, 0x33, 0x1E, 0x00], // 'o'
    [0x00, 0x00, 0x3B, 0x66, 0x66, 0x3E, 0x06, 0x0F], // 'p'
    [0x00, 0x00, 0x6E, 0x33, 0x33, 0x3E, 0x30, 0x78], // 'q'
    [0x00, 0x00, 0x3B, 0x6E, 0x66, 0x06, 0x0F, 0x00], // 'r'
    [0x00, 0x00, 0x3E, 0x03, 0x1E, 0x30, 0x1F, 0x00], // 's'
    [0x08, 0x0C, 0x3E, 0x0C, 0x0C, 0x2C, 0x18, 0x00], // 't'
    [0x00, 0x00, 0x33, 0x33, 0x33, 0x33, 0x6E, 0x00], // 'u'
    [0x00, 0x00, 0x33, 0x33, 0x33, 0x1E, 0x0C, 0x00], // 'v'
    [0x00, 0x00, 0x63, 0x6B, 0x7F, 0x7F, 0x36, 0x00], // 'w'
    [0x00, 0x00, 0x63, 0x36, 0x1C, 0x36, 0x63, 0x00], // 'x'
    [0x00, 0x00, 0x33, 0x33, 0x33, 0x3E, 0x30, 0x1F], // 'y'
    [0x00, 0x00, 0x3F, 0x19, 0x0C, 0x26, 0x3F, 0x00], // 'z'
    [0x38, 0x0C, 0x0C, 0x07, 0x0C, 0x0C, 0x38, 0x00], // '{'
    [0x18, 0x18, 0x18, 0x00, 0x18, 0x18, 0x18, 0x00], // '|'
    [0x07, 0x0C, 0x0C, 0x38, 0x0C, 0x0C, 0x07, 0x00], // '}'
    [0x6E, 0x3B, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00], // '~'
];

#[cfg(test)]
mod tests {
    use super::*;
    use mj_scale::align16;

    fn planes_for(buf: &mut [u8], w: u32, h: u32) -> Planes<'_> {
        let stride = align16(w) as usize;
        let ver = align16(h) as usize;
        let (y, uv) = buf.split_at_mut(stride * ver);
        Planes {
            y,
            uv,
            y_stride: stride,
            uv_stride: stride,
            width: w,
            height: h,
        }
    }

    #[test]
    fn bitmap_measure_uses_8px_cells() {
        assert_eq!(measure_bitmap("abc", 1), (24, 8));
        assert_eq!(measure_bitmap("ab\ncdef", 2), (64, 32));
        assert_eq!(measure_bitmap("", 1), (0, 8));
    }

    #[test]
    fn background_box_blend_is_exact() {
        // Full alpha replaces, zero alpha is a no-op.
        let mut buf = vec![0u8; 32 * 32 + 32 * 16];
        buf[..32 * 32].fill(100);
        buf[32 * 32..].fill(128);
        let mut planes = planes_for(&mut buf, 32, 32);
        draw_box(&mut planes, 0, 0, 8, 8, (200, 128, 128, 255));
        // (255*200 + 1*100) >> 8 == 199: one step below the target is the
        // closest the 256-denominator blend gets.
        assert_eq!(buf[0], 199);

        let mut buf2 = vec![100u8; 32 * 32 + 32 * 16];
        let mut planes = planes_for(&mut buf2, 32, 32);
        draw_box(&mut planes, 0, 0, 8, 8, (200, 128, 128, 0));
        assert_eq!(buf2[0], 100);
    }

    #[test]
    fn scaled_bitmap_glyphs_replicate_pixels() {
        let mut small = vec![16u8; 64 * 64 + 64 * 32];
        let mut planes = planes_for(&mut small, 64, 64);
        draw_bitmap(&mut planes, 0, 0, "!", 1, (235, 128, 128));
        let lit_1x: usize = small[..64 * 64].iter().filter(|&&b| b == 235).count();

        let mut big = vec![16u8; 64 * 64 + 64 * 32];
        let mut planes = planes_for(&mut big, 64, 64);
        draw_bitmap(&mut planes, 0, 0, "!", 2, (235, 128, 128));
        let lit_2x: usize = big[..64 * 64].iter().filter(|&&b| b == 235).count();

        assert!(lit_1x > 0);
        assert_eq!(lit_2x, lit_1x * 4);
    }

    #[test]
    fn glyph_blend_writes_uv_on_even_coordinates_only() {
        let mut buf = vec![16u8; 16 * 16 + 16 * 8];
        buf[16 * 16..].fill(128);
        let mut planes = planes_for(&mut buf, 16, 16);
        blend_glyph_pixel(&mut planes, 2, 2, 255, (235, 90, 240));
        blend_glyph_pixel(&mut planes, 3, 3, 255, (235, 90, 240));
        let uv = &buf[16 * 16..];
        // (2,2) hit its block's UV pair; (3,3) left its block alone.
        assert_eq!(uv[1 * 16 + 2], 90);
        assert_eq!(uv[1 * 16 + 3], 240);
        // Neighbouring block untouched by the odd-coordinate pixel.
        assert_eq!(uv[1 * 16 + 4], 128);
    }
}
