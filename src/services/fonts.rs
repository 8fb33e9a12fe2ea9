// Best-effort font resolution for overlay text
//
// Composition must never fail for want of a font: strategies are tried in
// order and the final one (an embedded 5x7 bitmap face) always succeeds.

use ab_glyph::FontVec;
use image::{Rgba, RgbaImage};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Scalable font paths probed when no configured font is usable
const WELL_KNOWN_FONT_PATHS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// A usable overlay font
pub enum ResolvedFont {
    /// A real scalable font loaded from disk
    Scalable(FontVec),
    /// The embedded bitmap face; ugly but unconditionally available
    Builtin(BitmapFont),
}

/// One step of the resolution chain
enum FontStrategy {
    ConfiguredPath(PathBuf),
    WellKnownPaths,
    Builtin,
}

/// Ordered font-resolution strategies, first success wins
pub struct FontResolver {
    strategies: Vec<FontStrategy>,
}

impl FontResolver {
    pub fn new(configured_path: Option<&str>) -> Self {
        let mut strategies = Vec::new();
        if let Some(path) = configured_path {
            strategies.push(FontStrategy::ConfiguredPath(PathBuf::from(path)));
        }
        strategies.push(FontStrategy::WellKnownPaths);
        strategies.push(FontStrategy::Builtin);
        Self { strategies }
    }

    /// Resolve a font. Cannot fail: the builtin strategy terminates the chain.
    pub fn resolve(&self) -> ResolvedFont {
        for strategy in &self.strategies {
            match strategy {
                FontStrategy::ConfiguredPath(path) => match load_scalable(path) {
                    Some(font) => {
                        info!("using configured font: {}", path.display());
                        return ResolvedFont::Scalable(font);
                    }
                    None => warn!("configured font unusable: {}", path.display()),
                },
                FontStrategy::WellKnownPaths => {
                    for candidate in WELL_KNOWN_FONT_PATHS {
                        if let Some(font) = load_scalable(Path::new(candidate)) {
                            info!("using system font: {}", candidate);
                            return ResolvedFont::Scalable(font);
                        }
                        debug!("font not usable: {}", candidate);
                    }
                }
                FontStrategy::Builtin => {
                    info!("no scalable font found, falling back to builtin bitmap font");
                    return ResolvedFont::Builtin(BitmapFont);
                }
            }
        }
        ResolvedFont::Builtin(BitmapFont)
    }
}

fn load_scalable(path: &Path) -> Option<FontVec> {
    let data = std::fs::read(path).ok()?;
    FontVec::try_from_vec(data).ok()
}

/// Embedded 5x7 monochrome ASCII face. Each glyph is five column bytes,
/// bit 0 at the top row. Characters outside 0x20..=0x7E render as '?'.
#[derive(Debug, Clone, Copy)]
pub struct BitmapFont;

impl BitmapFont {
    pub const GLYPH_WIDTH: u32 = 5;
    pub const GLYPH_HEIGHT: u32 = 7;
    /// Column advance including one column of spacing
    pub const ADVANCE: u32 = Self::GLYPH_WIDTH + 1;

    pub fn glyph(c: char) -> &'static [u8; 5] {
        let index = (c as usize)
            .checked_sub(0x20)
            .filter(|i| *i < GLYPHS.len())
            .unwrap_or(('?' as usize) - 0x20);
        &GLYPHS[index]
    }
}

/// Draw `text` with the builtin bitmap face, top-left anchored at (x, y).
/// The glyph grid is integer-scaled so the rendered height approximates
/// `height_px`. Pixels outside the canvas are clipped.
pub fn draw_bitmap_text(
    canvas: &mut RgbaImage,
    color: Rgba<u8>,
    x: u32,
    y: u32,
    height_px: f32,
    text: &str,
) {
    let scale = ((height_px / BitmapFont::GLYPH_HEIGHT as f32).round() as u32).max(1);
    let (canvas_w, canvas_h) = canvas.dimensions();
    let mut pen_x = x;

    for c in text.chars() {
        if pen_x >= canvas_w {
            break;
        }

        let glyph = BitmapFont::glyph(c);
        for (col, bits) in glyph.iter().enumerate() {
            for row in 0..BitmapFont::GLYPH_HEIGHT {
                if bits & (1 << row) == 0 {
                    continue;
                }
                let block_x = pen_x + col as u32 * scale;
                let block_y = y + row * scale;
                for dy in 0..scale {
                    for dx in 0..scale {
                        let px = block_x + dx;
                        let py = block_y + dy;
                        if px < canvas_w && py < canvas_h {
                            canvas.put_pixel(px, py, color);
                        }
                    }
                }
            }
        }

        pen_x = pen_x.saturating_add(BitmapFont::ADVANCE * scale);
    }
}

/// Classic 5x7 face covering ASCII 0x20..=0x7E
#[rustfmt::skip]
const GLYPHS: [[u8; 5]; 95] = [
    [0x00, 0x00, 0x00, 0x00, 0x00], // ' '
    [0x00, 0x00, 0x5F, 0x00, 0x00], // '!'
    [0x00, 0x07, 0x00, 0x07, 0x00], // '"'
    [0x14, 0x7F, 0x14, 0x7F, 0x14], // '#'
    [0x24, 0x2A, 0x7F, 0x2A, 0x12], // '$'
    [0x23, 0x13, 0x08, 0x64, 0x62], // '%'
    [0x36, 0x49, 0x55, 0x22, 0x50], // '&'
    [0x00, 0x05, 0x03, 0x00, 0x00], // '\''
    [0x00, 0x1C, 0x22, 0x41, 0x00], // '('
    [0x00, 0x41, 0x22, 0x1C, 0x00], // ')'
    [0x08, 0x2A, 0x1C, 0x2A, 0x08], // '*'
    [0x08, 0x08, 0x3E, 0x08, 0x08], // '+'
    [0x00, 0x50, 0x30, 0x00, 0x00], // ','
    [0x08, 0x08, 0x08, 0x08, 0x08], // '-'
    [0x00, 0x60, 0x60, 0x00, 0x00], // '.'
    [0x20, 0x10, 0x08, 0x04, 0x02], // '/'
    [0x3E, 0x51, 0x49, 0x45, 0x3E], // '0'
    [0x00, 0x42, 0x7F, 0x40, 0x00], // '1'
    [0x42, 0x61, 0x51, 0x49, 0x46], // '2'
    [0x21, 0x41, 0x45, 0x4B, 0x31], // '3'
    [0x18, 0x14, 0x12, 0x7F, 0x10], // '4'
    [0x27, 0x45, 0x45, 0x45, 0x39], // '5'
    [0x3C, 0x4A, 0x49, 0x49, 0x30], // '6'
    [0x01, 0x71, 0x09, 0x05, 0x03], // '7'
    [0x36, 0x49, 0x49, 0x49, 0x36], // '8'
    [0x06, 0x49, 0x49, 0x29, 0x1E], // '9'
    [0x00, 0x36, 0x36, 0x00, 0x00], // ':'
    [0x00, 0x56, 0x36, 0x00, 0x00], // ';'
    [0x00, 0x08, 0x14, 0x22, 0x41], // '<'
    [0x14, 0x14, 0x14, 0x14, 0x14], // '='
    [0x41, 0x22, 0x14, 0x08, 0x00], // '>'
    [0x02, 0x01, 0x51, 0x09, 0x06], // '?'
    [0x32, 0x49, 0x79, 0x41, 0x3E], // '@'
    [0x7E, 0x11, 0x11, 0x11, 0x7E], // 'A'
    [0x7F, 0x49, 0x49, 0x49, 0x36], // 'B'
    [0x3E, 0x41, 0x41, 0x41, 0x22], // 'C'
    [0x7F, 0x41, 0x41, 0x22, 0x1C], // 'D'
    [0x7F, 0x49, 0x49, 0x49, 0x41], // 'E'
    [0x7F, 0x09, 0x09, 0x09, 0x01], // 'F'
    [0x3E, 0x41, 0x41, 0x51, 0x32], // 'G'
    [0x7F, 0x08, 0x08, 0x08, 0x7F], // 'H'
    [0x00, 0x41, 0x7F, 0x41, 0x00], // 'I'
    [0x20, 0x40, 0x41, 0x3F, 0x01], // 'J'
    [0x7F, 0x08, 0x14, 0x22, 0x41], // 'K'
    [0x7F, 0x40, 0x40, 0x40, 0x40], // 'L'
    [0x7F, 0x02, 0x0C, 0x02, 0x7F], // 'M'
    [0x7F, 0x04, 0x08, 0x10, 0x7F], // 'N'
    [0x3E, 0x41, 0x41, 0x41, 0x3E], // 'O'
    [0x7F, 0x09, 0x09, 0x09, 0x06], // 'P'
    [0x3E, 0x41, 0x51, 0x21, 0x5E], // 'Q'
    [0x7F, 0x09, 0x19, 0x29, 0x46], // 'R'
    [0x46, 0x49, 0x49, 0x49, 0x31], // 'S'
    [0x01, 0x01, 0x7F, 0x01, 0x01], // 'T'
    [0x3F, 0x40, 0x40, 0x40, 0x3F], // 'U'
    [0x1F, 0x20, 0x40, 0x20, 0x1F], // 'V'
    [0x3F, 0x40, 0x38, 0x40, 0x3F], // 'W'
    [0x63, 0x14, 0x08, 0x14, 0x63], // 'X'
    [0x07, 0x08, 0x70, 0x08, 0x07], // 'Y'
    [0x61, 0x51, 0x49, 0x45, 0x43], // 'Z'
    [0x00, 0x7F, 0x41, 0x41, 0x00], // '['
    [0x02, 0x04, 0x08, 0x10, 0x20], // '\\'
    [0x00, 0x41, 0x41, 0x7F, 0x00], // ']'
    [0x04, 0x02, 0x01, 0x02, 0x04], // '^'
    [0x40, 0x40, 0x40, 0x40, 0x40], // '_'
    [0x00, 0x01, 0x02, 0x04, 0x00], // '`'
    [0x20, 0x54, 0x54, 0x54, 0x78], // 'a'
    [0x7F, 0x48, 0x44, 0x44, 0x38], // 'b'
    [0x38, 0x44, 0x44, 0x44, 0x20], // 'c'
    [0x38, 0x44, 0x44, 0x48, 0x7F], // 'd'
    [0x38, 0x54, 0x54, 0x54, 0x18], // 'e'
    [0x08, 0x7E, 0x09, 0x01, 0x02], // 'f'
    [0x0C, 0x52, 0x52, 0x52, 0x3E], // 'g'
    [0x7F, 0x08, 0x04, 0x04, 0x78], // 'h'
    [0x00, 0x44, 0x7D, 0x40, 0x00], // 'i'
    [0x20, 0x40, 0x44, 0x3D, 0x00], // 'j'
    [0x7F, 0x10, 0x28, 0x44, 0x00], // 'k'
    [0x00, 0x41, 0x7F, 0x40, 0x00], // 'l'
    [0x7C, 0x04, 0x18, 0x04, 0x78], // 'm'
    [0x7C, 0x08, 0x04, 0x04, 0x78], // 'n'
    [0x38, 0x44, 0x44, 0x44, 0x38], // 'o'
    [0x7C, 0x14, 0x14, 0x14, 0x08], // 'p'
    [0x08, 0x14, 0x14, 0x18, 0x7C], // 'q'
    [0x7C, 0x08, 0x04, 0x04, 0x08], // 'r'
    [0x48, 0x54, 0x54, 0x54, 0x20], // 's'
    [0x04, 0x3F, 0x44, 0x40, 0x20], // 't'
    [0x3C, 0x40, 0x40, 0x20, 0x7C], // 'u'
    [0x1C, 0x20, 0x40, 0x20, 0x1C], // 'v'
    [0x3C, 0x40, 0x30, 0x40, 0x3C], // 'w'
    [0x44, 0x28, 0x10, 0x28, 0x44], // 'x'
    [0x0C, 0x50, 0x50, 0x50, 0x3C], // 'y'
    [0x44, 0x64, 0x54, 0x4C, 0x44], // 'z'
    [0x00, 0x08, 0x36, 0x41, 0x00], // '{'
    [0x00, 0x00, 0x7F, 0x00, 0x00], // '|'
    [0x00, 0x41, 0x36, 0x08, 0x00], // '}'
    [0x08, 0x04, 0x08, 0x10, 0x08], // '~'
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolver_always_produces_a_font() {
        let resolver = FontResolver::new(Some("/definitely/not/a/font.ttf"));
        // Either a system font or the builtin face; never a failure.
        let _font = resolver.resolve();
    }

    #[test]
    fn builtin_is_terminal_strategy() {
        let resolver = FontResolver {
            strategies: vec![FontStrategy::Builtin],
        };
        assert!(matches!(resolver.resolve(), ResolvedFont::Builtin(_)));
    }

    #[test]
    fn unknown_glyphs_fall_back_to_question_mark() {
        assert_eq!(BitmapFont::glyph('Ê'), BitmapFont::glyph('?'));
        assert_eq!(BitmapFont::glyph('A'), &GLYPHS[('A' as usize) - 0x20]);
    }

    #[test]
    fn bitmap_draw_clips_at_canvas_edge() {
        let mut canvas = RgbaImage::from_pixel(10, 10, Rgba([255, 255, 255, 255]));
        // Start near the edge; must not panic
        draw_bitmap_text(&mut canvas, Rgba([0, 0, 0, 255]), 8, 8, 20.0, "WW");
    }

    #[test]
    fn bitmap_draw_marks_pixels() {
        let mut canvas = RgbaImage::from_pixel(40, 20, Rgba([255, 255, 255, 255]));
        draw_bitmap_text(&mut canvas, Rgba([0, 0, 0, 255]), 0, 0, 7.0, "!");
        // '!' at scale 1 is a vertical bar in column 2
        assert_eq!(canvas.get_pixel(2, 0), &Rgba([0, 0, 0, 255]));
        assert_eq!(canvas.get_pixel(0, 0), &Rgba([255, 255, 255, 255]));
    }
}
