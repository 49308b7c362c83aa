//! Window title text in the top decoration bar

use std::collections::HashMap;

use crate::geometry::{Point, Rect};

use super::draw::PixelBuffer;

/// Font size at buffer scale 1
const TITLE_FONT_SIZE: f32 = 14.0;

pub struct TitleRenderer {
    font: fontdue::Font,

    glyph_cache: HashMap<(char, u32), GlyphData>,
}

struct GlyphData {
    bitmap: Vec<u8>,
    width: i32,
    height: i32,
    x_offset: i32,
    y_offset: i32,
    advance: f32,
}

impl TitleRenderer {
    /// Common font search paths
    const FONT_SEARCH_PATHS: &'static [&'static str] = &[
        "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
        "/usr/share/fonts/TTF/DejaVuSans.ttf",
        "/usr/share/fonts/dejavu/DejaVuSans.ttf",
        "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
        "/usr/share/fonts/liberation-sans/LiberationSans-Regular.ttf",
        "/usr/share/fonts/truetype/noto/NotoSans-Regular.ttf",
        "/usr/share/fonts/noto/NotoSans-Regular.ttf",
    ];

    fn find_font() -> Option<(fontdue::Font, &'static str)> {
        Self::FONT_SEARCH_PATHS.iter().find_map(|&path| {
            let data = std::fs::read(path).ok()?;
            let font =
                fontdue::Font::from_bytes(data.as_slice(), fontdue::FontSettings::default()).ok()?;
            Some((font, path))
        })
    }

    /// `None` when no usable font is installed; the bar is then drawn without text
    pub fn load() -> Option<Self> {
        match Self::find_font() {
            Some((font, path)) => {
                tracing::info!(path, "loaded decoration title font");
                Some(Self::from_font(font))
            }
            None => {
                tracing::warn!("no font found, window title will not be drawn");
                None
            }
        }
    }

    pub fn from_font(font: fontdue::Font) -> Self {
        Self {
            font,
            glyph_cache: HashMap::new(),
        }
    }

    /// Draw `text` left-aligned into `area`, stopping at the first glyph
    /// that would not fit
    ///
    /// Returns the width actually used.
    pub fn draw(
        &mut self,
        buffer: &mut PixelBuffer,
        text: &str,
        area: Rect,
        color: u32,
        scale: i32,
    ) -> i32 {
        let origin = area.p1;
        let (max_width, height) = (area.width(), area.height());
        let font_size = TITLE_FONT_SIZE * scale.max(1) as f32;
        let baseline = origin.y + (height as f32 * 0.75) as i32;
        let buffer_size = buffer.size();
        let mut pen = 0.0f32;

        for c in text.chars() {
            let font = &self.font;
            let glyph = self
                .glyph_cache
                .entry((c, font_size.to_bits()))
                .or_insert_with(|| {
                    let (metrics, bitmap) = font.rasterize(c, font_size);
                    GlyphData {
                        bitmap,
                        width: metrics.width as i32,
                        height: metrics.height as i32,
                        x_offset: metrics.xmin,
                        y_offset: metrics.ymin,
                        advance: metrics.advance_width,
                    }
                });

            if pen + glyph.advance > max_width as f32 {
                break;
            }

            let glyph_x = origin.x + pen as i32 + glyph.x_offset;
            let glyph_y = baseline - glyph.height - glyph.y_offset;
            for gy in 0..glyph.height {
                let py = glyph_y + gy;
                if py < origin.y || py >= origin.y + height || py >= buffer_size.height {
                    continue;
                }
                for gx in 0..glyph.width {
                    let px = glyph_x + gx;
                    if px < 0 || px >= buffer_size.width {
                        continue;
                    }
                    let alpha = glyph.bitmap[(gy * glyph.width + gx) as usize];
                    if alpha == 0 {
                        continue;
                    }
                    // Bounds were checked above
                    let _ = buffer.blend(Point::new(px, py), color, alpha);
                }
            }

            pen += glyph.advance;
        }

        pen as i32
    }
}
