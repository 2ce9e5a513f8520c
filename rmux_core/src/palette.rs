//! Color palette — 270-entry RGB table with OSC 4/10/11 overrides.
//!
//! Indices 0–255 are the xterm palette (16 ANSI + 6×6×6 cube + grayscale
//! ramp); the remaining entries are the semantic colors `vte::ansi::NamedColor`
//! points at (default foreground/background, cursor, dim variants).

use vte::ansi::{NamedColor, Rgb};

pub const NUM_COLORS: usize = 270;

/// Standard xterm ANSI colors 0–15.
const ANSI: [Rgb; 16] = [
    Rgb { r: 0x00, g: 0x00, b: 0x00 },
    Rgb { r: 0xcd, g: 0x00, b: 0x00 },
    Rgb { r: 0x00, g: 0xcd, b: 0x00 },
    Rgb { r: 0xcd, g: 0xcd, b: 0x00 },
    Rgb { r: 0x00, g: 0x00, b: 0xee },
    Rgb { r: 0xcd, g: 0x00, b: 0xcd },
    Rgb { r: 0x00, g: 0xcd, b: 0xcd },
    Rgb { r: 0xe5, g: 0xe5, b: 0xe5 },
    Rgb { r: 0x7f, g: 0x7f, b: 0x7f },
    Rgb { r: 0xff, g: 0x00, b: 0x00 },
    Rgb { r: 0x00, g: 0xff, b: 0x00 },
    Rgb { r: 0xff, g: 0xff, b: 0x00 },
    Rgb { r: 0x5c, g: 0x5c, b: 0xff },
    Rgb { r: 0xff, g: 0x00, b: 0xff },
    Rgb { r: 0x00, g: 0xff, b: 0xff },
    Rgb { r: 0xff, g: 0xff, b: 0xff },
];

const DEFAULT_FG: Rgb = Rgb { r: 0xe5, g: 0xe5, b: 0xe5 };
const DEFAULT_BG: Rgb = Rgb { r: 0x00, g: 0x00, b: 0x00 };

#[derive(Debug, Clone)]
pub struct Palette {
    colors: [Rgb; NUM_COLORS],
    defaults: [Rgb; NUM_COLORS],
}

impl Default for Palette {
    fn default() -> Self {
        Self::new()
    }
}

impl Palette {
    pub fn new() -> Self {
        let mut colors = [Rgb { r: 0, g: 0, b: 0 }; NUM_COLORS];

        colors[..16].copy_from_slice(&ANSI);

        // 16-231: 6x6x6 color cube.
        for r in 0..6u8 {
            for g in 0..6u8 {
                for b in 0..6u8 {
                    let idx = 16 + (r as usize * 36) + (g as usize * 6) + b as usize;
                    colors[idx] = Rgb {
                        r: if r == 0 { 0 } else { 55 + r * 40 },
                        g: if g == 0 { 0 } else { 55 + g * 40 },
                        b: if b == 0 { 0 } else { 55 + b * 40 },
                    };
                }
            }
        }

        // 232-255: grayscale ramp.
        for i in 0..24u8 {
            let v = 8 + i * 10;
            colors[232 + i as usize] = Rgb { r: v, g: v, b: v };
        }

        colors[NamedColor::Foreground as usize] = DEFAULT_FG;
        colors[NamedColor::Background as usize] = DEFAULT_BG;
        colors[NamedColor::Cursor as usize] = DEFAULT_FG;
        colors[NamedColor::BrightForeground as usize] = DEFAULT_FG;

        // Dim variants of ANSI 0-7.
        for i in 0..8 {
            colors[NamedColor::DimBlack as usize + i] = dim(colors[i]);
        }
        colors[NamedColor::DimForeground as usize] = dim(DEFAULT_FG);

        let defaults = colors;
        Self { colors, defaults }
    }

    /// Resolve a palette index to RGB. Out-of-range indices fall back to
    /// the default foreground.
    pub fn color(&self, index: usize) -> Rgb {
        self.colors.get(index).copied().unwrap_or(DEFAULT_FG)
    }

    pub fn default_fg(&self) -> Rgb {
        self.colors[NamedColor::Foreground as usize]
    }

    pub fn default_bg(&self) -> Rgb {
        self.colors[NamedColor::Background as usize]
    }

    pub fn cursor_color(&self) -> Rgb {
        self.colors[NamedColor::Cursor as usize]
    }

    /// OSC 4/10/11/12: override one palette entry.
    pub fn set_color(&mut self, index: usize, color: Rgb) {
        if let Some(slot) = self.colors.get_mut(index) {
            *slot = color;
        }
    }

    /// OSC 104/110/111: restore one palette entry to its default.
    pub fn reset_color(&mut self, index: usize) {
        if index < NUM_COLORS {
            self.colors[index] = self.defaults[index];
        }
    }
}

/// Reduce a color to roughly two thirds intensity.
fn dim(c: Rgb) -> Rgb {
    Rgb {
        r: (c.r as u16 * 2 / 3) as u8,
        g: (c.g as u16 * 2 / 3) as u8,
        b: (c.b as u16 * 2 / 3) as u8,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ansi_red_is_red() {
        let p = Palette::new();
        assert_eq!(p.color(1), Rgb { r: 0xcd, g: 0, b: 0 });
    }

    #[test]
    fn cube_corners() {
        let p = Palette::new();
        assert_eq!(p.color(16), Rgb { r: 0, g: 0, b: 0 });
        assert_eq!(p.color(231), Rgb { r: 255, g: 255, b: 255 });
    }

    #[test]
    fn grayscale_ramp_monotonic() {
        let p = Palette::new();
        for i in 232..255 {
            assert!(p.color(i).r < p.color(i + 1).r);
        }
    }

    #[test]
    fn set_and_reset_color() {
        let mut p = Palette::new();
        let red = Rgb { r: 255, g: 0, b: 0 };
        p.set_color(4, red);
        assert_eq!(p.color(4), red);
        p.reset_color(4);
        assert_eq!(p.color(4), Rgb { r: 0x00, g: 0x00, b: 0xee });
    }

    #[test]
    fn out_of_range_index_falls_back() {
        let p = Palette::new();
        assert_eq!(p.color(100_000), p.default_fg());
    }

    #[test]
    fn dim_variants_are_darker() {
        let p = Palette::new();
        let white = p.color(7);
        let dim_white = p.color(NamedColor::DimWhite as usize);
        assert!(dim_white.r < white.r);
    }
}
