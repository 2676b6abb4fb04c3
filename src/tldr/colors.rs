use rand::Rng;
use rand::seq::SliceRandom;

const COLOR_STEP: usize = 0x33;
const MIN_BRIGHTNESS: f64 = 40.0;
const MAX_BRIGHTNESS: f64 = 200.0;
const DARK_TEXT_ABOVE: f64 = 125.0;
const FALLBACK_COLOR: &str = "007BFF";

pub const BLACK: &str = "000000";
pub const WHITE: &str = "FFFFFF";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelColors {
    pub fg_color: String,
    pub bg_color: String,
}

/// Perceived brightness on a 0..=255 scale.
pub fn brightness(r: u8, g: u8, b: u8) -> f64 {
    (f64::from(r) * 299.0 + f64::from(g) * 587.0 + f64::from(b) * 114.0) / 1000.0
}

pub fn foreground_for_brightness(value: f64) -> &'static str {
    if value > DARK_TEXT_ABOVE { BLACK } else { WHITE }
}

fn parse_hex_color(hex: &str) -> Option<(u8, u8, u8)> {
    let hex = hex.trim().trim_start_matches('#');
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }
    let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
    let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
    let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
    Some((r, g, b))
}

/// Readable text color for a background, or `None` if `bg` is not 6 hex digits.
pub fn contrast_for(bg: &str) -> Option<&'static str> {
    let (r, g, b) = parse_hex_color(bg)?;
    Some(foreground_for_brightness(brightness(r, g, b)))
}

fn build_palette() -> Vec<String> {
    let mut palette = Vec::new();
    for r in (0..=0xFF).step_by(COLOR_STEP) {
        for g in (0..=0xFF).step_by(COLOR_STEP) {
            for b in (0..=0xFF).step_by(COLOR_STEP) {
                let (r, g, b) = (r as u8, g as u8, b as u8);
                let value = brightness(r, g, b);
                if value > MIN_BRIGHTNESS && value < MAX_BRIGHTNESS {
                    palette.push(format!("{r:02X}{g:02X}{b:02X}"));
                }
            }
        }
    }
    if palette.is_empty() {
        palette.push(FALLBACK_COLOR.to_string());
    }
    palette
}

/// Owns the label palette; build one per process (or per test) and share it by reference.
#[derive(Debug, Clone)]
pub struct LabelColorAllocator {
    palette: Vec<String>,
}

impl Default for LabelColorAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl LabelColorAllocator {
    pub fn new() -> Self {
        Self {
            palette: build_palette(),
        }
    }

    pub fn palette(&self) -> &[String] {
        &self.palette
    }

    pub fn random_colors(&self) -> LabelColors {
        self.random_colors_with(&mut rand::thread_rng())
    }

    pub fn random_colors_with<R: Rng + ?Sized>(&self, rng: &mut R) -> LabelColors {
        let bg_color = self
            .palette
            .choose(rng)
            .cloned()
            .unwrap_or_else(|| FALLBACK_COLOR.to_string());
        let fg_color = contrast_for(&bg_color).unwrap_or(WHITE).to_string();
        LabelColors { fg_color, bg_color }
    }
}
