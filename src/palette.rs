//! Color parsing. Config colors are sRGB hex strings; shaders work in linear RGB.

use crate::error::ConfigError;

/// Background clear color (`#000502`).
pub const BACKGROUND: &str = "#000502";

/// Parse `#rrggbb` (leading `#` optional) into linear RGB.
pub fn parse_hex_color(hex: &str) -> Result<[f32; 3], ConfigError> {
    let digits = hex.strip_prefix('#').unwrap_or(hex);
    if digits.len() != 6 || !digits.is_ascii() {
        return Err(ConfigError::InvalidColor(hex.to_string()));
    }

    let mut rgb = [0.0; 3];
    for (i, channel) in rgb.iter_mut().enumerate() {
        let byte = u8::from_str_radix(&digits[i * 2..i * 2 + 2], 16)
            .map_err(|_| ConfigError::InvalidColor(hex.to_string()))?;
        *channel = srgb_to_linear(byte as f32 / 255.0);
    }
    Ok(rgb)
}

/// Standard sRGB transfer function, inverse direction.
pub fn srgb_to_linear(c: f32) -> f32 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}
