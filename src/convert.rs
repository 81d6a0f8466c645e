//! Raw word to physical unit conversions
//!
//! Copyright 2019 Ryan Kurte

const WORD_SCALE: f32 = 65536.0;

/// CO2 concentration in ppm, the raw word is already in ppm
pub fn co2_ppm(raw: u16) -> u16 {
    raw
}

/// Temperature in degrees celsius
pub fn temperature_c(raw: u16) -> f32 {
    -45.0 + 175.0 * raw as f32 / WORD_SCALE
}

/// Relative humidity in percent
/// Note this reaches just under 100% at `u16::MAX` and is not clamped
pub fn humidity_pct(raw: u16) -> f32 {
    100.0 * raw as f32 / WORD_SCALE
}

/// Encode a temperature offset in degrees celsius, saturating at the word limits
pub fn temperature_offset_word(offset: f32) -> u16 {
    (offset * WORD_SCALE / 175.0) as u16
}

/// Decode a temperature offset word into degrees celsius
pub fn temperature_offset_c(raw: u16) -> f32 {
    175.0 * raw as f32 / WORD_SCALE
}

/// Encode ambient pressure in Pa into the device's hPa word, saturating
pub fn pressure_word(pressure_pa: u32) -> u16 {
    u16::try_from(pressure_pa / 100).unwrap_or(u16::MAX)
}

#[cfg(test)]
mod test {
    use assert_approx_eq::assert_approx_eq;

    use super::*;

    #[test]
    fn test_co2_identity() {
        assert_eq!(co2_ppm(0), 0);
        assert_eq!(co2_ppm(450), 450);
        assert_eq!(co2_ppm(u16::MAX), u16::MAX);
    }

    #[test]
    fn test_temperature_bounds() {
        assert_eq!(temperature_c(0), -45.0);
        assert_approx_eq!(temperature_c(65535), 129.997, 0.001);
        // Datasheet example, 0x6667 -> 25 C
        assert_approx_eq!(temperature_c(0x6667), 25.0, 0.01);
    }

    #[test]
    fn test_humidity_bounds() {
        assert_eq!(humidity_pct(0), 0.0);
        assert_approx_eq!(humidity_pct(65535), 99.998, 0.001);
        // Datasheet example, 0x5eb9 -> 37 %
        assert_approx_eq!(humidity_pct(0x5eb9), 37.0, 0.01);
    }

    #[test]
    fn test_temperature_offset() {
        // Datasheet example, 5.4 C -> 0x07E6
        assert_eq!(temperature_offset_word(5.4), 0x07E6);
        assert_approx_eq!(temperature_offset_c(0x0912), 6.2, 0.01);
        assert_eq!(temperature_offset_word(-1.0), 0);
    }

    #[test]
    fn test_pressure() {
        assert_eq!(pressure_word(98_700), 987);
        assert_eq!(pressure_word(u32::MAX), u16::MAX);
    }
}
