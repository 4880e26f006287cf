//! Zero-crossing rate

/// Magnitudes at or below this are treated as zero
pub const ZERO_THRESHOLD: f32 = 1e-10;

/// Fraction of adjacent sample pairs whose signs differ.
///
/// Zero counts as positive. Returns `None` for blocks shorter than 2 samples.
pub fn zero_crossing_rate(block: &[f32]) -> Option<f32> {
    if block.len() < 2 {
        return None;
    }

    let crossings = block
        .windows(2)
        .filter(|pair| is_negative(pair[0]) != is_negative(pair[1]))
        .count();

    Some(crossings as f32 / (block.len() - 1) as f32)
}

#[inline]
fn is_negative(sample: f32) -> bool {
    sample.abs() > ZERO_THRESHOLD && sample < 0.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_block() {
        assert_eq!(zero_crossing_rate(&[0.5; 64]), Some(0.0));
        assert_eq!(zero_crossing_rate(&[-0.5; 64]), Some(0.0));
        assert_eq!(zero_crossing_rate(&[0.0; 64]), Some(0.0));
    }

    #[test]
    fn test_alternating_block() {
        let block: Vec<f32> = (0..100).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
        assert_eq!(zero_crossing_rate(&block), Some(1.0));
    }

    #[test]
    fn test_zero_is_positive() {
        // 0 -> -1 crosses, -1 -> 0 crosses, 0 -> 1 does not
        assert_eq!(zero_crossing_rate(&[0.0, -1.0, 0.0, 1.0]), Some(2.0 / 3.0));
    }

    #[test]
    fn test_tiny_negative_treated_as_zero() {
        assert_eq!(zero_crossing_rate(&[1.0, -1e-12, 1.0]), Some(0.0));
    }

    #[test]
    fn test_too_short() {
        assert_eq!(zero_crossing_rate(&[]), None);
        assert_eq!(zero_crossing_rate(&[1.0]), None);
    }

    #[test]
    fn test_sine_rate() {
        // 100 Hz at 8 kHz: 200 crossings per second, 8000 samples
        let block: Vec<f32> = (0..8000)
            .map(|i| (2.0 * std::f32::consts::PI * 100.0 * (i as f32 + 0.5) / 8000.0).sin())
            .collect();
        let zcr = zero_crossing_rate(&block).unwrap();
        assert!((zcr - 200.0 / 7999.0).abs() < 1e-3, "zcr = {}", zcr);
    }
}
