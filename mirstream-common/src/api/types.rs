//! Shared API request/response types

use serde::{Deserialize, Serialize};

/// Features computed for one audio block
///
/// `index` is the dense position in the result store (0, 1, 2, ...).
/// `block_index` is the physical block sequence number assigned when the block was
/// produced; it equals `index` unless blocks were dropped on a full queue.
///
/// # Examples
///
/// ```
/// use mirstream_common::api::types::FeatureRecord;
///
/// let record = FeatureRecord {
///     index: 0,
///     block_index: 0,
///     zcr: 0.12,
///     dominant_frequency: 430.66,
/// };
/// let json = serde_json::to_value(&record).unwrap();
/// assert_eq!(json["index"], 0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureRecord {
    /// Position in the result store
    pub index: u64,
    /// Physical block sequence number
    pub block_index: u64,
    /// Zero-crossing rate (0.0-1.0)
    pub zcr: f32,
    /// Dominant frequency in Hz
    pub dominant_frequency: f32,
}

/// Single-feature response for `GET /get_zcr/{index}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZcrResponse {
    pub index: u64,
    pub zcr: f32,
}

/// Single-feature response for `GET /get_dom_freq/{index}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DominantFrequencyResponse {
    pub index: u64,
    pub dominant_frequency: f32,
}

/// Error body returned with non-2xx responses
///
/// ```json
/// {"error": "Index 12 is out of range or no features available"}
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

/// Plain acknowledgment body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_record_roundtrip_field_names() {
        let record = FeatureRecord {
            index: 4,
            block_index: 5,
            zcr: 0.5,
            dominant_frequency: 1000.0,
        };
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"block_index\":5"));
        assert!(json.contains("\"dominant_frequency\":1000.0"));

        let parsed: FeatureRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, record);
    }

    #[test]
    fn test_error_response() {
        let body = ErrorResponse::new("nope");
        assert_eq!(serde_json::to_value(&body).unwrap()["error"], "nope");
    }
}
