//! Versioned JSON envelopes for persisted engine state.
//!
//! Every persisted document is wrapped in `{version, data}`. A version
//! mismatch on read is not an error: the caller silently falls back to
//! defaults. There is no migration machinery.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Envelope wrapping persisted data with its schema version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionedRecord<T> {
    /// Schema version of `data`.
    pub version: u32,
    /// The persisted payload.
    pub data: T,
}

/// Serialize `data` into a versioned JSON document.
///
/// Serialization of engine state types cannot fail in practice; an error
/// here indicates a programming bug, so it is surfaced as `None` and logged
/// by callers rather than propagated.
pub fn encode_versioned<T: Serialize>(version: u32, data: &T) -> Option<String> {
    serde_json::to_string(&VersionedRecord { version, data }).ok()
}

/// Decode a versioned JSON document.
///
/// Returns `None` when the document fails to parse or its version does not
/// match `expected` — callers fall back to their defaults in both cases.
pub fn decode_versioned<T: DeserializeOwned>(raw: &str, expected: u32) -> Option<T> {
    let record: VersionedRecord<T> = match serde_json::from_str(raw) {
        Ok(record) => record,
        Err(e) => {
            debug!(error = %e, "Discarding unparseable persisted record");
            return None;
        }
    };

    if record.version != expected {
        debug!(
            found = record.version,
            expected, "Discarding persisted record with mismatched version"
        );
        return None;
    }

    Some(record.data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Sample {
        count: u32,
    }

    #[test]
    fn test_versioned_roundtrip() {
        let encoded = encode_versioned(3, &Sample { count: 7 }).unwrap();
        let decoded: Sample = decode_versioned(&encoded, 3).unwrap();
        assert_eq!(decoded, Sample { count: 7 });
    }

    #[test]
    fn test_version_mismatch_falls_back() {
        let encoded = encode_versioned(1, &Sample { count: 7 }).unwrap();
        let decoded: Option<Sample> = decode_versioned(&encoded, 2);
        assert!(decoded.is_none());
    }

    #[test]
    fn test_garbage_falls_back() {
        let decoded: Option<Sample> = decode_versioned("not json", 1);
        assert!(decoded.is_none());
    }

    #[test]
    fn test_wrong_shape_falls_back() {
        let decoded: Option<Sample> = decode_versioned("{\"version\":1,\"data\":{\"other\":true}}", 1);
        assert!(decoded.is_none());
    }
}
