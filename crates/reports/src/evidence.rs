//! Portable encoding for photo evidence.
//!
//! A captured photo must survive serialization into encoding-agnostic local
//! storage while the device is offline, so it is held as a self-describing
//! `data:<mime>;base64,<payload>` string rather than a raw binary handle.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use vigia_core::ObserverId;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EvidenceError {
    #[error("not a data URL")]
    MissingPrefix,

    #[error("missing base64 payload")]
    MissingPayload,

    #[error("missing media type")]
    MissingMediaType,

    #[error("invalid base64 payload: {0}")]
    Decode(#[from] base64::DecodeError),
}

/// A single evidence image, held in memory as raw bytes plus its MIME type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceImage {
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl EvidenceImage {
    pub fn new(mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            mime: mime.into(),
            bytes,
        }
    }

    pub fn jpeg(bytes: Vec<u8>) -> Self {
        Self::new("image/jpeg", bytes)
    }

    /// Encode as a self-describing data URL.
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime, STANDARD.encode(&self.bytes))
    }

    /// Decode from a data URL previously produced by [`to_data_url`].
    ///
    /// [`to_data_url`]: EvidenceImage::to_data_url
    pub fn from_data_url(url: &str) -> Result<Self, EvidenceError> {
        let rest = url
            .strip_prefix("data:")
            .ok_or(EvidenceError::MissingPrefix)?;
        let (mime, payload) = rest
            .split_once(";base64,")
            .ok_or(EvidenceError::MissingPayload)?;
        if mime.is_empty() {
            return Err(EvidenceError::MissingMediaType);
        }

        Ok(Self {
            mime: mime.to_string(),
            bytes: STANDARD.decode(payload)?,
        })
    }

    /// File extension for blob-storage object keys.
    pub fn file_extension(&self) -> &'static str {
        match self.mime.as_str() {
            "image/jpeg" | "image/jpg" => "jpg",
            "image/png" => "png",
            "image/webp" => "webp",
            _ => "bin",
        }
    }
}

/// Object key for evidence uploaded during direct (online) submission.
///
/// Keys are namespaced per observer and timestamped so uploads never collide.
pub fn submission_evidence_key(
    observer: &ObserverId,
    at: DateTime<Utc>,
    image: &EvidenceImage,
) -> String {
    format!(
        "{}/{}-evidence.{}",
        observer,
        at.timestamp_millis(),
        image.file_extension()
    )
}

/// Object key for evidence re-uploaded during queue replay.
pub fn sync_evidence_key(observer: &ObserverId, at: DateTime<Utc>, image: &EvidenceImage) -> String {
    format!(
        "{}/sync-{}.{}",
        observer,
        at.timestamp_millis(),
        image.file_extension()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn data_url_round_trip_is_byte_identical() {
        let image = EvidenceImage::jpeg(vec![0xff, 0xd8, 0xff, 0xe0, 0x00, 0x10]);
        let url = image.to_data_url();

        assert!(url.starts_with("data:image/jpeg;base64,"));
        assert_eq!(EvidenceImage::from_data_url(&url).unwrap(), image);
    }

    #[test]
    fn empty_payload_round_trips() {
        let image = EvidenceImage::new("image/png", Vec::new());
        let back = EvidenceImage::from_data_url(&image.to_data_url()).unwrap();
        assert_eq!(back, image);
    }

    #[test]
    fn malformed_urls_are_rejected() {
        assert_eq!(
            EvidenceImage::from_data_url("image/jpeg;base64,AAAA"),
            Err(EvidenceError::MissingPrefix)
        );
        assert_eq!(
            EvidenceImage::from_data_url("data:image/jpeg,AAAA"),
            Err(EvidenceError::MissingPayload)
        );
        assert_eq!(
            EvidenceImage::from_data_url("data:;base64,AAAA"),
            Err(EvidenceError::MissingMediaType)
        );
        assert!(matches!(
            EvidenceImage::from_data_url("data:image/jpeg;base64,!!!"),
            Err(EvidenceError::Decode(_))
        ));
    }

    #[test]
    fn object_keys_are_observer_namespaced() {
        let observer = ObserverId::new();
        let at = Utc::now();
        let image = EvidenceImage::jpeg(vec![1, 2, 3]);

        let direct = submission_evidence_key(&observer, at, &image);
        let replay = sync_evidence_key(&observer, at, &image);

        assert!(direct.starts_with(&format!("{observer}/")));
        assert!(replay.starts_with(&format!("{observer}/sync-")));
        assert!(direct.ends_with(".jpg"));
    }

    proptest! {
        /// Encoding then decoding any byte payload yields the original bytes.
        #[test]
        fn round_trip_property(bytes in proptest::collection::vec(any::<u8>(), 0..2048)) {
            let image = EvidenceImage::new("image/png", bytes);
            let back = EvidenceImage::from_data_url(&image.to_data_url()).unwrap();
            prop_assert_eq!(back, image);
        }
    }
}
