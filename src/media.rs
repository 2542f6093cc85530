//! Media extraction and materialization
//!
//! Extraction turns the media attached to a snapshot into a
//! [`MediaReference`]. Materialization (fetching the bytes) is delegated to
//! a host-provided [`MediaFetcher`].

use async_trait::async_trait;

use crate::error::{FetchError, MediaExtractionError};
use crate::types::{
    Document, DocumentAttribute, MediaKind, MediaReference, MessageMedia, MessageSnapshot, Photo,
    DOCUMENT_TAG, PHOTO_TAG,
};

/// Extract a media reference from a snapshot.
///
/// Returns `Ok(None)` for messages without trackable media (no media, web
/// page previews, service messages, unsupported media kinds, `photoEmpty`
/// and `documentEmpty` placeholders). A payload that does not parse is a
/// [`MediaExtractionError::Malformed`]; the snapshot itself is unaffected.
pub fn extract_media(
    message: &MessageSnapshot,
) -> Result<Option<MediaReference>, MediaExtractionError> {
    let key = message.key();

    let raw = match message.media() {
        Some(raw) => raw,
        None => return Ok(None),
    };

    let media = MessageMedia::from_value(raw)
        .map_err(|e| MediaExtractionError::Malformed(e.to_string()))?;

    match media {
        MessageMedia::Photo { photo: Some(photo) } if photo.kind == PHOTO_TAG => {
            let mut reference = MediaReference::new(format!("photo_{}", photo.id), key, MediaKind::Photo);
            reference.size = largest_photo_size(&photo);
            Ok(Some(reference))
        }
        MessageMedia::Photo { photo: Some(_) } => Ok(None),
        MessageMedia::Photo { photo: None } => Err(MediaExtractionError::EmptyPhoto),
        MessageMedia::Document {
            document: Some(doc),
        } if doc.kind == DOCUMENT_TAG => {
            let mut reference = MediaReference::new(format!("doc_{}", doc.id), key, document_kind(&doc));
            reference.size = doc.size;
            reference.filename = Some(document_filename(&doc));
            reference.mime_type = Some(doc.mime_type).filter(|m| !m.is_empty());
            Ok(Some(reference))
        }
        MessageMedia::Document { document: Some(_) } => Ok(None),
        MessageMedia::Document { document: None } => Err(MediaExtractionError::EmptyDocument),
        MessageMedia::WebPage { .. } | MessageMedia::Other => Ok(None),
    }
}

/// Size of the last (largest) photo size, 0 when unknown
fn largest_photo_size(photo: &Photo) -> u64 {
    photo.sizes.last().map(|s| s.size).unwrap_or(0)
}

/// Classify a document by mime type and attributes
pub fn document_kind(doc: &Document) -> MediaKind {
    let mime = doc.mime_type.as_str();
    let has = |pred: fn(&DocumentAttribute) -> bool| doc.attributes.iter().any(pred);

    if has(|a| matches!(a, DocumentAttribute::Animated)) {
        return if mime == "image/gif" {
            MediaKind::Gif
        } else {
            MediaKind::Animation
        };
    }

    if mime.starts_with("image/") {
        if mime == "image/gif" {
            return MediaKind::Gif;
        }
        return MediaKind::Sticker;
    }

    if mime.starts_with("video/") {
        let round = has(|a| matches!(a, DocumentAttribute::Video { round_message: true, .. }));
        return if round {
            MediaKind::VideoNote
        } else {
            MediaKind::Video
        };
    }

    if mime.starts_with("audio/") {
        let voice = has(|a| matches!(a, DocumentAttribute::Audio { voice: true, .. }));
        return if voice { MediaKind::Voice } else { MediaKind::Audio };
    }

    MediaKind::Document
}

/// Filename attribute, or `file_<id>` when the document has none
pub fn document_filename(doc: &Document) -> String {
    doc.attributes
        .iter()
        .find_map(|a| match a {
            DocumentAttribute::Filename { file_name } => Some(file_name.clone()),
            _ => None,
        })
        .unwrap_or_else(|| format!("file_{}", doc.id))
}

/// Fetches media bytes into local storage.
///
/// Implemented by the host (it owns the download manager). Returns the
/// local location of the stored bytes, if any.
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    async fn fetch(&self, media: &MediaReference) -> Result<Option<String>, FetchError>;
}

/// Fetcher that records metadata only and reports success without
/// downloading anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct MetadataOnlyFetcher;

#[async_trait]
impl MediaFetcher for MetadataOnlyFetcher {
    async fn fetch(&self, _media: &MediaReference) -> Result<Option<String>, FetchError> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ContentMessage, EntityKey, PhotoSize, ServiceMessage};
    use serde_json::json;

    fn doc(mime: &str, attributes: Vec<DocumentAttribute>) -> Document {
        Document::new(77, mime, 1024).with_attributes(attributes)
    }

    fn with_media(media: MessageMedia) -> MessageSnapshot {
        MessageSnapshot::Content(ContentMessage::new(5, 9, 0, "").with_media(media))
    }

    #[test]
    fn test_extract_photo_uses_largest_size() {
        let message = with_media(MessageMedia::Photo {
            photo: Some(Photo::new(
                3,
                vec![PhotoSize::new("s", 90, 90, 100), PhotoSize::new("y", 1280, 960, 90000)],
            )),
        });

        let reference = extract_media(&message).unwrap().unwrap();
        assert_eq!(reference.id, "photo_3");
        assert_eq!(reference.kind, MediaKind::Photo);
        assert_eq!(reference.size, 90000);
        assert_eq!(reference.key, EntityKey::new(5, 9));
        assert!(!reference.materialized);
    }

    #[test]
    fn test_extract_document_metadata() {
        let message = with_media(MessageMedia::Document {
            document: Some(doc(
                "application/pdf",
                vec![DocumentAttribute::Filename {
                    file_name: "report.pdf".into(),
                }],
            )),
        });

        let reference = extract_media(&message).unwrap().unwrap();
        assert_eq!(reference.id, "doc_77");
        assert_eq!(reference.kind, MediaKind::Document);
        assert_eq!(reference.filename.as_deref(), Some("report.pdf"));
        assert_eq!(reference.mime_type.as_deref(), Some("application/pdf"));
    }

    #[test]
    fn test_document_kinds() {
        assert_eq!(document_kind(&doc("image/gif", vec![])), MediaKind::Gif);
        assert_eq!(document_kind(&doc("image/webp", vec![])), MediaKind::Sticker);
        assert_eq!(document_kind(&doc("video/mp4", vec![])), MediaKind::Video);
        assert_eq!(
            document_kind(&doc(
                "video/mp4",
                vec![DocumentAttribute::Video { round_message: true, duration: 3.0 }]
            )),
            MediaKind::VideoNote
        );
        assert_eq!(
            document_kind(&doc("video/mp4", vec![DocumentAttribute::Animated])),
            MediaKind::Animation
        );
        assert_eq!(
            document_kind(&doc(
                "audio/ogg",
                vec![DocumentAttribute::Audio { voice: true, duration: 4.0 }]
            )),
            MediaKind::Voice
        );
        assert_eq!(document_kind(&doc("audio/mpeg", vec![])), MediaKind::Audio);
        assert_eq!(document_kind(&doc("application/zip", vec![])), MediaKind::Document);
    }

    #[test]
    fn test_filename_fallback() {
        assert_eq!(document_filename(&doc("application/zip", vec![])), "file_77");
    }

    #[test]
    fn test_untracked_media() {
        let web = with_media(MessageMedia::WebPage { url: None });
        assert_eq!(extract_media(&web), Ok(None));

        let service = MessageSnapshot::Service(ServiceMessage::new(1, 1, 0, serde_json::Value::Null));
        assert_eq!(extract_media(&service), Ok(None));
    }

    #[test]
    fn test_empty_placeholders_are_not_registered() {
        let message = MessageSnapshot::Content(ContentMessage::new(5, 9, 0, "").with_raw_media(json!({
            "_": "messageMediaPhoto",
            "photo": {"_": "photoEmpty", "id": "12"}
        })));
        assert_eq!(extract_media(&message), Ok(None));

        let message = MessageSnapshot::Content(ContentMessage::new(5, 9, 0, "").with_raw_media(json!({
            "_": "messageMediaDocument",
            "document": {"_": "documentEmpty", "id": 13}
        })));
        assert_eq!(extract_media(&message), Ok(None));
    }

    #[test]
    fn test_host_photo_with_string_id() {
        let message = MessageSnapshot::Content(ContentMessage::new(5, 9, 0, "").with_raw_media(json!({
            "_": "messageMediaPhoto",
            "photo": {"_": "photo", "id": "5271232823485", "sizes": [
                {"_": "photoStrippedSize", "type": "i", "bytes": [1, 2]},
                {"_": "photoSize", "type": "x", "w": 800, "h": 600, "size": 4096}
            ]}
        })));

        let reference = extract_media(&message).unwrap().unwrap();
        assert_eq!(reference.id, "photo_5271232823485");
        assert_eq!(reference.size, 4096);
    }

    #[test]
    fn test_unparsable_payload_is_malformed() {
        let message = MessageSnapshot::Content(
            ContentMessage::new(5, 9, 0, "").with_raw_media(json!({"_": "messageMediaPhoto", "photo": 5})),
        );
        assert!(matches!(extract_media(&message), Err(MediaExtractionError::Malformed(_))));
    }

    #[test]
    fn test_empty_media_is_extraction_failure() {
        let message = with_media(MessageMedia::Photo { photo: None });
        assert_eq!(extract_media(&message), Err(MediaExtractionError::EmptyPhoto));

        let message = with_media(MessageMedia::Document { document: None });
        assert_eq!(extract_media(&message), Err(MediaExtractionError::EmptyDocument));
    }
}
