//! Diff detection between two message snapshots

use crate::types::{ChangeSet, FieldChange, MessageSnapshot};

/// Compute the field-level change set from `previous` to `current`.
///
/// Without a previous snapshot there is nothing to compare against and the
/// result is empty. Only content messages carry diffable fields; any pair
/// involving a service message also yields an empty set.
pub fn detect(previous: Option<&MessageSnapshot>, current: &MessageSnapshot) -> ChangeSet {
    let mut changes = ChangeSet::default();

    let (prev, curr) = match (previous, current) {
        (Some(MessageSnapshot::Content(prev)), MessageSnapshot::Content(curr)) => (prev, curr),
        (Some(MessageSnapshot::Service(_)), _)
        | (Some(MessageSnapshot::Content(_)), MessageSnapshot::Service(_))
        | (None, _) => return changes,
    };

    if prev.text != curr.text {
        changes.text = Some(FieldChange::new(prev.text.clone(), curr.text.clone()));
    }

    if prev.entities != curr.entities {
        changes.entities = Some(FieldChange::new(prev.entities.clone(), curr.entities.clone()));
    }

    if prev.media != curr.media {
        changes.media = Some(FieldChange::new(prev.media.clone(), curr.media.clone()));
    }

    changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ContentMessage, MessageMedia, Photo, ServiceMessage, TextEntity};

    fn content(text: &str) -> ContentMessage {
        ContentMessage::new(10, 1, 1700000000, text)
    }

    #[test]
    fn test_no_previous_is_empty() {
        let current = MessageSnapshot::Content(content("hello"));
        assert!(detect(None, &current).is_empty());
    }

    #[test]
    fn test_identical_snapshots_are_empty() {
        let a = MessageSnapshot::Content(
            content("hello").with_entities(vec![TextEntity::new("messageEntityBold", 0, 5)]),
        );
        assert!(detect(Some(&a), &a.clone()).is_empty());
    }

    #[test]
    fn test_text_only_change() {
        let a = MessageSnapshot::Content(content("hi"));
        let b = MessageSnapshot::Content(content("hi there"));

        let changes = detect(Some(&a), &b);
        assert_eq!(changes, ChangeSet::text("hi", "hi there"));
    }

    #[test]
    fn test_entities_compared_structurally() {
        let a = MessageSnapshot::Content(
            content("hi").with_entities(vec![TextEntity::new("messageEntityBold", 0, 2)]),
        );
        let b = MessageSnapshot::Content(
            content("hi").with_entities(vec![TextEntity::new("messageEntityItalic", 0, 2)]),
        );

        let changes = detect(Some(&a), &b);
        assert!(changes.text.is_none());
        let entities = changes.entities.unwrap();
        assert_eq!(entities.from[0].kind, "messageEntityBold");
        assert_eq!(entities.to[0].kind, "messageEntityItalic");
    }

    #[test]
    fn test_media_replacement() {
        let photo = |id| MessageMedia::Photo {
            photo: Some(Photo::new(id, vec![])),
        };
        let a = MessageSnapshot::Content(content("pic").with_media(photo(1)));
        let b = MessageSnapshot::Content(content("pic").with_media(photo(2)));

        let changes = detect(Some(&a), &b);
        let media = changes.media.unwrap();
        assert_eq!(media.from, serde_json::to_value(photo(1)).ok());
        assert_eq!(media.to, serde_json::to_value(photo(2)).ok());
        assert!(changes.text.is_none());
    }

    #[test]
    fn test_service_messages_not_diffed() {
        let service = MessageSnapshot::Service(ServiceMessage::new(10, 1, 0, serde_json::Value::Null));
        let text = MessageSnapshot::Content(content("x"));

        assert!(detect(Some(&service), &text).is_empty());
        assert!(detect(Some(&text), &service).is_empty());
    }
}
