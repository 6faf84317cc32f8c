//! Outbound message content.
//!
//! The daily post is an `m.image` room message that references media
//! uploaded beforehand. Thumbnails are not generated, so both thumbnail
//! fields are serialized as explicit `null`.

use serde::{Deserialize, Serialize};

use crate::ids::ContentUri;

/// Event type used for room messages.
pub const ROOM_MESSAGE_EVENT_TYPE: &str = "m.room.message";

/// `msgtype` of an image message.
pub const IMAGE_MSGTYPE: &str = "m.image";

/// Metadata block of an image message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageInfo {
    /// Size of the uploaded bytes.
    pub size: u64,
    /// Mime type, e.g. `image/jpeg`.
    pub mimetype: String,
    /// Thumbnail metadata (not supported yet).
    pub thumbnail_info: Option<serde_json::Value>,
    /// Width in pixels.
    pub w: u32,
    /// Height in pixels.
    pub h: u32,
    /// Thumbnail media URI (not supported yet).
    pub thumbnail_url: Option<String>,
}

/// Content of an `m.image` room message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageMessage {
    /// Descriptive title, conventionally the file name.
    pub body: String,
    /// Image metadata.
    pub info: ImageInfo,
    /// Always `m.image`.
    pub msgtype: String,
    /// Media URI of the uploaded image.
    pub url: ContentUri,
}

impl ImageMessage {
    /// Compose an image message for uploaded media.
    pub fn new(
        body: impl Into<String>,
        url: ContentUri,
        mimetype: impl Into<String>,
        size: u64,
        width: u32,
        height: u32,
    ) -> Self {
        Self {
            body: body.into(),
            info: ImageInfo {
                size,
                mimetype: mimetype.into(),
                thumbnail_info: None,
                w: width,
                h: height,
                thumbnail_url: None,
            },
            msgtype: IMAGE_MSGTYPE.to_string(),
            url,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn serializes_to_matrix_image_content() {
        let msg = ImageMessage::new(
            "capybara.jpg",
            ContentUri::new("mxc://example.org/abc"),
            "image/jpeg",
            5420,
            100,
            80,
        );

        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            value,
            json!({
                "body": "capybara.jpg",
                "info": {
                    "size": 5420,
                    "mimetype": "image/jpeg",
                    "thumbnail_info": null,
                    "w": 100,
                    "h": 80,
                    "thumbnail_url": null
                },
                "msgtype": "m.image",
                "url": "mxc://example.org/abc"
            })
        );
    }

    #[test]
    fn thumbnail_fields_are_present_but_null() {
        let msg = ImageMessage::new("x.png", ContentUri::new("mxc://s/x"), "image/png", 1, 1, 1);
        let value = serde_json::to_value(&msg).unwrap();
        let info = value["info"].as_object().unwrap();
        assert!(info.contains_key("thumbnail_info"));
        assert!(info.contains_key("thumbnail_url"));
        assert!(info["thumbnail_info"].is_null());
    }
}
