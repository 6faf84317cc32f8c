//! Uploads an image and posts it to the room.

use crate::transport::{ChatTransport, TransportError};
use bot_core::{inspect, MediaError};
use bot_types::{ImageMessage, PostId, RoomId};
use thiserror::Error;

/// Body and upload name stem of every posted image.
pub const IMAGE_STEM: &str = "capybara";

/// Why a publish did not produce a post.
#[derive(Debug, Error)]
pub enum PublishError {
    /// The fetched bytes are not an image.
    #[error("fetched content is not an image")]
    NotAnImage,

    /// The bytes look like an image but cannot be decoded.
    #[error("fetched image is undecodable: {0}")]
    Undecodable(String),

    /// The media upload failed.
    #[error("upload failed: {0}")]
    UploadFailed(#[source] TransportError),

    /// The upload worked but the room message could not be sent.
    #[error("send failed: {0}")]
    SendFailed(#[source] TransportError),
}

impl PublishError {
    /// The transport error behind this failure, if any.
    pub fn transport_error(&self) -> Option<&TransportError> {
        match self {
            Self::UploadFailed(e) | Self::SendFailed(e) => Some(e),
            Self::NotAnImage | Self::Undecodable(_) => None,
        }
    }
}

impl From<MediaError> for PublishError {
    fn from(e: MediaError) -> Self {
        match e {
            MediaError::NotAnImage => Self::NotAnImage,
            e @ MediaError::Undecodable { .. } => Self::Undecodable(e.to_string()),
        }
    }
}

/// Publish image bytes to `room`.
///
/// Nothing touches the network unless the bytes are a decodable image.
/// Returns the post ID the homeserver assigned.
pub async fn publish<T: ChatTransport + ?Sized>(
    transport: &T,
    room: &RoomId,
    bytes: &[u8],
) -> Result<PostId, PublishError> {
    let media = inspect(bytes)?;
    let file_name = media.file_name(IMAGE_STEM);

    let uri = transport
        .upload(bytes, media.mime_type, &file_name)
        .await
        .map_err(PublishError::UploadFailed)?;
    tracing::debug!("Uploaded {} ({} bytes) as {}", file_name, media.size, uri);

    let message = ImageMessage::new(
        file_name,
        uri,
        media.mime_type,
        media.size,
        media.width,
        media.height,
    );

    let post_id = transport
        .send_message(room, &message)
        .await
        .map_err(PublishError::SendFailed)?;
    tracing::info!("Posted image to {} as {}", room, post_id);

    Ok(post_id)
}
