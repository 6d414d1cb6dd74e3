//! Request and response bodies of the download service API.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Body of `/api/video_info`.
#[derive(Debug, Clone, Serialize)]
pub struct InfoRequest<'a> {
    pub link: &'a str,
}

/// Body of `/api/download` and `/api/download/playlist`.
#[derive(Debug, Clone, Serialize)]
pub struct JobRequest<'a> {
    pub link: &'a str,
    pub resolution: &'a str,
    pub format: &'a str,
}

/// Response from `/api/video_info`.
#[derive(Debug, Clone, Deserialize)]
pub struct InfoResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Response from `/api/download/playlist`.
#[derive(Debug, Clone, Deserialize)]
pub struct PlaylistResponse {
    #[serde(default)]
    pub playlist_title: Option<String>,
    #[serde(default)]
    pub videos_queued: u32,
}

/// Structured error body returned by the service.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Metadata for a single video.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoInfo {
    pub title: String,
    pub thumbnail_url: Option<String>,
}

/// Parameters of a single download request.
#[derive(Debug, Clone, Default)]
pub struct DownloadRequest {
    pub link: String,
    pub resolution: String,
    pub format: String,
    /// Title from the metadata fetch, used to synthesize a filename.
    pub title: Option<String>,
    /// Sent as `X-Client-Id` so live events can be routed back to us.
    pub correlation_id: Option<String>,
}

/// A downloaded file held in memory.
#[derive(Debug, Clone)]
pub struct BinaryPayload {
    pub bytes: Bytes,
    pub filename: String,
}

/// A playlist accepted by the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistAccepted {
    pub playlist_title: String,
    pub videos_queued: u32,
}
