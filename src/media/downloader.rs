use super::{
    error::{DownloadError, FetchError},
    types::{DownloadOutcome, DownloadRequest, VideoInfo},
};
use async_trait::async_trait;

#[async_trait]
pub trait MediaTool: Send + Sync {
    /// Human-readable name of the external tool
    fn name(&self) -> &'static str;

    /// List the videos behind a URL together with their quality labels
    async fn fetch_qualities(&self, url: &str) -> Result<Vec<VideoInfo>, FetchError>;

    /// Download a URL in one of the qualities reported by `fetch_qualities`
    async fn download(&self, request: &DownloadRequest) -> Result<DownloadOutcome, DownloadError>;

    /// Test if the tool is available on the system
    async fn test_availability(&self) -> bool;
}
