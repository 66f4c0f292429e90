mod downloader;
mod error;
mod process;
mod record;
mod types;
mod ytdlp;

pub use downloader::MediaTool;
pub use types::DownloadRequest;
pub use ytdlp::YtDlp;

use anyhow::{bail, Context, Result};
use url::Url;

/// Accepts only absolute http(s) URLs so nothing else reaches the tool.
pub fn validate_url(input: &str) -> Result<String> {
    let url = Url::parse(input.trim()).with_context(|| format!("Invalid URL: {}", input))?;

    match url.scheme() {
        "http" | "https" => {}
        other => bail!("Unsupported URL scheme: {}", other),
    }
    if url.host_str().is_none() {
        bail!("URL has no host: {}", input);
    }

    Ok(url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_url() {
        assert_eq!(
            validate_url("https://www.youtube.com/watch?v=aqz-KE-bpKQ").unwrap(),
            "https://www.youtube.com/watch?v=aqz-KE-bpKQ"
        );
        assert!(validate_url("  http://example.com/v  ").is_ok());
        assert!(validate_url("--exec rm").is_err());
        assert!(validate_url("file:///etc/passwd").is_err());
        assert!(validate_url("ftp://example.com/v").is_err());
        assert!(validate_url("").is_err());
    }
}
