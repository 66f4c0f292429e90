use serde::Serialize;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoInfo {
    pub title: String,
    pub url: String,
    pub duration: String,
    pub thumbnail: String,
    pub available_qualities: Vec<String>,
}

/// Everything one metadata fetch produced, including what it had to skip.
#[derive(Debug, Default)]
pub struct FetchReport {
    pub videos: Vec<VideoInfo>,
    pub skipped_lines: usize,
    pub exit_code: Option<i32>,
}

#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub url: String,
    pub quality: String,
    /// Overrides the configured download directory for this request.
    pub output_dir: Option<PathBuf>,
}

impl DownloadRequest {
    pub fn new(url: &str, quality: &str) -> Self {
        Self {
            url: url.to_string(),
            quality: quality.to_string(),
            output_dir: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadStatus {
    Completed,
    Failed,
    Cancelled,
    TimedOut,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadOutcome {
    pub succeeded: bool,
    pub status: DownloadStatus,
    pub exit_code: Option<i32>,
    pub message: String,
    pub output: String,
    pub stderr: String,
}

impl DownloadOutcome {
    /// Maps the tool's exit code to a verdict.
    pub fn from_exit(code: Option<i32>, output: String, stderr: String, dir: &str) -> Self {
        let (status, message) = match code {
            Some(0) => (
                DownloadStatus::Completed,
                format!("download completed into {}", dir),
            ),
            Some(code) => (
                DownloadStatus::Failed,
                format!("download failed with exit code {}", code),
            ),
            None => (
                DownloadStatus::Failed,
                "download terminated without an exit code".to_string(),
            ),
        };

        Self {
            succeeded: status == DownloadStatus::Completed,
            status,
            exit_code: code,
            message,
            output,
            stderr,
        }
    }

    pub fn interrupted(status: DownloadStatus, message: String, output: String) -> Self {
        Self {
            succeeded: false,
            status,
            exit_code: None,
            message,
            output,
            stderr: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_zero_succeeds() {
        let outcome =
            DownloadOutcome::from_exit(Some(0), "done".into(), String::new(), "downloads");
        assert!(outcome.succeeded);
        assert_eq!(outcome.status, DownloadStatus::Completed);
        assert_eq!(outcome.exit_code, Some(0));
        assert_eq!(outcome.message, "download completed into downloads");
    }

    #[test]
    fn test_exit_code_one_fails() {
        let outcome =
            DownloadOutcome::from_exit(Some(1), String::new(), "ERROR".into(), "downloads");
        assert!(!outcome.succeeded);
        assert_eq!(outcome.status, DownloadStatus::Failed);
        assert_eq!(outcome.exit_code, Some(1));
        assert_eq!(outcome.message, "download failed with exit code 1");
        assert_eq!(outcome.stderr, "ERROR");
    }

    #[test]
    fn test_signal_termination_fails() {
        let outcome = DownloadOutcome::from_exit(None, String::new(), String::new(), "downloads");
        assert!(!outcome.succeeded);
        assert_eq!(outcome.exit_code, None);
    }

    #[test]
    fn test_video_info_serializes_camel_case() {
        let info = VideoInfo {
            title: "Clip".into(),
            url: "https://example.com/v".into(),
            duration: "1:01".into(),
            thumbnail: String::new(),
            available_qualities: vec!["720p".into()],
        };
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["availableQualities"][0], "720p");
        assert_eq!(json["duration"], "1:01");
    }

    #[test]
    fn test_outcome_status_serializes_snake_case() {
        let outcome = DownloadOutcome::interrupted(
            DownloadStatus::TimedOut,
            "timed out".into(),
            String::new(),
        );
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "timed_out");
        assert_eq!(json["succeeded"], false);
        assert!(json["exitCode"].is_null());
    }
}
