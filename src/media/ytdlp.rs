use super::{
    downloader::MediaTool,
    error::{DownloadError, FetchError, ParseError, ProcessError},
    process::ProcessInvoker,
    record::parse_record,
    types::{DownloadOutcome, DownloadRequest, DownloadStatus, FetchReport, VideoInfo},
};
use crate::config::ToolConfig;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

const AGE_RESTRICTION_HINTS: [&str; 3] = [
    "age-restricted",
    "sign in",
    "inappropriate for some users",
];

const OUTPUT_TEMPLATE: &str = "%(title)s.%(ext)s";

/// Program plus the arguments that precede every generated argument list.
#[derive(Debug, Clone)]
struct ToolCommand {
    binary: String,
    base_args: Vec<String>,
}

impl ToolCommand {
    fn from_config(config: &ToolConfig) -> Self {
        Self {
            binary: config.binary.clone(),
            base_args: config.base_args.clone(),
        }
    }

    fn with_args(&self, args: Vec<String>) -> Vec<String> {
        self.base_args.iter().cloned().chain(args).collect()
    }
}

pub struct MetadataFetcher {
    command: ToolCommand,
    invoker: ProcessInvoker,
}

impl MetadataFetcher {
    pub fn new(config: &ToolConfig, invoker: ProcessInvoker) -> Self {
        Self {
            command: ToolCommand::from_config(config),
            invoker,
        }
    }

    fn metadata_args(url: &str) -> Vec<String> {
        vec![
            "--dump-json".to_string(),
            "--no-playlist".to_string(),
            "--ignore-errors".to_string(),
            "--no-warnings".to_string(),
            "--".to_string(),
            url.to_string(),
        ]
    }

    pub async fn fetch_qualities(&self, url: &str) -> Result<Vec<VideoInfo>, FetchError> {
        Ok(self.fetch(url).await?.videos)
    }

    pub async fn fetch(&self, url: &str) -> Result<FetchReport, FetchError> {
        self.fetch_inner(url)
            .instrument(info_span!("fetch_metadata", url = %url))
            .await
    }

    async fn fetch_inner(&self, url: &str) -> Result<FetchReport, FetchError> {
        info!("Fetching video information for: {}", url);

        let mut handle = self.invoker.run(
            &self.command.binary,
            self.command.with_args(Self::metadata_args(url)),
        )?;

        let mut report = FetchReport::default();
        let mut line_no = 0usize;

        while let Some(line) = handle.next_line().await? {
            line_no += 1;
            let parsed =
                parse_record(&line).and_then(|record| VideoInfo::from_record(&record, url));

            match parsed {
                Ok(video) => {
                    debug!(
                        "Parsed \"{}\" with {} qualities",
                        video.title,
                        video.available_qualities.len()
                    );
                    merge_video(&mut report.videos, video);
                }
                Err(ParseError::Empty) => {}
                Err(e) => {
                    report.skipped_lines += 1;
                    warn!("Could not parse video info line {}: {}", line_no, e);
                }
            }
        }

        let exit = handle.finish().await?;
        report.exit_code = exit.code();

        for line in &exit.stderr {
            warn!("yt-dlp error: {}", line);
        }

        if !exit.status.success() {
            warn!(
                "yt-dlp exited with {} after producing {} video(s)",
                exit.status,
                report.videos.len()
            );
        }

        if report.videos.is_empty() && mentions_age_restriction(&exit.stderr) {
            warn!("Video appears to be age-restricted or to require signing in");
        }

        info!(
            "Fetched {} video(s), skipped {} line(s)",
            report.videos.len(),
            report.skipped_lines
        );
        Ok(report)
    }
}

/// Lines with the same title and duration are folded into the first entry.
fn merge_video(videos: &mut Vec<VideoInfo>, video: VideoInfo) {
    let existing = videos
        .iter_mut()
        .find(|v| v.title == video.title && v.duration == video.duration);

    match existing {
        Some(existing) => {
            for quality in video.available_qualities {
                if !existing.available_qualities.contains(&quality) {
                    existing.available_qualities.push(quality);
                }
            }
        }
        None => videos.push(video),
    }
}

fn mentions_age_restriction(stderr: &[String]) -> bool {
    stderr.iter().any(|line| {
        let line = line.to_lowercase();
        AGE_RESTRICTION_HINTS.iter().any(|hint| line.contains(hint))
    })
}

pub struct VideoDownloader {
    command: ToolCommand,
    invoker: ProcessInvoker,
    download_dir: PathBuf,
    merge_output_format: Option<String>,
}

impl VideoDownloader {
    pub fn new(config: &ToolConfig, invoker: ProcessInvoker) -> Self {
        Self {
            command: ToolCommand::from_config(config),
            invoker,
            download_dir: config.download_dir.clone(),
            merge_output_format: config.merge_output_format().map(str::to_string),
        }
    }

    fn download_args(&self, request: &DownloadRequest, dir: &Path) -> Vec<String> {
        let mut args = vec![
            "-f".to_string(),
            request.quality.clone(),
            "-o".to_string(),
            dir.join(OUTPUT_TEMPLATE).to_string_lossy().into_owned(),
        ];

        if let Some(format) = &self.merge_output_format {
            args.push("--merge-output-format".to_string());
            args.push(format.clone());
        }

        args.push("--".to_string());
        args.push(request.url.clone());
        args
    }

    pub async fn download(
        &self,
        request: &DownloadRequest,
    ) -> Result<DownloadOutcome, DownloadError> {
        self.download_inner(request)
            .instrument(info_span!("download", url = %request.url, quality = %request.quality))
            .await
    }

    async fn download_inner(
        &self,
        request: &DownloadRequest,
    ) -> Result<DownloadOutcome, DownloadError> {
        let dir = request
            .output_dir
            .clone()
            .unwrap_or_else(|| self.download_dir.clone());

        info!(
            "Downloading {} in {} quality into {}",
            request.url,
            request.quality,
            dir.display()
        );

        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|source| DownloadError::OutputDir {
                path: dir.display().to_string(),
                source,
            })?;

        let mut handle = self.invoker.run(
            &self.command.binary,
            self.command.with_args(self.download_args(request, &dir)),
        )?;

        let mut output: Vec<String> = Vec::new();
        let read = loop {
            match handle.next_line().await {
                Ok(Some(line)) => {
                    debug!("yt-dlp: {}", line);
                    output.push(line);
                }
                Ok(None) => break Ok(()),
                Err(e) => break Err(e),
            }
        };

        let exit = match read {
            Ok(()) => handle.finish().await,
            Err(e) => Err(e),
        };

        let exit = match exit {
            Ok(exit) => exit,
            Err(ProcessError::Cancelled) => {
                info!("Download cancelled: {}", request.url);
                return Ok(DownloadOutcome::interrupted(
                    DownloadStatus::Cancelled,
                    "download cancelled".to_string(),
                    output.join("\n"),
                ));
            }
            Err(ProcessError::TimedOut(limit)) => {
                warn!("Download timed out after {:?}: {}", limit, request.url);
                return Ok(DownloadOutcome::interrupted(
                    DownloadStatus::TimedOut,
                    format!("download timed out after {}s", limit.as_secs()),
                    output.join("\n"),
                ));
            }
            Err(e) => return Err(e.into()),
        };

        for line in &exit.stderr {
            warn!("yt-dlp error: {}", line);
        }

        let outcome = DownloadOutcome::from_exit(
            exit.code(),
            output.join("\n"),
            exit.stderr.join("\n"),
            &dir.display().to_string(),
        );

        if outcome.succeeded {
            info!("Download finished: {}", outcome.message);
        } else {
            warn!("{}", outcome.message);
        }
        Ok(outcome)
    }
}

/// yt-dlp with both operations sharing one invoker configuration.
pub struct YtDlp {
    command: ToolCommand,
    fetcher: MetadataFetcher,
    downloader: VideoDownloader,
}

impl YtDlp {
    /// Every child spawned through this tool is killed once `token` is cancelled.
    pub fn new(config: &ToolConfig, token: CancellationToken) -> Self {
        let invoker = ProcessInvoker::new().with_cancellation(token);
        Self {
            command: ToolCommand::from_config(config),
            fetcher: MetadataFetcher::new(
                config,
                invoker.clone().with_timeout(config.metadata_timeout()),
            ),
            downloader: VideoDownloader::new(
                config,
                invoker.with_timeout(config.download_timeout()),
            ),
        }
    }
}

#[async_trait]
impl MediaTool for YtDlp {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    async fn fetch_qualities(&self, url: &str) -> Result<Vec<VideoInfo>, FetchError> {
        self.fetcher.fetch_qualities(url).await
    }

    async fn download(&self, request: &DownloadRequest) -> Result<DownloadOutcome, DownloadError> {
        self.downloader.download(request).await
    }

    async fn test_availability(&self) -> bool {
        let result = ProcessInvoker::new()
            .with_timeout(Some(std::time::Duration::from_secs(10)))
            .run(
                &self.command.binary,
                self.command.with_args(vec!["--version".to_string()]),
            );

        let mut handle = match result {
            Ok(handle) => handle,
            Err(e) => {
                warn!("❌ yt-dlp not found: {}", e);
                return false;
            }
        };

        let version = match handle.next_line().await {
            Ok(line) => line.unwrap_or_default(),
            Err(e) => {
                warn!("❌ yt-dlp did not report a version: {}", e);
                return false;
            }
        };

        // Drain so the child can exit.
        while let Ok(Some(_)) = handle.next_line().await {}

        match handle.finish().await {
            Ok(exit) if exit.status.success() => {
                info!("✅ yt-dlp is available, version: {}", version.trim());
                true
            }
            Ok(exit) => {
                warn!("❌ yt-dlp command failed with {}", exit.status);
                false
            }
            Err(e) => {
                warn!("❌ yt-dlp command failed: {}", e);
                false
            }
        }
    }
}
