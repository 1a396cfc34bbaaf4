mod generator;

pub use generator::{audio_filter, segment_args, VideoGenerator};

use crate::error::{Result, VideoError};
use crate::scene::{FrameSpec, Scene};
use crate::template::AudioOptions;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::debug;

/// 配乐文件及其截取参数
#[derive(Debug, Clone, PartialEq)]
pub struct AudioTrack {
    pub path: PathBuf,
    pub options: AudioOptions,
}

/// 最终编码：按顺序消费场景列表，输出成片路径
#[async_trait]
pub trait MediaEncoder: Send + Sync {
    async fn compose(
        &self,
        scenes: &[Scene],
        audio: Option<&AudioTrack>,
        output_path: &Path,
        frame: FrameSpec,
    ) -> Result<PathBuf>;
}

/// 运行一次 ffmpeg，失败时带上 stderr
pub(crate) async fn run_ffmpeg(args: &[String], step: &str) -> Result<()> {
    debug!("ffmpeg {}", args.join(" "));
    let output = Command::new("ffmpeg")
        .args(args)
        .output()
        .await
        .map_err(|e| VideoError::VideoGenerationError(format!("Failed to run FFmpeg: {}", e)))?;

    if !output.status.success() {
        let error = String::from_utf8_lossy(&output.stderr);
        return Err(VideoError::FfmpegError(format!("{} failed: {}", step, error)));
    }
    Ok(())
}
