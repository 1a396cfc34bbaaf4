mod qwen;

pub use qwen::QwenClient;

use crate::error::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// 文案生成服务
#[async_trait]
pub trait ScriptGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// 图片生成服务
///
/// 生成的图片写到 `output_path`（或其旁边），返回可用的图片路径；
/// 返回空列表视为生成失败。
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate(&self, prompt: &str, output_path: &Path) -> Result<Vec<PathBuf>>;
}
