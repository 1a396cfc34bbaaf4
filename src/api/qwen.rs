use super::{ImageGenerator, ScriptGenerator};
use crate::error::{Result, VideoError};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

const QWEN_TEXT_API: &str = "https://dashscope.aliyuncs.com/api/v1/services/aigc/text-generation/generation";
const QWEN_IMAGE_API: &str = "https://dashscope.aliyuncs.com/api/v1/services/aigc/text2image/image-synthesis";
const QWEN_TASK_API: &str = "https://dashscope.aliyuncs.com/api/v1/tasks";

/// 竖屏 9:16
const IMAGE_SIZE: &str = "720*1280";

#[derive(Debug, Clone)]
pub struct QwenClient {
    api_key: String,
    client: Client,
    max_task_polls: u32,
    poll_interval: Duration,
}

#[derive(Debug, Deserialize)]
struct ImageGenerationResponse {
    output: ImageOutput,
}

#[derive(Debug, Deserialize)]
struct ImageOutput {
    task_id: String,
}

#[derive(Debug, Deserialize)]
struct ImageTaskResponse {
    output: ImageTaskOutput,
}

#[derive(Debug, Deserialize)]
struct ImageTaskOutput {
    task_status: String,
    results: Option<Vec<ImageResult>>,
}

#[derive(Debug, Deserialize)]
struct ImageResult {
    url: Option<String>,
}

impl QwenClient {
    pub fn new(api_key: String) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(300)).build()?;

        Ok(Self {
            api_key,
            client,
            max_task_polls: 60, // 最多等待5分钟
            poll_interval: Duration::from_secs(5),
        })
    }

    async fn submit_image_task(&self, prompt: &str) -> Result<String> {
        let request_body = json!({
            "model": "wanx-v1",
            "input": {
                "prompt": prompt
            },
            "parameters": {
                "style": "<photography>",
                "size": IMAGE_SIZE,
                "n": 1
            }
        });

        let response = self
            .client
            .post(QWEN_IMAGE_API)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .header("X-DashScope-Async", "enable")
            .json(&request_body)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(VideoError::ApiError(format!(
                "Image generation API error: {}",
                error_text
            )));
        }

        let task_response: ImageGenerationResponse = response.json().await?;
        Ok(task_response.output.task_id)
    }

    /// 轮询任务状态，返回所有结果图片的 URL
    async fn wait_for_image_task(&self, task_id: &str) -> Result<Vec<String>> {
        let get_url = format!("{}/{}", QWEN_TASK_API, task_id);

        for i in 0..self.max_task_polls {
            tokio::time::sleep(self.poll_interval).await;

            let response = self
                .client
                .get(&get_url)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .send()
                .await?;

            let status = response.status();
            if !status.is_success() {
                let error_text = response.text().await?;
                warn!("Failed to get task status (HTTP {}): {}", status, error_text);
                continue;
            }

            let response_text = response.text().await?;
            let task_result: ImageTaskResponse = serde_json::from_str(&response_text)
                .map_err(|e| VideoError::ApiError(format!("Failed to parse task response: {}", e)))?;

            match task_result.output.task_status.as_str() {
                "SUCCEEDED" => {
                    let urls = task_result
                        .output
                        .results
                        .unwrap_or_default()
                        .into_iter()
                        .filter_map(|r| r.url)
                        .collect();
                    return Ok(urls);
                }
                "FAILED" | "CANCELED" | "UNKNOWN" => {
                    return Err(VideoError::ApiError(format!(
                        "Image generation task {} ended with status {}",
                        task_id, task_result.output.task_status
                    )));
                }
                other => {
                    info!("Task status: {} (retry {}/{})", other, i + 1, self.max_task_polls);
                }
            }
        }

        Err(VideoError::ApiError("Image generation timeout".to_string()))
    }
}

#[async_trait]
impl ScriptGenerator for QwenClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        info!("Generating script using Qwen...");

        let request_body = json!({
            "model": "qwen-plus",
            "input": {
                "messages": [
                    {
                        "role": "system",
                        "content": "You write short, punchy voice-over scripts for 30 second vertical promo videos. Reply with the script only."
                    },
                    {
                        "role": "user",
                        "content": prompt
                    }
                ]
            },
            "parameters": {
                "result_format": "message"
            }
        });

        let response = self
            .client
            .post(QWEN_TEXT_API)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request_body)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(VideoError::ApiError(format!("Qwen API error: {}", error_text)));
        }

        let response_json: serde_json::Value = response.json().await?;

        // 提取生成的文本
        let generated_text = response_json["output"]["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| VideoError::ApiError("Failed to extract generated text".to_string()))?;

        Ok(clean_generated_text(generated_text))
    }
}

#[async_trait]
impl ImageGenerator for QwenClient {
    async fn generate(&self, prompt: &str, output_path: &Path) -> Result<Vec<PathBuf>> {
        info!("Generating image for prompt: {}", prompt);

        let task_id = self.submit_image_task(prompt).await?;
        info!("Image generation task submitted: {}", task_id);

        let urls = self.wait_for_image_task(&task_id).await?;
        let Some(image_url) = urls.first() else {
            return Ok(Vec::new());
        };

        // 下载图片
        info!("Downloading image from: {}", image_url);
        let response = self.client.get(image_url).send().await?;
        if !response.status().is_success() {
            return Err(VideoError::ApiError(format!(
                "Image download failed (HTTP {})",
                response.status()
            )));
        }
        let image_data = response.bytes().await?;

        tokio::fs::write(output_path, image_data).await?;
        info!("Image saved to: {}", output_path.display());

        Ok(vec![output_path.to_path_buf()])
    }
}

/// 清理可能的markdown标记和引号
fn clean_generated_text(text: &str) -> String {
    text.trim()
        .trim_start_matches("```markdown")
        .trim_start_matches("```text")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
        .trim_matches('"')
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_generated_text() {
        assert_eq!(clean_generated_text("```\nTonight. AKILA.\n```"), "Tonight. AKILA.");
        assert_eq!(clean_generated_text("  \"Quoted script\" "), "Quoted script");
        assert_eq!(clean_generated_text("plain"), "plain");
    }

    #[test]
    fn test_task_response_parsing() {
        let raw = r#"{"output": {"task_status": "SUCCEEDED", "results": [{"url": "https://x/1.png"}, {"code": "DataInspectionFailed"}]}}"#;
        let parsed: ImageTaskResponse = serde_json::from_str(raw).unwrap();
        let urls: Vec<String> = parsed
            .output
            .results
            .unwrap_or_default()
            .into_iter()
            .filter_map(|r| r.url)
            .collect();
        assert_eq!(urls, vec!["https://x/1.png".to_string()]);
    }
}
