use crate::brand::BrandStyle;
use crate::error::Result;
use crate::template::TextPosition;
use crate::video::run_ffmpeg;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OverlayStyle {
    pub position: TextPosition,
    pub color: Option<String>,
}

/// 一次文字叠加层渲染请求
#[derive(Debug, Clone)]
pub struct OverlayRequest<'a> {
    pub text: &'a str,
    pub subtext: &'a str,
    pub width: u32,
    pub height: u32,
    pub brand: &'a BrandStyle,
    pub output_path: &'a Path,
    pub style: OverlayStyle,
}

/// 把标题/副标题渲染成透明背景的图片文件
#[async_trait]
pub trait TextOverlayRenderer: Send + Sync {
    async fn render(&self, request: &OverlayRequest<'_>) -> Result<()>;
}

/// 使用 ffmpeg drawtext 渲染文字层
#[derive(Debug, Clone, Default)]
pub struct FfmpegOverlayRenderer;

#[async_trait]
impl TextOverlayRenderer for FfmpegOverlayRenderer {
    async fn render(&self, request: &OverlayRequest<'_>) -> Result<()> {
        info!("Rendering text overlay '{}' -> {}", request.text, request.output_path.display());

        // 文本写入文件交给 drawtext 读取，避免标题里的 ' % : 等字符参与滤镜解析
        let files = TextFiles::beside(request.output_path);
        tokio::fs::write(&files.heading, request.text).await?;
        if !request.subtext.is_empty() {
            tokio::fs::write(&files.subtext, request.subtext).await?;
        }

        let args = vec![
            "-y".to_string(),
            "-f".to_string(),
            "lavfi".to_string(),
            "-i".to_string(),
            format!("color=c=0x00000000:s={}x{},format=rgba", request.width, request.height),
            "-vf".to_string(),
            overlay_filter(request, &files),
            "-frames:v".to_string(),
            "1".to_string(),
            request.output_path.display().to_string(),
        ];
        let result = run_ffmpeg(&args, "FFmpeg text overlay").await;

        tokio::fs::remove_file(&files.heading).await.ok();
        tokio::fs::remove_file(&files.subtext).await.ok();
        result
    }
}

/// 标题与副标题的文本文件，与叠加层图片放在同一目录
#[derive(Debug, Clone, PartialEq)]
pub struct TextFiles {
    pub heading: PathBuf,
    pub subtext: PathBuf,
}

impl TextFiles {
    pub fn beside(output_path: &Path) -> Self {
        Self {
            heading: output_path.with_extension("heading.txt"),
            subtext: output_path.with_extension("subtext.txt"),
        }
    }
}

/// 标题与副标题的 drawtext 滤镜链，文本经 `textfile` 读取且不做 `%{}` 展开
pub fn overlay_filter(request: &OverlayRequest<'_>, files: &TextFiles) -> String {
    let brand = request.brand;
    let has_subtext = !request.subtext.is_empty();

    let heading = brand.font_size.heading;
    let subheading = brand.font_size.subheading;
    let block = if has_subtext {
        heading + subheading * 3 / 2
    } else {
        heading
    };
    let top = match request.style.position {
        TextPosition::Top => "h*0.12".to_string(),
        TextPosition::Center => format!("(h-{})/2", block),
        TextPosition::Bottom => format!("h*0.78-{}", block),
    };
    let heading_color = request.style.color.as_deref().unwrap_or("white");
    let x = text_x(&brand.layout.text_alignment);
    let font = escape_filter_value(&brand.font_family);

    let mut filter = format!(
        "drawtext=font={font}:textfile={file}:expansion=none:fontsize={size}:fontcolor={color}:x={x}:y={y}:shadowcolor=black@0.6:shadowx=3:shadowy=3",
        font = font,
        file = escape_filter_value(&files.heading.display().to_string()),
        size = heading,
        color = escape_filter_value(heading_color),
        x = x,
        y = top,
    );
    if has_subtext {
        filter.push_str(&format!(
            ",drawtext=font={font}:textfile={file}:expansion=none:fontsize={size}:fontcolor={color}:x={x}:y={y}+{offset}",
            font = font,
            file = escape_filter_value(&files.subtext.display().to_string()),
            size = subheading,
            color = escape_filter_value(&brand.accent_color),
            x = x,
            y = top,
            offset = heading + subheading / 2,
        ));
    }
    filter
}

fn text_x(alignment: &str) -> &'static str {
    match alignment {
        "left" => "w*0.08",
        "right" => "w*0.92-text_w",
        _ => "(w-text_w)/2",
    }
}

/// 转义 `-vf` 中的选项值
///
/// ffmpeg 解析两轮：先按滤镜图拆分（`[],;`），再按选项拆分（`:`）。
/// 内层用单引号包住整个值，外层再对反斜杠、引号和滤镜图分隔符加反斜杠。
pub fn escape_filter_value(value: &str) -> String {
    let quoted = format!("'{}'", value.replace('\'', "'\\''"));
    let mut escaped = String::with_capacity(quoted.len() * 2);
    for c in quoted.chars() {
        if matches!(c, '\\' | '\'' | '[' | ']' | ',' | ';') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn brand() -> BrandStyle {
        serde_json::from_str(
            r##"{"primaryColor": "#9b87f5", "secondaryColor": "#1A1F2C", "accentColor": "#F97316", "fontFamily": "Bebas Neue"}"##,
        )
        .unwrap()
    }

    /// 按 ffmpeg av_get_token 的规则取出一个词法单元
    fn take_token(input: &str, terminators: &[char]) -> String {
        let mut out = String::new();
        let mut chars = input.chars();
        while let Some(c) = chars.next() {
            match c {
                '\\' => out.extend(chars.next()),
                '\'' => out.extend(chars.by_ref().take_while(|&q| q != '\'')),
                c if terminators.contains(&c) => break,
                c => out.push(c),
            }
        }
        out
    }

    fn request<'a>(
        brand: &'a BrandStyle,
        text: &'a str,
        subtext: &'a str,
        style: OverlayStyle,
    ) -> OverlayRequest<'a> {
        OverlayRequest {
            text,
            subtext,
            width: 1080,
            height: 1920,
            brand,
            output_path: Path::new("/work/text_overlay_0.png"),
            style,
        }
    }

    #[test]
    fn test_filter_value_survives_both_parsing_rounds() {
        for value in ["/work/it's 100%.txt", "a:b,c;d[e]", "back\\slash", "Bebas Neue"] {
            let escaped = escape_filter_value(value);
            let graph_level = take_token(&escaped, &['[', ']', ',', ';']);
            assert_eq!(graph_level, format!("'{}'", value.replace('\'', "'\\''")));
            assert_eq!(take_token(&graph_level, &[':']), value);
        }
    }

    #[test]
    fn test_text_never_enters_filter() {
        let brand = brand();
        let files = TextFiles::beside(Path::new("/work/text_overlay_0.png"));
        let filter = overlay_filter(
            &request(&brand, "100% Vinyl: it's live", "DJ's, b2b", OverlayStyle::default()),
            &files,
        );
        assert!(!filter.contains("Vinyl"));
        assert!(!filter.contains("b2b"));
        assert_eq!(filter.matches("expansion=none").count(), 2);
        assert!(filter.contains("textfile=\\'/work/text_overlay_0.heading.txt\\'"));
        assert!(filter.contains("textfile=\\'/work/text_overlay_0.subtext.txt\\'"));
    }

    #[test]
    fn test_overlay_filter_adds_subtext() {
        let brand = brand();
        let files = TextFiles::beside(Path::new("/work/text_overlay_0.png"));
        let filter = overlay_filter(&request(&brand, "AKILA", "HOUSE", OverlayStyle::default()), &files);
        assert!(filter.contains("font=\\'Bebas Neue\\'"));
        assert!(filter.contains("fontcolor=\\'#F97316\\'"));
        assert_eq!(filter.matches("drawtext=").count(), 2);
    }

    #[test]
    fn test_overlay_filter_single_line() {
        let brand = brand();
        let files = TextFiles::beside(Path::new("/work/text_overlay_1.png"));
        let style = OverlayStyle {
            position: TextPosition::Bottom,
            ..Default::default()
        };
        let filter = overlay_filter(&request(&brand, "\"...Head Ass!!!\"", "", style), &files);
        assert_eq!(filter.matches("drawtext=").count(), 1);
        assert!(filter.contains("y=h*0.78-96"));
        assert!(filter.contains("x=(w-text_w)/2"));
    }

    #[test]
    fn test_left_aligned_brand() {
        let mut brand = brand();
        brand.layout.text_alignment = "left".to_string();
        let files = TextFiles::beside(Path::new("/work/text_overlay_2.png"));
        let filter = overlay_filter(
            &request(&brand, "Underground Existence", "60:00 Live Set", OverlayStyle::default()),
            &files,
        );
        assert_eq!(filter.matches("x=w*0.08").count(), 2);
    }

    #[test]
    fn test_text_files_sit_beside_overlay() {
        let files = TextFiles::beside(Path::new("/work/lower_third_3.png"));
        assert_eq!(files.heading, PathBuf::from("/work/lower_third_3.heading.txt"));
        assert_eq!(files.subtext, PathBuf::from("/work/lower_third_3.subtext.txt"));
    }
}
