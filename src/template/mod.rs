pub mod loader;
pub mod resolver;

pub use loader::{fill_template, load_template, parse_template};
pub use resolver::{resolve, VariableMap};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;

/// 未指定时长的段落默认时长（秒）
pub const DEFAULT_SECTION_DURATION: f64 = 3.0;

/// 视频模板：按顺序排列的段落，每个段落对应成片中的一个场景
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    #[serde(alias = "name")]
    pub template_name: String,
    #[serde(default)]
    pub template_type: String,
    pub script_template: String,
    pub sections: Vec<Section>,
    #[serde(default)]
    pub audio_options: AudioOptions,
}

impl Template {
    /// 所有段落时长之和，即成片的名义时长
    pub fn total_duration(&self) -> f64 {
        self.sections.iter().map(Section::duration_secs).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(default)]
    pub elements: Vec<Element>,
    /// 该段落文字叠加层的内容，取代按段落序号硬编码的文案
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overlay: Option<OverlayTextSpec>,
}

impl Section {
    pub fn duration_secs(&self) -> f64 {
        self.duration.unwrap_or(DEFAULT_SECTION_DURATION)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlayTextSpec {
    pub text: String,
    #[serde(default)]
    pub subtext: String,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub position: Option<TextPosition>,
    #[serde(default)]
    pub uppercase: bool,
}

/// 段落中的元素，按 `type` 字段区分
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Element {
    Text(TextElement),
    Image(ImageElement),
    Background(BackgroundElement),
    Logo(LogoElement),
    ImageSequence(ImageSequenceElement),
    LowerThird(LowerThirdElement),
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextElement {
    #[serde(default)]
    pub content: String,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub position: Option<TextPosition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub animation: Option<Animation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

/// 背景图片：`prompt` 交给图片生成服务，`path` 则直接使用本地文件
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageElement {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackgroundElement {
    #[serde(default)]
    pub color: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoElement {
    pub path: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageSequenceElement {
    #[serde(default)]
    pub paths: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LowerThirdElement {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub subtext: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextPosition {
    Top,
    #[default]
    Center,
    Bottom,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Animation {
    #[default]
    None,
    #[serde(alias = "fadeIn")]
    Fade,
    #[serde(alias = "zoomIn")]
    Zoom,
}

/// 无法识别的取值按未设置处理，与未知元素类型一样不让整个模板失效
fn lenient<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|raw| match serde_json::from_value(raw.clone()) {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            debug!("Ignoring unsupported value {}", raw);
            None
        }
    }))
}

/// 音频截取参数，单位均为秒
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioOptions {
    #[serde(default)]
    pub start_time: f64,
    #[serde(default)]
    pub fade_in: f64,
    #[serde(default)]
    pub fade_out: f64,
    #[serde(default = "default_volume")]
    pub volume: f64,
}

fn default_volume() -> f64 {
    1.0
}

impl Default for AudioOptions {
    fn default() -> Self {
        Self {
            start_time: 0.0,
            fade_in: 0.0,
            fade_out: 0.0,
            volume: default_volume(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_dispatch_by_type() {
        let json = r##"[
            {"type": "text", "content": "hi", "position": "top", "animation": "fadeIn"},
            {"type": "image", "prompt": "a club"},
            {"type": "background", "color": "#1A1F2C"},
            {"type": "sparkles", "amount": 3}
        ]"##;
        let elements: Vec<Element> = serde_json::from_str(json).unwrap();
        assert_eq!(elements.len(), 4);
        match &elements[0] {
            Element::Text(text) => {
                assert_eq!(text.position, Some(TextPosition::Top));
                assert_eq!(text.animation, Some(Animation::Fade));
            }
            other => panic!("expected text element, got {:?}", other),
        }
        assert!(matches!(&elements[1], Element::Image(img) if img.prompt.as_deref() == Some("a club")));
        assert!(matches!(&elements[2], Element::Background(bg) if bg.color == "#1A1F2C"));
        assert_eq!(elements[3], Element::Unknown);
    }

    #[test]
    fn test_unknown_position_and_animation_fall_back() {
        let section: Section = serde_json::from_str(
            r#"{
                "type": "intro",
                "overlay": {"text": "AKILA", "position": "middle-left"},
                "elements": [{"type": "text", "content": "hi", "position": "diagonal", "animation": "slideUp"}]
            }"#,
        )
        .unwrap();
        assert_eq!(section.overlay.as_ref().unwrap().position, None);
        match &section.elements[0] {
            Element::Text(text) => {
                assert_eq!(text.content, "hi");
                assert_eq!(text.position, None);
                assert_eq!(text.animation, None);
                assert_eq!(text.position.unwrap_or_default(), TextPosition::Center);
                assert_eq!(text.animation.unwrap_or_default(), Animation::None);
            }
            other => panic!("expected text element, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_animation_keeps_template_loadable() {
        let template = parse_template(
            r#"{"name": "t", "scriptTemplate": "", "sections": [
                {"type": "a", "duration": 2, "elements": [{"type": "text", "content": "x", "animation": "slideUp"}]}
            ]}"#,
            "t",
        )
        .unwrap();
        assert_eq!(template.sections.len(), 1);
    }

    #[test]
    fn test_total_duration_uses_default_for_missing() {
        let template: Template = serde_json::from_str(
            r#"{
                "name": "t",
                "scriptTemplate": "",
                "sections": [{"type": "intro", "duration": 4}, {"type": "outro"}]
            }"#,
        )
        .unwrap();
        assert_eq!(template.template_name, "t");
        assert!((template.total_duration() - 7.0).abs() < f64::EPSILON);
        assert_eq!(template.audio_options.volume, 1.0);
    }
}
