use crate::error::{Result, VideoError};
use crate::template::VariableMap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// 品牌视觉配置，每次运行加载一次，以引用方式传给各阶段
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrandStyle {
    pub primary_color: String,
    pub secondary_color: String,
    pub accent_color: String,
    #[serde(default = "default_font_family")]
    pub font_family: String,
    #[serde(default)]
    pub font_size: FontSizes,
    #[serde(default = "default_tone")]
    pub tone: String,
    #[serde(default)]
    pub tagline: String,
    #[serde(default)]
    pub image_filters: ImageFilters,
    #[serde(default)]
    pub layout: Layout,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FontSizes {
    pub heading: u32,
    pub subheading: u32,
    pub body: u32,
    pub caption: u32,
}

impl Default for FontSizes {
    fn default() -> Self {
        Self {
            heading: 96,
            subheading: 64,
            body: 48,
            caption: 36,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageFilters {
    #[serde(default = "unit")]
    pub brightness: f32,
    #[serde(default = "unit")]
    pub saturation: f32,
    #[serde(default = "default_overlay_color")]
    pub overlay_color: String,
    #[serde(default = "default_overlay_opacity")]
    pub overlay_opacity: f32,
}

impl Default for ImageFilters {
    fn default() -> Self {
        Self {
            brightness: unit(),
            saturation: unit(),
            overlay_color: default_overlay_color(),
            overlay_opacity: default_overlay_opacity(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Layout {
    #[serde(default = "default_alignment")]
    pub text_alignment: String,
    #[serde(default)]
    pub style: LayoutStyle,
}

impl Default for Layout {
    fn default() -> Self {
        Self {
            text_alignment: default_alignment(),
            style: LayoutStyle::default(),
        }
    }
}

/// 主体缩略图在画面中的位置偏好
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LayoutStyle {
    #[default]
    Balanced,
    ArtistFocused,
    LogoFocused,
}

fn default_font_family() -> String {
    "Montserrat".to_string()
}

fn default_tone() -> String {
    "bold".to_string()
}

fn default_alignment() -> String {
    "center".to_string()
}

fn default_overlay_color() -> String {
    "#000000".to_string()
}

fn default_overlay_opacity() -> f32 {
    0.25
}

fn unit() -> f32 {
    1.0
}

impl BrandStyle {
    pub async fn load(path: &Path) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path).await?;
        let brand: BrandStyle = serde_json::from_str(&raw)?;
        brand.validate()?;
        info!("Loaded brand style from {}", path.display());
        Ok(brand)
    }

    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("primaryColor", &self.primary_color),
            ("secondaryColor", &self.secondary_color),
            ("accentColor", &self.accent_color),
            ("imageFilters.overlayColor", &self.image_filters.overlay_color),
        ] {
            if parse_hex_color(value).is_none() {
                return Err(VideoError::InvalidInputError(format!(
                    "brand {} is not a hex color: '{}'",
                    field, value
                )));
            }
        }
        Ok(())
    }

    /// 品牌相关的模板变量；调用方提供的同名变量优先
    pub fn variables(&self) -> VariableMap {
        let mut vars = VariableMap::new();
        vars.insert("brandPrimaryColor".to_string(), self.primary_color.clone());
        vars.insert("brandSecondaryColor".to_string(), self.secondary_color.clone());
        vars.insert("brandAccentColor".to_string(), self.accent_color.clone());
        vars.insert("brandTone".to_string(), self.tone.clone());
        vars.insert("brandTagline".to_string(), self.tagline.clone());
        vars
    }

    pub fn primary_rgb(&self) -> [u8; 3] {
        parse_hex_color(&self.primary_color).unwrap_or([0, 0, 0])
    }

    pub fn secondary_rgb(&self) -> [u8; 3] {
        parse_hex_color(&self.secondary_color).unwrap_or([0, 0, 0])
    }
}

/// 解析 `#RRGGBB` / `#RGB`（`#` 可省略）
pub fn parse_hex_color(value: &str) -> Option<[u8; 3]> {
    let hex = value.trim().trim_start_matches('#');
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    match hex.len() {
        6 => {
            let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
            let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
            let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
            Some([r, g, b])
        }
        3 => {
            let mut rgb = [0u8; 3];
            for (i, c) in hex.chars().enumerate() {
                let v = c.to_digit(16)? as u8;
                rgb[i] = v * 17;
            }
            Some(rgb)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_color() {
        assert_eq!(parse_hex_color("#1A1F2C"), Some([0x1a, 0x1f, 0x2c]));
        assert_eq!(parse_hex_color("fff"), Some([255, 255, 255]));
        assert_eq!(parse_hex_color("#12345"), None);
        assert_eq!(parse_hex_color("purple"), None);
    }

    #[test]
    fn test_defaults_fill_missing_fields() {
        let brand: BrandStyle = serde_json::from_str(
            r##"{"primaryColor": "#9b87f5", "secondaryColor": "#1A1F2C", "accentColor": "#F97316"}"##,
        )
        .unwrap();
        assert_eq!(brand.font_size.heading, 96);
        assert_eq!(brand.image_filters.brightness, 1.0);
        assert_eq!(brand.layout.style, LayoutStyle::Balanced);
        assert!(brand.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_color() {
        let brand: BrandStyle = serde_json::from_str(
            r##"{"primaryColor": "violet", "secondaryColor": "#1A1F2C", "accentColor": "#F97316"}"##,
        )
        .unwrap();
        assert!(matches!(brand.validate(), Err(VideoError::InvalidInputError(_))));
    }
}
