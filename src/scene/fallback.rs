use super::{FrameSpec, Scene};
use crate::brand::BrandStyle;
use crate::error::VideoError;
use crate::style;
use image::RgbaImage;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{error, warn};

/// 降级层级
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackTier {
    /// 品牌色画布 + 主体缩略图
    ThumbnailCanvas,
    /// 品牌色渐变占位图
    Placeholder,
    /// 全部段落都失败时的兜底画面
    Floor,
}

impl fmt::Display for FallbackTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FallbackTier::ThumbnailCanvas => write!(f, "tier 1 (thumbnail canvas)"),
            FallbackTier::Placeholder => write!(f, "tier 2 (placeholder)"),
            FallbackTier::Floor => write!(f, "tier 3 (floor)"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Recovered {
    pub tier: FallbackTier,
    /// 写盘失败时为空，场景仍可只用背景色
    pub path: Option<PathBuf>,
}

/// 背景图生成或处理失败后给出替代图，从不返回错误
pub fn recover_background(
    section: usize,
    cause: &VideoError,
    brand: &BrandStyle,
    thumbnail: Option<&RgbaImage>,
    frame: FrameSpec,
    output_dir: &Path,
) -> Recovered {
    let output = output_dir.join(format!("section_{}_fallback.png", section));

    if let Some(thumb) = thumbnail {
        let canvas = style::thumbnail_canvas(brand.secondary_rgb(), thumb, brand.layout.style, frame);
        match style::save_png(&canvas, &output) {
            Ok(path) => {
                warn!(
                    "Section {} background failed ({}), using {}",
                    section,
                    cause,
                    FallbackTier::ThumbnailCanvas
                );
                return Recovered {
                    tier: FallbackTier::ThumbnailCanvas,
                    path: Some(path),
                };
            }
            Err(e) => warn!("Section {} thumbnail canvas could not be written: {}", section, e),
        }
    }

    let canvas = style::gradient_canvas(brand.primary_rgb(), brand.secondary_rgb(), frame);
    let path = match style::save_png(&canvas, &output) {
        Ok(path) => Some(path),
        Err(e) => {
            error!("Section {} placeholder could not be written: {}", section, e);
            None
        }
    };
    warn!(
        "Section {} background failed ({}), using {}",
        section,
        cause,
        FallbackTier::Placeholder
    );
    Recovered {
        tier: FallbackTier::Placeholder,
        path,
    }
}

/// 当所有段落的背景都解析失败且没有任何背景图时，为第一个场景补一张兜底画面
///
/// 只有在各段占位图都写盘失败后才会走到这里，此时兜底图多半也写不出去。
/// 真正的下限是每个场景都带背景色（`Scene::new` 默认 `#000000`），
/// 编码器在没有图片时用纯色源生成片段。
pub fn ensure_scene_floor(
    scenes: &mut [Scene],
    failed_sections: usize,
    brand: &BrandStyle,
    frame: FrameSpec,
    output_dir: &Path,
) -> Option<FallbackTier> {
    if scenes.is_empty() || failed_sections < scenes.len() {
        return None;
    }
    if scenes.iter().any(|scene| scene.image_path.is_some()) {
        return None;
    }

    let canvas = style::solid_canvas(brand.primary_rgb(), frame);
    let output = output_dir.join("fallback_floor.png");
    match style::save_png(&canvas, &output) {
        Ok(path) => scenes[0].image_path = Some(path),
        Err(e) => error!("Floor frame could not be written, scenes keep background colors: {}", e),
    }
    warn!("Every section failed to resolve, using {}", FallbackTier::Floor);
    Some(FallbackTier::Floor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    const SMALL: FrameSpec = FrameSpec {
        width: 90,
        height: 160,
        fps: 30,
    };

    fn brand() -> BrandStyle {
        serde_json::from_str(
            r##"{"primaryColor": "#9b87f5", "secondaryColor": "#1A1F2C", "accentColor": "#F97316"}"##,
        )
        .unwrap()
    }

    fn cause() -> VideoError {
        VideoError::ApiError("boom".to_string())
    }

    #[test]
    fn test_thumbnail_tier_preferred() {
        let dir = tempfile::tempdir().unwrap();
        let thumb = RgbaImage::from_pixel(4, 4, Rgba([255, 0, 0, 255]));
        let recovered = recover_background(2, &cause(), &brand(), Some(&thumb), SMALL, dir.path());
        assert_eq!(recovered.tier, FallbackTier::ThumbnailCanvas);
        assert_eq!(recovered.path, Some(dir.path().join("section_2_fallback.png")));
        assert!(dir.path().join("section_2_fallback.png").exists());
    }

    #[test]
    fn test_placeholder_without_thumbnail() {
        let dir = tempfile::tempdir().unwrap();
        let recovered = recover_background(0, &cause(), &brand(), None, SMALL, dir.path());
        assert_eq!(recovered.tier, FallbackTier::Placeholder);
        let img = image::open(recovered.path.unwrap()).unwrap().to_rgba8();
        assert_eq!(img.get_pixel(0, 0).0, [0x9b, 0x87, 0xf5, 255]);
    }

    #[test]
    fn test_unwritable_dir_degrades_to_color_only() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("does-not-exist");
        let recovered = recover_background(1, &cause(), &brand(), None, SMALL, &missing);
        assert_eq!(recovered.tier, FallbackTier::Placeholder);
        assert_eq!(recovered.path, None);
    }

    #[test]
    fn test_floor_only_when_everything_failed() {
        let dir = tempfile::tempdir().unwrap();
        let mut scenes = vec![Scene::new(0, 3.0), Scene::new(1, 5.0)];

        assert_eq!(ensure_scene_floor(&mut scenes, 1, &brand(), SMALL, dir.path()), None);
        assert!(scenes[0].image_path.is_none());

        assert_eq!(
            ensure_scene_floor(&mut scenes, 2, &brand(), SMALL, dir.path()),
            Some(FallbackTier::Floor)
        );
        assert_eq!(scenes[0].image_path, Some(dir.path().join("fallback_floor.png")));
        assert!(scenes[1].image_path.is_none());
    }
}
