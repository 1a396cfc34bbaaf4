use super::fallback;
use super::{FrameSpec, Scene};
use crate::api::ImageGenerator;
use crate::brand::{parse_hex_color, BrandStyle};
use crate::error::{Result, VideoError};
use crate::overlay::{OverlayRequest, OverlayStyle, TextOverlayRenderer};
use crate::style;
use crate::template::{
    resolve, Element, ImageElement, Section, Template, TextPosition, VariableMap,
};
use image::RgbaImage;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// 把填充后的模板逐段编译为场景列表
///
/// 段落严格按顺序处理：上一个场景追加完成后才开始下一个段落，
/// 外部调用（图片生成、文字渲染）都在此处逐一等待。
pub struct SceneCompiler<'a> {
    images: &'a dyn ImageGenerator,
    overlays: &'a dyn TextOverlayRenderer,
    frame: FrameSpec,
    thumbnail_path: Option<PathBuf>,
    thumbnail: Option<RgbaImage>,
    thumbnail_loaded: bool,
    reuse_existing: bool,
}

impl<'a> SceneCompiler<'a> {
    pub fn new(images: &'a dyn ImageGenerator, overlays: &'a dyn TextOverlayRenderer) -> Self {
        Self {
            images,
            overlays,
            frame: FrameSpec::default(),
            thumbnail_path: None,
            thumbnail: None,
            thumbnail_loaded: false,
            reuse_existing: false,
        }
    }

    pub fn with_frame(mut self, frame: FrameSpec) -> Self {
        self.frame = frame;
        self
    }

    /// 主体缩略图，用于品牌合成和降级画面
    pub fn with_thumbnail(mut self, path: impl Into<PathBuf>) -> Self {
        self.thumbnail_path = Some(path.into());
        self.thumbnail = None;
        self.thumbnail_loaded = false;
        self
    }

    /// 已存在的 `section_{i}_branded.png` 直接复用，不再调用图片生成
    pub fn reuse_existing_images(mut self, reuse: bool) -> Self {
        self.reuse_existing = reuse;
        self
    }

    pub async fn compile(
        &mut self,
        filled: &Template,
        brand: &BrandStyle,
        vars: &VariableMap,
        output_dir: &Path,
    ) -> Result<Vec<Scene>> {
        if filled.sections.is_empty() {
            return Err(VideoError::NoScenesProducedError(filled.template_name.clone()));
        }
        tokio::fs::create_dir_all(output_dir).await?;
        self.load_thumbnail().await;

        let total = filled.sections.len();
        let mut scenes = Vec::with_capacity(total);
        let mut failed_sections = 0;

        for (index, section) in filled.sections.iter().enumerate() {
            info!(
                "Compiling section {}/{} ({}, {:.1}s)",
                index + 1,
                total,
                section.kind,
                section.duration_secs()
            );
            let (scene, failed) = self
                .compile_section(index, section, brand, vars, output_dir)
                .await?;
            if failed {
                failed_sections += 1;
            }
            scenes.push(scene);
        }

        fallback::ensure_scene_floor(&mut scenes, failed_sections, brand, self.frame, output_dir);
        debug_assert_eq!(scenes.len(), filled.sections.len());

        info!(
            "Compiled {} scenes ({:.1}s, {} degraded)",
            scenes.len(),
            scenes.iter().map(|s| s.duration).sum::<f64>(),
            failed_sections
        );
        Ok(scenes)
    }

    async fn load_thumbnail(&mut self) {
        if self.thumbnail_loaded {
            return;
        }
        self.thumbnail_loaded = true;
        let Some(path) = self.thumbnail_path.clone() else {
            return;
        };

        match tokio::fs::read(&path).await {
            Ok(bytes) => match style::prepare_thumbnail(&bytes) {
                Ok(thumb) => {
                    info!("Loaded subject thumbnail {}", path.display());
                    self.thumbnail = Some(thumb);
                }
                Err(e) => warn!("Thumbnail {} could not be decoded: {}", path.display(), e),
            },
            Err(e) => warn!("Thumbnail {} could not be read: {}", path.display(), e),
        }
    }

    /// 编译单个段落；返回的布尔值表示背景解析是否走了降级
    async fn compile_section(
        &self,
        index: usize,
        section: &Section,
        brand: &BrandStyle,
        vars: &VariableMap,
        output_dir: &Path,
    ) -> Result<(Scene, bool)> {
        let mut scene = Scene::new(index, section.duration_secs());
        let mut failed = false;

        for element in &section.elements {
            match element {
                Element::Text(text) => {
                    let (heading, subtext, position) = overlay_content(section, &text.content);
                    let position = position.or(text.position).unwrap_or_default();
                    let style = OverlayStyle {
                        position,
                        color: text.color.clone(),
                    };
                    let path = output_dir.join(format!("text_overlay_{}.png", index));
                    let rendered = self
                        .render_overlay(index, &heading, &subtext, style, brand, &path)
                        .await?;
                    scene.overlay_path = Some(rendered);
                    scene.text_position = position;
                    if let Some(animation) = text.animation {
                        scene.animation = animation;
                    }
                }
                Element::LowerThird(lower) => {
                    let style = OverlayStyle {
                        position: TextPosition::Bottom,
                        color: None,
                    };
                    let path = output_dir.join(format!("lower_third_{}.png", index));
                    let rendered = self
                        .render_overlay(index, &lower.content, &lower.subtext, style, brand, &path)
                        .await?;
                    scene.lower_third_path = Some(rendered);
                }
                Element::Image(image) => {
                    match self.resolve_image(index, image, brand, vars, output_dir).await {
                        Ok(path) => scene.image_path = Some(path),
                        Err(e) => {
                            failed = true;
                            self.recover(index, &e, brand, output_dir, &mut scene);
                        }
                    }
                }
                Element::ImageSequence(sequence) => {
                    match self
                        .resolve_sequence(index, &sequence.paths, brand, vars, output_dir)
                        .await
                    {
                        Ok(path) => scene.image_path = Some(path),
                        Err(e) => {
                            failed = true;
                            self.recover(index, &e, brand, output_dir, &mut scene);
                        }
                    }
                }
                Element::Background(background) => {
                    if !background.color.trim().is_empty() {
                        scene.bg_color = background.color.clone();
                    }
                    if !has_image_source(section) {
                        if let Some(composite) =
                            self.background_composite(index, &background.color, brand, output_dir)
                        {
                            scene.image_path = Some(composite);
                        }
                    }
                }
                Element::Logo(logo) => {
                    let path = PathBuf::from(resolve(&logo.path, vars));
                    if tokio::fs::metadata(&path).await.is_ok() {
                        scene.logo_path = Some(path);
                    } else {
                        warn!("Section {} logo {} not found, skipping", index, path.display());
                    }
                }
                Element::Unknown => debug!("Section {} has an unsupported element, skipping", index),
            }
        }

        Ok((scene, failed))
    }

    fn recover(
        &self,
        index: usize,
        cause: &VideoError,
        brand: &BrandStyle,
        output_dir: &Path,
        scene: &mut Scene,
    ) {
        let recovered = fallback::recover_background(
            index,
            cause,
            brand,
            self.thumbnail.as_ref(),
            self.frame,
            output_dir,
        );
        if let Some(path) = recovered.path {
            scene.image_path = Some(path);
        }
    }

    async fn resolve_image(
        &self,
        index: usize,
        image: &ImageElement,
        brand: &BrandStyle,
        vars: &VariableMap,
        output_dir: &Path,
    ) -> Result<PathBuf> {
        let branded = output_dir.join(format!("section_{}_branded.png", index));

        // 检查图片是否已存在，跳过已生成的
        if self.reuse_existing && tokio::fs::metadata(&branded).await.is_ok() {
            info!("Section {} image already exists, skipping...", index);
            return Ok(branded);
        }

        let source = match (&image.path, &image.prompt) {
            (Some(path), _) => PathBuf::from(resolve(path, vars)),
            (None, Some(prompt)) => {
                let styled = styled_prompt(prompt, brand);
                let raw = output_dir.join(format!("section_{}_generated.png", index));
                let results = self.images.generate(&styled, &raw).await?;
                results.into_iter().next().ok_or_else(|| {
                    VideoError::ApiError(format!("Image generator returned no results for section {}", index))
                })?
            }
            (None, None) => {
                return Err(VideoError::InvalidInputError(format!(
                    "image element in section {} has neither prompt nor path",
                    index
                )))
            }
        };

        style::apply_brand_filters(&source, brand, self.thumbnail.as_ref(), self.frame, &branded)
    }

    /// 使用序列中第一张能正常处理的图片
    async fn resolve_sequence(
        &self,
        index: usize,
        paths: &[String],
        brand: &BrandStyle,
        vars: &VariableMap,
        output_dir: &Path,
    ) -> Result<PathBuf> {
        let branded = output_dir.join(format!("section_{}_branded.png", index));
        for raw in paths {
            let path = PathBuf::from(resolve(raw, vars));
            match style::apply_brand_filters(&path, brand, self.thumbnail.as_ref(), self.frame, &branded) {
                Ok(processed) => return Ok(processed),
                Err(e) => debug!("Section {} sequence image {} unusable: {}", index, path.display(), e),
            }
        }
        Err(VideoError::ImageProcessingError(format!(
            "no usable image among {} sequence entries",
            paths.len()
        )))
    }

    /// 配置了主体缩略图时，生成纯色画布 + 缩略图的背景
    fn background_composite(
        &self,
        index: usize,
        color: &str,
        brand: &BrandStyle,
        output_dir: &Path,
    ) -> Option<PathBuf> {
        let thumb = self.thumbnail.as_ref()?;
        let Some(rgb) = parse_hex_color(color) else {
            warn!("Section {} background '{}' is not a hex color, skipping composite", index, color);
            return None;
        };
        let canvas = style::thumbnail_canvas(rgb, thumb, brand.layout.style, self.frame);
        let path = output_dir.join(format!("section_{}_branded.png", index));
        match style::save_png(&canvas, &path) {
            Ok(path) => Some(path),
            Err(e) => {
                warn!("Section {} background composite failed: {}", index, e);
                None
            }
        }
    }

    async fn render_overlay(
        &self,
        index: usize,
        text: &str,
        subtext: &str,
        style: OverlayStyle,
        brand: &BrandStyle,
        path: &Path,
    ) -> Result<PathBuf> {
        // 先删掉旧文件，保证存在性检查反映本次渲染结果
        tokio::fs::remove_file(path).await.ok();

        let request = OverlayRequest {
            text,
            subtext,
            width: self.frame.width,
            height: self.frame.height,
            brand,
            output_path: path,
            style,
        };

        match self.try_render(&request).await {
            Ok(()) => Ok(path.to_path_buf()),
            Err(e) => {
                warn!("Overlay for section {} failed ({}), retrying with default style", index, e);
                let plain = OverlayRequest {
                    style: OverlayStyle::default(),
                    ..request
                };
                self.try_render(&plain)
                    .await
                    .map(|_| path.to_path_buf())
                    .map_err(|e| VideoError::MissingOverlayError {
                        section: index,
                        reason: e.to_string(),
                    })
            }
        }
    }

    async fn try_render(&self, request: &OverlayRequest<'_>) -> Result<()> {
        self.overlays
            .render(request)
            .await
            .map_err(|e| VideoError::OverlayGenerationError(e.to_string()))?;
        if tokio::fs::metadata(request.output_path).await.is_err() {
            return Err(VideoError::OverlayGenerationError(format!(
                "{} was not written",
                request.output_path.display()
            )));
        }
        Ok(())
    }
}

/// 在生成提示词后追加品牌配色与基调
pub fn styled_prompt(prompt: &str, brand: &BrandStyle) -> String {
    format!(
        "{}, color palette of {} and {}, {} mood, vertical 9:16 composition, no text",
        prompt.trim().trim_end_matches(['.', ',']),
        brand.primary_color,
        brand.accent_color,
        brand.tone
    )
}

fn has_image_source(section: &Section) -> bool {
    section
        .elements
        .iter()
        .any(|e| matches!(e, Element::Image(_) | Element::ImageSequence(_)))
}

/// 文字层内容：优先使用段落的 overlay 配置，否则使用元素自身文本
fn overlay_content(section: &Section, content: &str) -> (String, String, Option<TextPosition>) {
    match &section.overlay {
        Some(spec) if spec.uppercase => (
            spec.text.to_uppercase(),
            spec.subtext.to_uppercase(),
            spec.position,
        ),
        Some(spec) => (spec.text.clone(), spec.subtext.clone(), spec.position),
        None => (content.to_string(), String::new(), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::OverlayTextSpec;

    fn brand() -> BrandStyle {
        serde_json::from_str(
            r##"{"primaryColor": "#9b87f5", "secondaryColor": "#1A1F2C", "accentColor": "#F97316", "tone": "dark energetic"}"##,
        )
        .unwrap()
    }

    #[test]
    fn test_styled_prompt_appends_brand() {
        let prompt = styled_prompt("techno warehouse crowd.", &brand());
        assert_eq!(
            prompt,
            "techno warehouse crowd, color palette of #9b87f5 and #F97316, dark energetic mood, vertical 9:16 composition, no text"
        );
    }

    #[test]
    fn test_overlay_content_prefers_section_overlay() {
        let mut section = Section {
            kind: "intro".to_string(),
            duration: Some(3.0),
            elements: Vec::new(),
            overlay: None,
        };
        assert_eq!(
            overlay_content(&section, "fallback"),
            ("fallback".to_string(), String::new(), None)
        );

        section.overlay = Some(OverlayTextSpec {
            text: "Akila".to_string(),
            subtext: "house".to_string(),
            position: Some(TextPosition::Top),
            uppercase: true,
        });
        assert_eq!(
            overlay_content(&section, "fallback"),
            ("AKILA".to_string(), "HOUSE".to_string(), Some(TextPosition::Top))
        );
    }
}
