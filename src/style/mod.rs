use crate::brand::{parse_hex_color, BrandStyle, LayoutStyle};
use crate::error::{Result, VideoError};
use crate::scene::FrameSpec;
use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use std::path::{Path, PathBuf};
use tracing::info;

/// 主体缩略图边长（像素）
pub const THUMBNAIL_SIZE: u32 = 400;

const SHARPEN_KERNEL: [f32; 9] = [0.0, -0.5, 0.0, -0.5, 3.0, -0.5, 0.0, -0.5, 0.0];

/// 对生成的背景图应用品牌滤镜并写入 `output_path`
///
/// 处理顺序：裁切到画面尺寸 → 亮度/饱和度 → 锐化 → 叠加色调 → 主体缩略图。
/// 相同输入总是得到相同输出。
pub fn apply_brand_filters(
    image_path: &Path,
    brand: &BrandStyle,
    thumbnail: Option<&RgbaImage>,
    frame: FrameSpec,
    output_path: &Path,
) -> Result<PathBuf> {
    // 按内容识别格式，生成服务下载的图片扩展名不一定可信
    let source = std::fs::read(image_path)
        .map_err(|e| e.to_string())
        .and_then(|bytes| image::load_from_memory(&bytes).map_err(|e| e.to_string()))
        .map_err(|e| VideoError::ImageProcessingError(format!("{}: {}", image_path.display(), e)))?;
    let branded = brand_image(&source, brand, thumbnail, frame);
    let saved = save_png(&branded, output_path)?;
    info!("Applied brand filters: {} -> {}", image_path.display(), saved.display());
    Ok(saved)
}

pub fn brand_image(
    source: &DynamicImage,
    brand: &BrandStyle,
    thumbnail: Option<&RgbaImage>,
    frame: FrameSpec,
) -> RgbaImage {
    let filters = &brand.image_filters;
    let mut img = source
        .resize_to_fill(frame.width, frame.height, FilterType::Lanczos3)
        .to_rgba8();

    adjust_brightness_saturation(&mut img, filters.brightness, filters.saturation);
    let mut img = sharpen(&img);
    let tint = parse_hex_color(&filters.overlay_color).unwrap_or([0, 0, 0]);
    overlay_tint(&mut img, tint, filters.overlay_opacity);

    if let Some(thumb) = thumbnail {
        composite_thumbnail(&mut img, thumb, brand.layout.style);
    }
    img
}

pub fn adjust_brightness_saturation(img: &mut RgbaImage, brightness: f32, saturation: f32) {
    for pixel in img.pixels_mut() {
        let [r, g, b, a] = pixel.0;
        let r = r as f32 * brightness;
        let g = g as f32 * brightness;
        let b = b as f32 * brightness;
        let luma = 0.299 * r + 0.587 * g + 0.114 * b;
        let saturate = |c: f32| to_channel(luma + (c - luma) * saturation);
        *pixel = Rgba([saturate(r), saturate(g), saturate(b), a]);
    }
}

/// 3x3 锐化卷积，边缘像素按最近像素延展
pub fn sharpen(img: &RgbaImage) -> RgbaImage {
    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return img.clone();
    }
    let max_x = width as i64 - 1;
    let max_y = height as i64 - 1;

    RgbaImage::from_fn(width, height, |x, y| {
        let mut acc = [0.0f32; 3];
        for ky in 0..3i64 {
            for kx in 0..3i64 {
                let weight = SHARPEN_KERNEL[(ky * 3 + kx) as usize];
                if weight == 0.0 {
                    continue;
                }
                let sx = (x as i64 + kx - 1).clamp(0, max_x) as u32;
                let sy = (y as i64 + ky - 1).clamp(0, max_y) as u32;
                let p = img.get_pixel(sx, sy);
                for (c, slot) in acc.iter_mut().enumerate() {
                    *slot += p[c] as f32 * weight;
                }
            }
        }
        let alpha = img.get_pixel(x, y)[3];
        Rgba([to_channel(acc[0]), to_channel(acc[1]), to_channel(acc[2]), alpha])
    })
}

/// 以 overlay 混合模式叠加纯色，再按不透明度与原图混合
pub fn overlay_tint(img: &mut RgbaImage, color: [u8; 3], opacity: f32) {
    let opacity = opacity.clamp(0.0, 1.0);
    if opacity == 0.0 {
        return;
    }
    for pixel in img.pixels_mut() {
        for c in 0..3 {
            let base = pixel[c] as f32;
            let blended = overlay_channel(pixel[c], color[c]) * 255.0;
            pixel[c] = to_channel(base * (1.0 - opacity) + blended * opacity);
        }
    }
}

fn overlay_channel(base: u8, blend: u8) -> f32 {
    let b = base as f32 / 255.0;
    let o = blend as f32 / 255.0;
    if b < 0.5 {
        2.0 * b * o
    } else {
        1.0 - 2.0 * (1.0 - b) * (1.0 - o)
    }
}

fn to_channel(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

/// 解码主体图片并居中裁切为固定尺寸的缩略图
pub fn prepare_thumbnail(bytes: &[u8]) -> Result<RgbaImage> {
    let source = image::load_from_memory(bytes)?;
    Ok(source
        .resize_to_fill(THUMBNAIL_SIZE, THUMBNAIL_SIZE, FilterType::Lanczos3)
        .to_rgba8())
}

/// 缩略图左上角坐标，水平居中，垂直位置由版式决定
pub fn thumbnail_anchor(width: u32, height: u32, layout: LayoutStyle) -> (i64, i64) {
    let size = THUMBNAIL_SIZE as i64;
    let x = (width as i64 - size) / 2;
    let y = match layout {
        LayoutStyle::Balanced => height as i64 * 3 / 10,
        LayoutStyle::ArtistFocused => (height as i64 - size) / 2,
        LayoutStyle::LogoFocused => height as i64 * 6 / 10,
    };
    (x, y)
}

pub fn composite_thumbnail(canvas: &mut RgbaImage, thumbnail: &RgbaImage, layout: LayoutStyle) {
    let (x, y) = thumbnail_anchor(canvas.width(), canvas.height(), layout);
    imageops::overlay(canvas, thumbnail, x, y);
}

pub fn solid_canvas(color: [u8; 3], frame: FrameSpec) -> RgbaImage {
    RgbaImage::from_pixel(frame.width, frame.height, Rgba([color[0], color[1], color[2], 255]))
}

/// 从上到下的线性渐变
pub fn gradient_canvas(top: [u8; 3], bottom: [u8; 3], frame: FrameSpec) -> RgbaImage {
    let span = frame.height.saturating_sub(1).max(1) as f32;
    RgbaImage::from_fn(frame.width, frame.height, |_, y| {
        let t = y as f32 / span;
        let mix = |c: usize| to_channel(top[c] as f32 + (bottom[c] as f32 - top[c] as f32) * t);
        Rgba([mix(0), mix(1), mix(2), 255])
    })
}

/// 纯色画布 + 主体缩略图
pub fn thumbnail_canvas(
    color: [u8; 3],
    thumbnail: &RgbaImage,
    layout: LayoutStyle,
    frame: FrameSpec,
) -> RgbaImage {
    let mut canvas = solid_canvas(color, frame);
    composite_thumbnail(&mut canvas, thumbnail, layout);
    canvas
}

pub fn save_png(img: &RgbaImage, path: &Path) -> Result<PathBuf> {
    img.save_with_format(path, ImageFormat::Png)?;
    Ok(path.to_path_buf())
}
