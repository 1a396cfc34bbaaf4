pub mod compiler;
pub mod fallback;

pub use compiler::{styled_prompt, SceneCompiler};
pub use fallback::FallbackTier;

use crate::template::{Animation, TextPosition};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// 未设置背景色时使用的颜色
pub const DEFAULT_BG_COLOR: &str = "#000000";

/// 表示一个场景：模板中一个段落编译后的结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    /// 场景序号，与段落序号一致
    pub index: usize,
    /// 背景图片；为空时只使用背景色
    pub image_path: Option<PathBuf>,
    /// 文字叠加层图片
    pub overlay_path: Option<PathBuf>,
    pub lower_third_path: Option<PathBuf>,
    pub logo_path: Option<PathBuf>,
    pub text_position: TextPosition,
    /// 该场景的时长（秒）
    pub duration: f64,
    pub animation: Animation,
    pub bg_color: String,
}

impl Scene {
    pub fn new(index: usize, duration: f64) -> Self {
        Self {
            index,
            image_path: None,
            overlay_path: None,
            lower_third_path: None,
            logo_path: None,
            text_position: TextPosition::Center,
            duration,
            animation: Animation::None,
            bg_color: DEFAULT_BG_COLOR.to_string(),
        }
    }
}

/// 输出画面规格，固定为竖屏
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameSpec {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

impl FrameSpec {
    pub const VERTICAL_1080: FrameSpec = FrameSpec {
        width: 1080,
        height: 1920,
        fps: 30,
    };
}

impl Default for FrameSpec {
    fn default() -> Self {
        Self::VERTICAL_1080
    }
}
