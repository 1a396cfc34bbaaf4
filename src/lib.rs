pub mod api;
pub mod brand;
pub mod error;
pub mod overlay;
pub mod pipeline;
pub mod scene;
pub mod style;
pub mod template;
pub mod video;

pub use brand::BrandStyle;
pub use error::{Result, VideoError};
pub use scene::{FrameSpec, Scene, SceneCompiler};
pub use template::{Template, VariableMap};
