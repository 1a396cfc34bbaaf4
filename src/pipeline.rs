use crate::api::{ImageGenerator, ScriptGenerator};
use crate::brand::BrandStyle;
use crate::error::Result;
use crate::overlay::TextOverlayRenderer;
use crate::scene::{FrameSpec, Scene, SceneCompiler};
use crate::template::{fill_template, load_template, Template, VariableMap};
use crate::video::{AudioTrack, MediaEncoder};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// 一次宣传片生成请求
#[derive(Debug, Clone)]
pub struct PromoRequest {
    pub template_type: String,
    pub templates_dir: PathBuf,
    pub variables: VariableMap,
    pub audio: Option<PathBuf>,
    pub thumbnail: Option<PathBuf>,
    pub output_path: PathBuf,
    pub work_dir: PathBuf,
    /// 复用工作目录中已有的品牌化背景图
    pub reuse_existing_images: bool,
    /// 为 false 时直接使用填充后的文案模板
    pub generate_script: bool,
    pub frame: FrameSpec,
}

/// 流水线依赖的外部能力
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    pub script: &'a dyn ScriptGenerator,
    pub images: &'a dyn ImageGenerator,
    pub overlays: &'a dyn TextOverlayRenderer,
    pub encoder: &'a dyn MediaEncoder,
}

/// 编码前的全部产物
#[derive(Debug, Clone)]
pub struct CompiledPromo {
    pub template: Template,
    pub script: String,
    pub scenes: Vec<Scene>,
    pub audio: Option<AudioTrack>,
}

#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub video_path: PathBuf,
    pub script: String,
    pub scenes: Vec<Scene>,
}

/// 加载、填充、生成文案并编译场景，不做最终编码
pub async fn prepare(
    request: &PromoRequest,
    brand: &BrandStyle,
    collaborators: Collaborators<'_>,
) -> Result<CompiledPromo> {
    info!("Step 1/4: Loading template '{}'...", request.template_type);
    let template = load_template(&request.templates_dir, &request.template_type).await?;
    let filled = fill_template(&template, brand, &request.variables)?;

    info!("Step 2/4: Generating script...");
    let script = if request.generate_script {
        generate_script(collaborators.script, &filled).await
    } else {
        info!("Script generation disabled, using filled script template");
        filled.script_template.clone()
    };

    info!("Step 3/4: Compiling {} sections...", filled.sections.len());
    let mut compiler = SceneCompiler::new(collaborators.images, collaborators.overlays)
        .with_frame(request.frame)
        .reuse_existing_images(request.reuse_existing_images);
    if let Some(thumbnail) = &request.thumbnail {
        compiler = compiler.with_thumbnail(thumbnail.clone());
    }
    let scenes = compiler
        .compile(&filled, brand, &request.variables, &request.work_dir)
        .await?;

    let audio = request.audio.as_ref().map(|path| AudioTrack {
        path: path.clone(),
        options: filled.audio_options.clone(),
    });

    Ok(CompiledPromo {
        template: filled,
        script,
        scenes,
        audio,
    })
}

/// 完整流程：准备场景、写出文案与场景清单、合成视频
pub async fn run(
    request: &PromoRequest,
    brand: &BrandStyle,
    collaborators: Collaborators<'_>,
) -> Result<PipelineOutput> {
    let compiled = prepare(request, brand, collaborators).await?;
    write_artifacts(&request.work_dir, &compiled.script, &compiled.scenes).await?;

    info!("Step 4/4: Generating final video...");
    let video_path = collaborators
        .encoder
        .compose(
            &compiled.scenes,
            compiled.audio.as_ref(),
            &request.output_path,
            request.frame,
        )
        .await?;

    info!("Promo video written to {}", video_path.display());
    Ok(PipelineOutput {
        video_path,
        script: compiled.script,
        scenes: compiled.scenes,
    })
}

/// 文案生成失败或返回空内容时，退回填充后的文案模板
async fn generate_script(generator: &dyn ScriptGenerator, filled: &Template) -> String {
    match generator.generate(&filled.script_template).await {
        Ok(script) if !script.trim().is_empty() => {
            info!("Generated script ({} characters)", script.chars().count());
            script
        }
        Ok(_) => {
            warn!("Script generator returned empty text, using filled script template");
            filled.script_template.clone()
        }
        Err(e) => {
            warn!("Script generation failed ({}), using filled script template", e);
            filled.script_template.clone()
        }
    }
}

async fn write_artifacts(work_dir: &Path, script: &str, scenes: &[Scene]) -> Result<()> {
    tokio::fs::create_dir_all(work_dir).await?;
    tokio::fs::write(work_dir.join("script.txt"), script).await?;
    let manifest = serde_json::to_string_pretty(scenes)?;
    tokio::fs::write(work_dir.join("scenes.json"), manifest).await?;
    Ok(())
}
