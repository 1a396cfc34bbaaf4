use anyhow::Context;
use auto_promo::api::QwenClient;
use auto_promo::brand::BrandStyle;
use auto_promo::overlay::FfmpegOverlayRenderer;
use auto_promo::pipeline::{self, Collaborators, PromoRequest};
use auto_promo::scene::FrameSpec;
use auto_promo::template::VariableMap;
use auto_promo::video::VideoGenerator;
use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "auto-promo")]
#[command(about = "Branded promo video generation from JSON scene templates", long_about = None)]
struct Args {
    /// Template type, e.g. artist-promo
    #[arg(short, long)]
    template: String,

    /// Directory containing template JSON files
    #[arg(long, default_value = "./templates")]
    templates_dir: PathBuf,

    /// Brand style JSON file
    #[arg(short, long, default_value = "./config/brand.json")]
    brand: PathBuf,

    /// Template variable as key=value (repeatable)
    #[arg(long = "var", value_parser = parse_var)]
    vars: Vec<(String, String)>,

    /// Background music file
    #[arg(short, long)]
    audio: Option<PathBuf>,

    /// Subject image composited onto branded backgrounds
    #[arg(long)]
    thumbnail: Option<PathBuf>,

    /// Output video file path
    #[arg(short, long, default_value = "promo.mp4")]
    output: PathBuf,

    /// Working directory for temporary files
    #[arg(short = 'w', long, default_value = "./output")]
    work_dir: PathBuf,

    /// DashScope API key
    #[arg(long)]
    api_key: Option<String>,

    /// Skip image generation (use existing branded images)
    #[arg(long)]
    skip_images: bool,

    /// Use the filled script template instead of generating a script
    #[arg(long)]
    no_script: bool,
}

fn parse_var(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{}'", raw))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty variable name in '{}'", raw));
    }
    Ok((key.to_string(), value.to_string()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_target(false)
        .with_thread_ids(false)
        .with_level(true)
        .init();

    // 加载环境变量
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // 获取 API key
    let api_key = if let Some(key) = args.api_key.clone() {
        key
    } else if let Ok(key) = std::env::var("DASHSCOPE_API_KEY") {
        key
    } else {
        eprintln!("Error: DASHSCOPE_API_KEY not found. Please set it via --api-key or DASHSCOPE_API_KEY environment variable");
        std::process::exit(1);
    };

    info!("Starting promo generation for template '{}'...", args.template);

    tokio::fs::create_dir_all(&args.work_dir)
        .await
        .context("Failed to create work directory")?;

    let brand = BrandStyle::load(&args.brand)
        .await
        .with_context(|| format!("Failed to load brand style: {}", args.brand.display()))?;

    let client = QwenClient::new(api_key).context("Failed to create DashScope client")?;
    let overlays = FfmpegOverlayRenderer;
    let encoder = VideoGenerator::new(args.work_dir.clone());

    let request = PromoRequest {
        template_type: args.template,
        templates_dir: args.templates_dir,
        variables: args.vars.into_iter().collect::<VariableMap>(),
        audio: args.audio,
        thumbnail: args.thumbnail,
        output_path: args.output,
        work_dir: args.work_dir,
        reuse_existing_images: args.skip_images,
        generate_script: !args.no_script,
        frame: FrameSpec::VERTICAL_1080,
    };
    let collaborators = Collaborators {
        script: &client,
        images: &client,
        overlays: &overlays,
        encoder: &encoder,
    };

    match pipeline::run(&request, &brand, collaborators).await {
        Ok(output) => {
            info!("Script:\n{}", output.script);
            info!(
                "Promo generation completed successfully: {} ({} scenes)",
                output.video_path.display(),
                output.scenes.len()
            );
        }
        Err(e) => {
            error!("Promo generation failed: {}", e);
            std::process::exit(1);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_var() {
        assert_eq!(
            parse_var("mixTitle=Head Ass=1"),
            Ok(("mixTitle".to_string(), "Head Ass=1".to_string()))
        );
        assert!(parse_var("artistName").is_err());
        assert!(parse_var("=x").is_err());
    }
}
