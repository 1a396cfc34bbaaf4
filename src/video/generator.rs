use super::{run_ffmpeg, AudioTrack, MediaEncoder};
use crate::brand::parse_hex_color;
use crate::error::{Result, VideoError};
use crate::scene::{FrameSpec, Scene};
use crate::template::{Animation, AudioOptions};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::info;

/// 角标 logo 的宽度（像素）
const LOGO_WIDTH: u32 = 240;
const LOGO_MARGIN: u32 = 60;

pub struct VideoGenerator {
    work_dir: PathBuf,
}

impl VideoGenerator {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
        }
    }

    async fn create_video_segment(&self, scene: &Scene, frame: FrameSpec, output_path: &Path) -> Result<()> {
        info!(
            "Creating video segment {} ({:.1}s, image: {})",
            scene.index,
            scene.duration,
            scene
                .image_path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| format!("none, color {}", scene.bg_color))
        );

        run_ffmpeg(&segment_args(scene, frame, output_path), "FFmpeg segment creation").await?;

        info!("Created segment: {}", output_path.display());
        Ok(())
    }

    async fn concat_videos(&self, concat_file: &Path, output_path: &Path) -> Result<()> {
        info!("Concatenating video segments...");

        let args = vec![
            "-y".to_string(),
            "-f".to_string(),
            "concat".to_string(),
            "-safe".to_string(),
            "0".to_string(),
            "-i".to_string(),
            concat_file.display().to_string(),
            "-c".to_string(),
            "copy".to_string(),
            output_path.display().to_string(),
        ];
        run_ffmpeg(&args, "FFmpeg concat").await?;

        info!("Concatenated video: {}", output_path.display());
        Ok(())
    }

    async fn add_audio(
        &self,
        video_path: &Path,
        audio: &AudioTrack,
        total_duration: f64,
        output_path: &Path,
    ) -> Result<()> {
        info!("Adding audio {} to video...", audio.path.display());

        let mut args = vec![
            "-y".to_string(),
            "-i".to_string(),
            video_path.display().to_string(),
            "-ss".to_string(),
            format!("{:.3}", audio.options.start_time.max(0.0)),
            "-t".to_string(),
            format!("{:.3}", total_duration),
            "-i".to_string(),
            audio.path.display().to_string(),
        ];
        if let Some(filter) = audio_filter(&audio.options, total_duration) {
            args.push("-af".to_string());
            args.push(filter);
        }
        args.extend(
            [
                "-c:v", "copy", "-c:a", "aac", "-map", "0:v:0", "-map", "1:a:0", "-shortest",
            ]
            .map(String::from),
        );
        args.push(output_path.display().to_string());

        run_ffmpeg(&args, "FFmpeg audio merge").await?;

        info!("Added audio to video: {}", output_path.display());
        Ok(())
    }
}

#[async_trait]
impl MediaEncoder for VideoGenerator {
    /// 合成最终视频：逐个场景生成片段，按场景顺序拼接，再混入配乐
    async fn compose(
        &self,
        scenes: &[Scene],
        audio: Option<&AudioTrack>,
        output_path: &Path,
        frame: FrameSpec,
    ) -> Result<PathBuf> {
        if scenes.is_empty() {
            return Err(VideoError::VideoGenerationError("No scenes to encode".to_string()));
        }
        info!("Starting video generation ({} scenes)...", scenes.len());
        tokio::fs::create_dir_all(&self.work_dir).await?;

        let mut segment_paths = Vec::with_capacity(scenes.len());
        for scene in scenes {
            let segment_path = self.work_dir.join(format!("segment_{}.mp4", scene.index));
            self.create_video_segment(scene, frame, &segment_path).await?;

            // 转换为绝对路径
            let abs_segment_path = tokio::fs::canonicalize(&segment_path).await.map_err(|e| {
                VideoError::VideoGenerationError(format!("Failed to get absolute path: {}", e))
            })?;
            segment_paths.push(abs_segment_path);
        }

        let concat_file = self.work_dir.join("concat.txt");
        tokio::fs::write(&concat_file, concat_manifest(&segment_paths)).await?;

        let merged_video = self.work_dir.join("merged.mp4");
        self.concat_videos(&concat_file, &merged_video).await?;

        let total_duration: f64 = scenes.iter().map(|s| s.duration).sum();
        match audio {
            Some(track) => {
                self.add_audio(&merged_video, track, total_duration, output_path)
                    .await?
            }
            None => {
                info!("No audio track, copying merged video");
                tokio::fs::copy(&merged_video, output_path).await?;
            }
        }

        info!("Video generation completed: {}", output_path.display());

        // 清理临时文件
        tokio::fs::remove_file(&concat_file).await.ok();
        tokio::fs::remove_file(&merged_video).await.ok();
        for segment in segment_paths {
            tokio::fs::remove_file(&segment).await.ok();
        }

        Ok(output_path.to_path_buf())
    }
}

/// 单个场景片段的 ffmpeg 参数
///
/// 输入 0 为背景（循环图片或纯色源），其后依次为文字层、下方字幕条和 logo。
pub fn segment_args(scene: &Scene, frame: FrameSpec, output_path: &Path) -> Vec<String> {
    let FrameSpec { width, height, fps } = frame;
    let duration = format!("{:.3}", scene.duration);
    let mut args: Vec<String> = vec!["-y".to_string()];

    match &scene.image_path {
        Some(image) => push_looped_input(&mut args, image, &duration),
        None => {
            args.extend(["-f", "lavfi", "-t"].map(String::from));
            args.push(duration.clone());
            args.push("-i".to_string());
            args.push(format!(
                "color=c={}:s={}x{}:r={}",
                ffmpeg_color(&scene.bg_color),
                width,
                height,
                fps
            ));
        }
    }

    let mut graph = format!(
        "[0:v]scale={w}:{h}:force_original_aspect_ratio=increase,crop={w}:{h},setsar=1,fps={fps}{anim}[v0]",
        w = width,
        h = height,
        fps = fps,
        anim = animation_filter(scene.animation, scene.duration, frame),
    );
    let mut last = "v0".to_string();
    let mut input = 1;

    for layer in [&scene.overlay_path, &scene.lower_third_path].into_iter().flatten() {
        push_looped_input(&mut args, layer, &duration);
        let label = format!("v{}", input);
        graph.push_str(&format!(";[{}][{}:v]overlay=0:0[{}]", last, input, label));
        last = label;
        input += 1;
    }

    if let Some(logo) = &scene.logo_path {
        push_looped_input(&mut args, logo, &duration);
        let label = format!("v{}", input);
        graph.push_str(&format!(
            ";[{i}:v]scale={lw}:-1[logo];[{last}][logo]overlay=W-w-{m}:{m}[{label}]",
            i = input,
            lw = LOGO_WIDTH,
            last = last,
            m = LOGO_MARGIN,
            label = label,
        ));
        last = label;
    }

    args.push("-filter_complex".to_string());
    args.push(graph);
    args.push("-map".to_string());
    args.push(format!("[{}]", last));
    args.push("-t".to_string());
    args.push(duration);
    args.extend(["-r".to_string(), fps.to_string()]);
    args.extend(["-c:v", "libx264", "-pix_fmt", "yuv420p"].map(String::from));
    args.push(output_path.display().to_string());
    args
}

fn push_looped_input(args: &mut Vec<String>, path: &Path, duration: &str) {
    args.extend(["-loop", "1", "-t"].map(String::from));
    args.push(duration.to_string());
    args.push("-i".to_string());
    args.push(path.display().to_string());
}

fn animation_filter(animation: Animation, duration: f64, frame: FrameSpec) -> String {
    match animation {
        Animation::None => String::new(),
        Animation::Fade => {
            let fade = (duration / 4.0).min(0.5);
            format!(
                ",fade=t=in:st=0:d={fade:.3},fade=t=out:st={out:.3}:d={fade:.3}",
                fade = fade,
                out = (duration - fade).max(0.0),
            )
        }
        Animation::Zoom => format!(
            ",zoompan=z='min(1+0.0006*on,1.2)':x='iw/2-(iw/zoom/2)':y='ih/2-(ih/zoom/2)':d=1:s={}x{}:fps={}",
            frame.width, frame.height, frame.fps
        ),
    }
}

/// 配乐的淡入淡出与音量滤镜，无需处理时返回 None
pub fn audio_filter(options: &AudioOptions, total_duration: f64) -> Option<String> {
    let mut filters = Vec::new();
    if options.fade_in > 0.0 {
        filters.push(format!("afade=t=in:st=0:d={:.3}", options.fade_in));
    }
    if options.fade_out > 0.0 {
        filters.push(format!(
            "afade=t=out:st={:.3}:d={:.3}",
            (total_duration - options.fade_out).max(0.0),
            options.fade_out
        ));
    }
    if (options.volume - 1.0).abs() > f64::EPSILON {
        filters.push(format!("volume={:.2}", options.volume));
    }
    if filters.is_empty() {
        None
    } else {
        Some(filters.join(","))
    }
}

fn concat_manifest(segments: &[PathBuf]) -> String {
    segments
        .iter()
        .map(|p| format!("file '{}'\n", p.display().to_string().replace('\'', "'\\''")))
        .collect()
}

fn ffmpeg_color(color: &str) -> String {
    match parse_hex_color(color) {
        Some([r, g, b]) => format!("0x{:02X}{:02X}{:02X}", r, g, b),
        None => color.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arg_after<'a>(args: &'a [String], flag: &str) -> &'a str {
        let pos = args.iter().position(|a| a == flag).unwrap();
        &args[pos + 1]
    }

    #[test]
    fn test_color_only_segment() {
        let mut scene = Scene::new(2, 5.0);
        scene.bg_color = "#1A1F2C".to_string();
        let args = segment_args(&scene, FrameSpec::VERTICAL_1080, Path::new("/tmp/seg.mp4"));

        assert_eq!(args[1], "-f");
        assert_eq!(arg_after(&args, "-i"), "color=c=0x1A1F2C:s=1080x1920:r=30");
        assert_eq!(arg_after(&args, "-map"), "[v0]");
        assert_eq!(args.last().unwrap(), "/tmp/seg.mp4");
    }

    #[test]
    fn test_image_segment_with_layers() {
        let mut scene = Scene::new(0, 3.0);
        scene.image_path = Some(PathBuf::from("bg.png"));
        scene.overlay_path = Some(PathBuf::from("text_overlay_0.png"));
        scene.logo_path = Some(PathBuf::from("logo.png"));
        scene.animation = Animation::Zoom;
        let args = segment_args(&scene, FrameSpec::VERTICAL_1080, Path::new("out.mp4"));

        let inputs: Vec<&String> = args
            .iter()
            .zip(args.iter().skip(1))
            .filter(|(flag, _)| *flag == "-i")
            .map(|(_, value)| value)
            .collect();
        assert_eq!(inputs, ["bg.png", "text_overlay_0.png", "logo.png"]);

        let graph = arg_after(&args, "-filter_complex");
        assert!(graph.contains("zoompan"));
        assert!(graph.contains("[v0][1:v]overlay=0:0[v1]"));
        assert!(graph.contains("[2:v]scale=240:-1[logo];[v1][logo]"));
        assert_eq!(arg_after(&args, "-map"), "[v2]");
        assert_eq!(arg_after(&args, "-t"), "3.000");
    }

    #[test]
    fn test_fade_is_bounded_by_duration() {
        let filter = animation_filter(Animation::Fade, 1.0, FrameSpec::VERTICAL_1080);
        assert_eq!(filter, ",fade=t=in:st=0:d=0.250,fade=t=out:st=0.750:d=0.250");
    }

    #[test]
    fn test_audio_filter() {
        assert_eq!(audio_filter(&AudioOptions::default(), 30.0), None);
        let options = AudioOptions {
            start_time: 42.0,
            fade_in: 1.0,
            fade_out: 2.0,
            volume: 0.8,
        };
        assert_eq!(
            audio_filter(&options, 30.0).unwrap(),
            "afade=t=in:st=0:d=1.000,afade=t=out:st=28.000:d=2.000,volume=0.80"
        );
    }

    #[test]
    fn test_concat_manifest_keeps_order() {
        let manifest = concat_manifest(&[PathBuf::from("/w/segment_0.mp4"), PathBuf::from("/w/it's_1.mp4")]);
        let lines: Vec<&str> = manifest.lines().collect();
        assert_eq!(lines, ["file '/w/segment_0.mp4'", "file '/w/it'\\''s_1.mp4'"]);
    }
}
