use std::ffi::OsString;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use super::{EncodeRequest, Encoder};
use crate::error::{PipelineError, PipelineResult};

/// Codec settings handed to ffmpeg.
#[derive(Clone, Debug)]
pub struct CodecProfile {
    pub video_codec: String,
    pub pix_fmt: String,
    /// Ignored when `video_bitrate` is set.
    pub crf: u32,
    pub video_bitrate: Option<String>,
    pub audio_codec: String,
    pub audio_bitrate: String,
}

impl Default for CodecProfile {
    fn default() -> Self {
        Self {
            video_codec: "libx264".into(),
            pix_fmt: "yuv420p".into(),
            crf: 18,
            video_bitrate: None,
            audio_codec: "libmp3lame".into(),
            audio_bitrate: "192k".into(),
        }
    }
}

pub struct FfmpegEncoder {
    binary: PathBuf,
    profile: CodecProfile,
}

impl FfmpegEncoder {
    pub fn new(profile: CodecProfile) -> Self {
        Self {
            binary: PathBuf::from("ffmpeg"),
            profile,
        }
    }

    pub fn with_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = binary.into();
        self
    }

    pub fn is_available(&self) -> bool {
        Command::new(&self.binary)
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    pub fn build_args(&self, req: &EncodeRequest<'_>) -> Vec<OsString> {
        let (w, h) = (req.width, req.height);
        let filter = format!(
            "scale={w}:{h}:force_original_aspect_ratio=decrease,pad={w}:{h}:(ow-iw)/2:(oh-ih)/2:color=black"
        );

        let mut args: Vec<OsString> = vec![
            "-y".into(),
            "-loglevel".into(), "error".into(),
            "-f".into(), "image2".into(),
            "-framerate".into(), req.fps.to_string().into(),
            "-start_number".into(), "0".into(),
            "-i".into(), req.frame_pattern.as_os_str().to_owned(),
            "-i".into(), req.audio.as_os_str().to_owned(),
            "-map".into(), "0:v:0".into(),
            "-map".into(), "1:a:0".into(),
            "-vf".into(), filter.into(),
            "-c:v".into(), self.profile.video_codec.clone().into(),
            "-pix_fmt".into(), self.profile.pix_fmt.clone().into(),
        ];

        if let Some(ref br) = self.profile.video_bitrate {
            args.extend(os_args(["-b:v", br.as_str()]));
        } else {
            args.extend(os_args(["-crf", self.profile.crf.to_string().as_str()]));
            args.extend(os_args(["-preset", "medium"]));
        }

        args.extend(os_args([
            "-r", req.fps.to_string().as_str(),
            "-frames:v", req.frame_count.to_string().as_str(),
            "-c:a", self.profile.audio_codec.as_str(),
            "-b:a", self.profile.audio_bitrate.as_str(),
            // Cut the audio to the frame count; frames are never stretched
            "-t", format!("{:.6}", req.duration()).as_str(),
        ]));
        args.push(req.output.as_os_str().to_owned());

        args
    }
}

fn os_args<const N: usize>(args: [&str; N]) -> impl Iterator<Item = OsString> + '_ {
    args.into_iter().map(OsString::from)
}

impl Encoder for FfmpegEncoder {
    fn encode(&self, req: &EncodeRequest<'_>) -> PipelineResult<PathBuf> {
        req.validate()?;

        if !self.is_available() {
            return Err(PipelineError::encoding(format!(
                "{} was not found. Is ffmpeg installed?",
                self.binary.display()
            )));
        }

        if let Some(parent) = req.output.parent() {
            std::fs::create_dir_all(parent).map_err(|e| PipelineError::io(parent, e))?;
        }

        log::info!(
            "FFmpeg encoding {} frames: {}x{} @ {}fps, {:.3}s, codec={}",
            req.frame_count,
            req.width,
            req.height,
            req.fps,
            req.duration(),
            self.profile.video_codec
        );

        let output = Command::new(&self.binary)
            .args(self.build_args(req))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| PipelineError::encoding(format!("failed to spawn ffmpeg: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let diagnostic = if stderr.trim().is_empty() {
                "No stderr output available".to_string()
            } else {
                stderr.trim().to_string()
            };
            return Err(PipelineError::encoding(format!(
                "ffmpeg exited with {}:\n{}",
                output.status, diagnostic
            )));
        }

        log::info!("FFmpeg encoding complete: {}", req.output.display());
        Ok(req.output.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn request<'a>(frames: u32) -> EncodeRequest<'a> {
        EncodeRequest {
            frame_pattern: Path::new("/tmp/job-1/frame_%05d.png"),
            frame_count: frames,
            fps: 30,
            width: 1920,
            height: 1080,
            audio: Path::new("/tmp/input/song.mp3"),
            output: Path::new("/tmp/output/song_gonio.mp4"),
        }
    }

    fn args_of(encoder: &FfmpegEncoder, req: &EncodeRequest<'_>) -> Vec<String> {
        encoder
            .build_args(req)
            .into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    fn value_after(args: &[String], flag: &str) -> String {
        let pos = args.iter().position(|a| a == flag).unwrap();
        args[pos + 1].clone()
    }

    #[test]
    fn default_profile_args() {
        let args = args_of(&FfmpegEncoder::new(CodecProfile::default()), &request(300));
        assert_eq!(value_after(&args, "-framerate"), "30");
        assert_eq!(value_after(&args, "-r"), "30");
        assert_eq!(value_after(&args, "-c:v"), "libx264");
        assert_eq!(value_after(&args, "-pix_fmt"), "yuv420p");
        assert_eq!(value_after(&args, "-c:a"), "libmp3lame");
        assert_eq!(value_after(&args, "-b:a"), "192k");
        assert_eq!(value_after(&args, "-crf"), "18");
        assert_eq!(value_after(&args, "-frames:v"), "300");
        assert_eq!(value_after(&args, "-t"), "10.000000");
        assert_eq!(args.last().unwrap(), "/tmp/output/song_gonio.mp4");
    }

    #[test]
    fn scales_and_pads_to_target() {
        let args = args_of(&FfmpegEncoder::new(CodecProfile::default()), &request(1));
        let vf = value_after(&args, "-vf");
        assert!(vf.starts_with("scale=1920:1080:force_original_aspect_ratio=decrease"));
        assert!(vf.contains("pad=1920:1080:(ow-iw)/2:(oh-ih)/2"));
    }

    #[test]
    fn bitrate_replaces_crf() {
        let profile = CodecProfile {
            video_bitrate: Some("5M".into()),
            ..Default::default()
        };
        let args = args_of(&FfmpegEncoder::new(profile), &request(10));
        assert_eq!(value_after(&args, "-b:v"), "5M");
        assert!(!args.iter().any(|a| a == "-crf"));
    }

    #[test]
    fn zero_frames_never_reach_ffmpeg() {
        let encoder = FfmpegEncoder::new(CodecProfile::default())
            .with_binary("/nonexistent/ffmpeg-binary");
        let err = encoder.encode(&request(0)).unwrap_err();
        assert!(err.to_string().contains("no frames"));
    }

    #[test]
    fn missing_binary_is_encoding_error() {
        let encoder = FfmpegEncoder::new(CodecProfile::default())
            .with_binary("/nonexistent/ffmpeg-binary");
        assert!(!encoder.is_available());
        let err = encoder.encode(&request(5)).unwrap_err();
        assert!(matches!(err, PipelineError::Encoding(_)));
    }
}
