use anyhow::{Context, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};

#[derive(Clone, Debug)]
pub struct EncoderSettings {
    pub output: PathBuf,
    /// Audio track muxed alongside the video.
    pub audio: Option<PathBuf>,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub codec: String,
    pub pix_fmt: String,
    pub crf: u32,
}

impl EncoderSettings {
    /// ffmpeg arguments for raw RGBA frames on stdin.
    pub fn args(&self) -> Vec<String> {
        // stderr is only read in finish(); keep it to errors so the pipe never fills.
        let mut args = vec![
            "-hide_banner".to_string(),
            "-loglevel".into(),
            "error".into(),
            "-nostats".into(),
            "-y".into(),
            "-f".into(),
            "rawvideo".into(),
            "-pixel_format".into(),
            "rgba".into(),
            "-video_size".into(),
            format!("{}x{}", self.width, self.height),
            "-framerate".into(),
            self.fps.to_string(),
            "-i".into(),
            "pipe:0".into(),
        ];
        if let Some(audio) = &self.audio {
            args.extend(["-i".into(), path_arg(audio)]);
        }
        args.extend([
            "-c:v".into(),
            self.codec.clone(),
            "-pix_fmt".into(),
            self.pix_fmt.clone(),
            "-crf".into(),
            self.crf.to_string(),
            "-preset".into(),
            "medium".into(),
        ]);
        if self.audio.is_some() {
            args.extend(["-c:a".into(), "aac".into(), "-b:a".into(), "192k".into(), "-shortest".into()]);
        }
        args.push(path_arg(&self.output));
        args
    }

    pub fn frame_bytes(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

pub struct FfmpegEncoder {
    child: Child,
    frame_bytes: usize,
    frames: u64,
}

impl FfmpegEncoder {
    pub fn new(settings: &EncoderSettings) -> Result<Self> {
        let child = Command::new("ffmpeg")
            .args(settings.args())
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .context("Failed to spawn ffmpeg. Is ffmpeg installed?")?;

        log::info!(
            "FFmpeg encoder started: {}x{} @ {}fps, codec={}",
            settings.width,
            settings.height,
            settings.fps,
            settings.codec
        );

        Ok(Self {
            child,
            frame_bytes: settings.frame_bytes(),
            frames: 0,
        })
    }

    pub fn write_frame(&mut self, rgba_pixels: &[u8]) -> Result<()> {
        if rgba_pixels.len() != self.frame_bytes {
            anyhow::bail!(
                "Frame has {} bytes, encoder expects {}",
                rgba_pixels.len(),
                self.frame_bytes
            );
        }
        let stdin = self.child.stdin.as_mut().context("FFmpeg stdin not available")?;
        stdin.write_all(rgba_pixels).context("Failed to write frame to ffmpeg")?;
        self.frames += 1;
        Ok(())
    }

    pub fn finish(mut self) -> Result<()> {
        // Closing stdin signals EOF.
        drop(self.child.stdin.take());

        let output = self.child.wait_with_output().context("Failed to wait for ffmpeg")?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("FFmpeg exited with error:\n{}", stderr);
        }

        log::info!("FFmpeg encoding complete ({} frames)", self.frames);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(audio: Option<&str>) -> EncoderSettings {
        EncoderSettings {
            output: PathBuf::from("out.mp4"),
            audio: audio.map(PathBuf::from),
            width: 320,
            height: 240,
            fps: 30,
            codec: "libx264".into(),
            pix_fmt: "yuv420p".into(),
            crf: 18,
        }
    }

    #[test]
    fn args_describe_raw_rgba_input() {
        let args = settings(None).args();
        let joined = args.join(" ");
        assert!(joined.starts_with("-hide_banner -loglevel error -nostats -y -f rawvideo -pixel_format rgba -video_size 320x240 -framerate 30 -i pipe:0"));
        assert!(!joined.contains("aac"));
        assert_eq!(args.last().map(String::as_str), Some("out.mp4"));
    }

    #[test]
    fn audio_track_is_muxed() {
        let args = settings(Some("song.flac")).args();
        let joined = args.join(" ");
        assert!(joined.contains("-i song.flac"));
        assert!(joined.contains("-c:a aac"));
        assert!(joined.contains("-shortest"));
    }

    #[test]
    fn frame_size_is_rgba() {
        assert_eq!(settings(None).frame_bytes(), 320 * 240 * 4);
    }
}
