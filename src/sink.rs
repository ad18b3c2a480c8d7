//! Frame sinks: container files written through a piped ffmpeg, and an
//! interactive window when built with the `window` feature.

use std::io::{BufWriter, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, Command, Stdio};

use crate::raster::Raster;
use crate::Error;

/// Frames per second of every produced container.
pub const OUTPUT_FPS: u32 = 30;

pub trait Sink {
    fn send(&mut self, frame: &Raster) -> anyhow::Result<()>;

    /// Flush and close; call once after the frame loop.
    fn finish(&mut self) -> anyhow::Result<()>;
}

/// Open an output string: `:highgui` for a window, anything else is a
/// container file.
pub fn create(desc: &str, width: usize, height: usize) -> Result<Box<dyn Sink>, Error> {
    if let Some(name) = desc.strip_prefix(':') {
        match name {
            "highgui" => open_window(desc, width, height),
            _ => Err(Error::SinkOpen(desc.into(), "unknown video output".into())),
        }
    } else {
        Ok(Box::new(VideoSink::open(desc, width, height)?))
    }
}

#[cfg(feature = "window")]
fn open_window(_desc: &str, width: usize, height: usize) -> Result<Box<dyn Sink>, Error> {
    Ok(Box::new(window::WindowSink::open(width, height)?))
}

#[cfg(not(feature = "window"))]
fn open_window(desc: &str, _width: usize, _height: usize) -> Result<Box<dyn Sink>, Error> {
    Err(Error::SinkOpen(desc.into(), "built without the `window` feature".into()))
}

/// Writes raw frames into ffmpeg, which encodes mp4 (libx264) or avi
/// (mjpeg) at 30 fps.
pub struct VideoSink {
    desc: String,
    child: Child,
    stdin: Option<BufWriter<ChildStdin>>,
    rgb: Vec<u8>,
}

impl VideoSink {
    pub fn open(path: &str, width: usize, height: usize) -> Result<Self, Error> {
        let ext = Path::new(path)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        let codec_args: &[&str] = match ext.as_deref() {
            Some("avi") => &["-c:v", "mjpeg", "-q:v", "3"],
            _ => &["-c:v", "libx264", "-preset", "fast", "-crf", "17"],
        };

        let mut child = Command::new("ffmpeg")
            .args([
                "-y",
                "-f",
                "rawvideo",
                "-pix_fmt",
                "rgb24",
                "-s",
                &format!("{width}x{height}"),
                "-r",
                &OUTPUT_FPS.to_string(),
                "-i",
                "pipe:0",
            ])
            .args(codec_args)
            .args(["-pix_fmt", "yuv420p", "-v", "error", path])
            .stdin(Stdio::piped())
            .stderr(Stdio::inherit())
            .stdout(Stdio::null())
            .spawn()
            .map_err(|e| Error::SinkOpen(path.into(), format!("cannot spawn ffmpeg: {e}")))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::SinkOpen(path.into(), "no ffmpeg stdin".into()))?;

        log::info!("opened {path} {width}x{height}");
        Ok(Self {
            desc: path.into(),
            child,
            stdin: Some(BufWriter::new(stdin)),
            rgb: vec![0; width * height * 3],
        })
    }
}

impl Sink for VideoSink {
    fn send(&mut self, frame: &Raster) -> anyhow::Result<()> {
        for (dst, src) in self.rgb.chunks_exact_mut(3).zip(frame.data().chunks_exact(4)) {
            dst.copy_from_slice(&src[..3]);
        }
        if let Some(stdin) = self.stdin.as_mut() {
            stdin
                .write_all(&self.rgb)
                .map_err(|e| anyhow::anyhow!("write to {} failed: {e}", self.desc))?;
        }
        Ok(())
    }

    fn finish(&mut self) -> anyhow::Result<()> {
        drop(self.stdin.take());
        let status = self.child.wait()?;
        if !status.success() {
            anyhow::bail!("ffmpeg for {} exited with {status}", self.desc);
        }
        Ok(())
    }
}

impl Drop for VideoSink {
    fn drop(&mut self) {
        drop(self.stdin.take());
        let _ = self.child.wait();
    }
}

#[cfg(feature = "window")]
mod window {
    use super::Sink;
    use crate::raster::Raster;
    use crate::Error;

    use sdl2::event::Event;
    use sdl2::keyboard::Keycode;
    use sdl2::pixels::PixelFormatEnum;
    use sdl2::render::{Canvas, TextureCreator};
    use sdl2::video::{Window, WindowContext};

    pub struct WindowSink {
        canvas: Canvas<Window>,
        creator: TextureCreator<WindowContext>,
        event_pump: sdl2::EventPump,
        width: u32,
        height: u32,
    }

    impl WindowSink {
        pub fn open(width: usize, height: usize) -> Result<Self, Error> {
            let err = |e: String| Error::SinkOpen(":highgui".into(), e);

            let context = sdl2::init().map_err(err)?;
            let video = context.video().map_err(err)?;
            let window = video
                .window("tv", width as u32, height as u32)
                .position_centered()
                .build()
                .map_err(|e| err(e.to_string()))?;
            let canvas = window.into_canvas().build().map_err(|e| err(e.to_string()))?;
            let creator = canvas.texture_creator();
            let event_pump = context.event_pump().map_err(err)?;

            Ok(Self { canvas, creator, event_pump, width: width as u32, height: height as u32 })
        }
    }

    impl Sink for WindowSink {
        fn send(&mut self, frame: &Raster) -> anyhow::Result<()> {
            for event in self.event_pump.poll_iter() {
                match event {
                    Event::Quit { .. } | Event::KeyDown { keycode: Some(Keycode::Escape), .. } => {
                        anyhow::bail!("window closed")
                    }
                    _ => {}
                }
            }

            let mut texture = self
                .creator
                .create_texture_streaming(PixelFormatEnum::ABGR8888, self.width, self.height)
                .map_err(|e| anyhow::anyhow!("texture: {e}"))?;
            texture
                .update(None, frame.data(), frame.stride())
                .map_err(|e| anyhow::anyhow!("texture update: {e}"))?;

            self.canvas.clear();
            self.canvas
                .copy(&texture, None, None)
                .map_err(|e| anyhow::anyhow!("canvas copy: {e}"))?;
            self.canvas.present();
            Ok(())
        }

        fn finish(&mut self) -> anyhow::Result<()> {
            Ok(())
        }
    }
}
