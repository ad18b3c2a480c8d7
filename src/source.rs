//! Signal sources: everything that can fill an InputSignal with a
//! picture. Still images, SMPTE bars with an optional logo, video
//! files and cameras (both decoded by a piped ffmpeg).

use std::io::{BufReader, Read};
use std::path::Path;
use std::process::{Child, Command, Stdio};

use image::imageops::FilterType;
use image::RgbaImage;

use crate::encoder;
use crate::font;
use crate::input::InputSignal;
use crate::raster::Raster;
use crate::Error;

/// Extensions handed to the video decoder rather than the image loader.
const VIDEO_EXTENSIONS: &[&str] = &[
    "h264", "h265", "mpeg2", "mpeg4", "mp4", "mjpeg", "mpg", "vp8", "mov", "wmv", "flv", "avi", "mkv",
];

pub trait Source {
    /// Native pixel size, used to pick the output size when the user
    /// doesn't give one.
    fn image_size(&self) -> (usize, usize);

    fn set_out_size(&mut self, w: usize, h: usize);

    fn set_ssavi(&mut self, on: bool);

    /// Encode the current picture into `input`.
    fn update(&mut self, input: &mut InputSignal);
}

/// Open a source string: a file path, `:bars[:logo.png]` or `:cam[:N]`.
pub fn create(desc: &str) -> Result<Box<dyn Source>, Error> {
    if let Some(rest) = desc.strip_prefix(':') {
        let (name, arg) = match rest.split_once(':') {
            Some((n, a)) => (n, Some(a)),
            None => (rest, None),
        };
        return match name {
            "bars" => {
                let logo = match arg {
                    Some(path) => Some(load_image(path)?),
                    None => None,
                };
                Ok(Box::new(BarsSource::new(logo)))
            }
            "cam" => {
                let index: u32 = match arg {
                    Some(a) => a
                        .parse()
                        .map_err(|_| Error::SourceOpen(desc.into(), "bad camera index".into()))?,
                    None => 0,
                };
                Ok(Box::new(VideoSource::open_camera(desc, index)?))
            }
            _ => Err(Error::SourceOpen(desc.into(), "unknown special source".into())),
        };
    }

    let ext = Path::new(desc)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    if ext.as_deref().is_some_and(|e| VIDEO_EXTENSIONS.contains(&e)) {
        Ok(Box::new(VideoSource::open_file(desc)?))
    } else {
        Ok(Box::new(ImageSource::new(load_image(desc)?)))
    }
}

fn load_image(path: &str) -> Result<Raster, Error> {
    let img = image::open(path)
        .map_err(|e| Error::SourceOpen(path.into(), e.to_string()))?
        .to_rgba8();
    log::info!("loaded {path} {}x{}", img.width(), img.height());
    Ok(raster_from_image(&img))
}

fn raster_from_image(img: &RgbaImage) -> Raster {
    let mut r = Raster::new(img.width() as usize, img.height() as usize);
    r.data_mut().copy_from_slice(img.as_raw());
    r
}

fn image_from_raster(r: &Raster) -> RgbaImage {
    RgbaImage::from_raw(r.width() as u32, r.height() as u32, r.data().to_vec())
        .expect("raster dimensions match buffer")
}

/// Shrink to fit `out` while keeping the aspect ratio.
fn resize_to_fit(img: &Raster, out_w: usize, out_h: usize) -> Raster {
    if img.width() == out_w && img.height() == out_h {
        return img.clone();
    }
    let r1 = out_w as f64 / out_h as f64;
    let r2 = img.width() as f64 / img.height() as f64;
    let (w2, h2) = if r1 > r2 {
        ((out_h as f64 * r2) as usize, out_h)
    } else {
        (out_w, (out_w as f64 / r2) as usize)
    };
    let resized = image::imageops::resize(&image_from_raster(img), w2.max(1) as u32, h2.max(1) as u32, FilterType::Triangle);
    raster_from_image(&resized)
}

/// A still image, encoded once and re-encoded only when the output size
/// changes.
pub struct ImageSource {
    img: Raster,
    resized: Raster,
    out_w: usize,
    out_h: usize,
    do_ssavi: bool,
    encoded: bool,
}

impl ImageSource {
    pub fn new(img: Raster) -> Self {
        let (w, h) = (img.width(), img.height());
        Self { resized: img.clone(), img, out_w: w, out_h: h, do_ssavi: false, encoded: false }
    }
}

impl Source for ImageSource {
    fn image_size(&self) -> (usize, usize) {
        (self.img.width(), self.img.height())
    }

    fn set_out_size(&mut self, w: usize, h: usize) {
        if (w, h) != (self.out_w, self.out_h) {
            self.out_w = w;
            self.out_h = h;
            self.resized = resize_to_fit(&self.img, w, h);
            self.encoded = false;
        }
    }

    fn set_ssavi(&mut self, on: bool) {
        self.do_ssavi = on;
        self.encoded = false;
    }

    fn update(&mut self, input: &mut InputSignal) {
        if self.encoded {
            return;
        }
        self.encoded = true;

        let w = (self.resized.width() as f64 * 0.815) as usize; /* underscan */
        let h = (self.resized.height() as f64 * 0.970) as usize;
        let x = (self.out_w as i32 - w as i32) / 2;
        let y = (self.out_h as i32 - h as i32) / 2;

        input.setup_sync(true, self.do_ssavi);
        encoder::load_ximage(input, &self.resized, None, x, y, w, h, self.out_w, self.out_h);
    }
}

/// SMPTE color bars, optionally with a logo over the top bars.
pub struct BarsSource {
    logo: Option<(Raster, Raster)>,
    out_w: usize,
    out_h: usize,
    encoded: bool,
}

pub const BARS_DEFAULT_SIZE: (usize, usize) = (320, 240);

impl BarsSource {
    pub fn new(logo_img: Option<Raster>) -> Self {
        /* Pull the alpha out of the logo and make a separate mask. */
        let logo = logo_img.map(|img| {
            let mut rgb = img.clone();
            let mut mask = Raster::new(img.width(), img.height());
            for y in 0..img.height() {
                for x in 0..img.width() {
                    let px = img.pixel(x, y);
                    rgb.put_pixel(x, y, [px[0], px[1], px[2], 0]);
                    mask.put_pixel(x, y, [0, 0, 0, px[3]]);
                }
            }
            (rgb, mask)
        });

        Self { logo, out_w: BARS_DEFAULT_SIZE.0, out_h: BARS_DEFAULT_SIZE.1, encoded: false }
    }
}

impl Source for BarsSource {
    fn image_size(&self) -> (usize, usize) {
        BARS_DEFAULT_SIZE
    }

    fn set_out_size(&mut self, w: usize, h: usize) {
        if (w, h) != (self.out_w, self.out_h) {
            self.out_w = w;
            self.out_h = h;
            self.encoded = false;
        }
    }

    fn set_ssavi(&mut self, _on: bool) {}

    fn update(&mut self, input: &mut InputSignal) {
        if self.encoded {
            return;
        }
        self.encoded = true;

        let logo = self.logo.as_ref().map(|(img, mask)| (img, mask));
        encoder::draw_smpte_bars(input, logo, self.out_w, self.out_h);
    }
}

/// A video file or camera decoded frame-by-frame through ffmpeg's
/// rawvideo pipe. When the stream ends or breaks mid-run, a blue
/// "no frame :(" placeholder takes over.
pub struct VideoSource {
    desc: String,
    reader: Option<BufReader<std::process::ChildStdout>>,
    child: Option<Child>,
    frame_w: usize,
    frame_h: usize,
    frame_buf: Vec<u8>,
    out_w: usize,
    out_h: usize,
    failed: bool,
}

impl VideoSource {
    pub fn open_file(path: &str) -> Result<Self, Error> {
        let (w, h) = ffprobe_size(path)?;
        Self::spawn_reader(path, &["-i", path], w, h)
    }

    pub fn open_camera(desc: &str, index: u32) -> Result<Self, Error> {
        let device = format!("/dev/video{index}");
        // Cameras deliver whatever ffmpeg negotiates; ask for a fixed
        // size so the pipe framing is known.
        let args = ["-f", "v4l2", "-framerate", "30", "-video_size", "640x480", "-i", &device];
        Self::spawn_reader(desc, &args, 640, 480)
    }

    fn spawn_reader(desc: &str, input_args: &[&str], w: usize, h: usize) -> Result<Self, Error> {
        let mut child = Command::new("ffmpeg")
            .args(input_args)
            .args(["-f", "rawvideo", "-pix_fmt", "rgba", "-v", "error", "pipe:1"])
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .stdin(Stdio::null())
            .spawn()
            .map_err(|e| Error::SourceOpen(desc.into(), format!("cannot spawn ffmpeg: {e}")))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::SourceOpen(desc.into(), "no ffmpeg stdout".into()))?;

        log::info!("opened {desc} {w}x{h}");
        Ok(Self {
            desc: desc.into(),
            reader: Some(BufReader::new(stdout)),
            child: Some(child),
            frame_w: w,
            frame_h: h,
            frame_buf: vec![0; w * h * 4],
            out_w: w,
            out_h: h,
            failed: false,
        })
    }

    fn next_frame(&mut self) -> Option<Raster> {
        let reader = self.reader.as_mut()?;
        match reader.read_exact(&mut self.frame_buf) {
            Ok(()) => {
                let mut r = Raster::new(self.frame_w, self.frame_h);
                r.data_mut().copy_from_slice(&self.frame_buf);
                Some(r)
            }
            Err(e) => {
                if !self.failed {
                    log::warn!("{}: no more frames ({e}); showing placeholder", self.desc);
                    self.failed = true;
                }
                self.reader = None;
                if let Some(mut child) = self.child.take() {
                    let _ = child.kill();
                    let _ = child.wait();
                }
                None
            }
        }
    }

    fn placeholder(&self) -> Raster {
        let mut r = Raster::new(self.out_w.max(64), self.out_h.max(64));
        r.fill([0, 0, 192, 255]);
        let text = "no frame :(";
        let scale = (r.width() / 80).max(1);
        let x = r.width().saturating_sub(font::text_width(text, scale)) / 2;
        let y = r.height().saturating_sub(font::text_height(scale)) / 2;
        font::draw_text(&mut r, text, x, y, scale, [255, 255, 255, 255]);
        r
    }
}

impl Source for VideoSource {
    fn image_size(&self) -> (usize, usize) {
        (self.frame_w, self.frame_h)
    }

    fn set_out_size(&mut self, w: usize, h: usize) {
        self.out_w = w;
        self.out_h = h;
    }

    fn set_ssavi(&mut self, _on: bool) {}

    fn update(&mut self, input: &mut InputSignal) {
        let frame = match self.next_frame() {
            Some(f) => resize_to_fit(&f, self.out_w, self.out_h),
            None => resize_to_fit(&self.placeholder(), self.out_w, self.out_h),
        };

        let w = (frame.width() as f64 * 0.815) as usize; /* underscan */
        let h = (frame.height() as f64 * 0.970) as usize;
        let x = (self.out_w as i32 - w as i32) / 2;
        let y = (self.out_h as i32 - h as i32) / 2;

        input.setup_sync(true, false);
        encoder::load_ximage(input, &frame, None, x, y, w, h, self.out_w, self.out_h);
    }
}

impl Drop for VideoSource {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

fn ffprobe_size(path: &str) -> Result<(usize, usize), Error> {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=width,height",
            "-of",
            "csv=p=0",
            path,
        ])
        .output()
        .map_err(|e| Error::SourceOpen(path.into(), format!("cannot run ffprobe: {e}")))?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    let mut parts = stdout.trim().split(',');
    let w = parts.next().and_then(|s| s.parse().ok());
    let h = parts.next().and_then(|s| s.parse().ok());
    match (w, h) {
        (Some(w), Some(h)) if w > 0 && h > 0 => Ok((w, h)),
        _ => Err(Error::SourceOpen(path.into(), format!("cannot probe video: {}", stdout.trim()))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{SYNC_LEVEL, TOP, VISLINES, VIS_LEN, VIS_START};

    #[test]
    fn unknown_special_source_is_rejected() {
        assert!(create(":nonsense").is_err());
    }

    #[test]
    fn bars_source_encodes_without_output_size() {
        let mut bars = BarsSource::new(None);
        let mut input = InputSignal::new();
        bars.update(&mut input);
        // Gray bar top-left.
        assert_eq!(input.row(TOP + 10)[((VIS_START + 8) / 4) * 4], 75);
    }

    #[test]
    fn image_source_caches_between_frames() {
        let mut img = Raster::new(32, 32);
        img.fill([200, 200, 200, 255]);
        let mut src = ImageSource::new(img);
        src.set_out_size(320, 240);

        let mut input = InputSignal::new();
        src.update(&mut input);
        let first: Vec<i8> = input.flat().to_vec();

        // A second update must not re-encode (or change anything).
        src.update(&mut input);
        assert_eq!(first, input.flat());

        // Changing the output size re-encodes.
        src.set_out_size(640, 480);
        src.update(&mut input);
    }

    #[test]
    fn image_source_centers_with_underscan() {
        let mut img = Raster::new(320, 240);
        img.fill([255, 255, 255, 255]);
        let mut src = ImageSource::new(img);
        src.set_out_size(320, 240);

        let mut input = InputSignal::new();
        src.update(&mut input);

        let row = input.row(TOP + VISLINES / 2);
        // Center is bright.
        assert!(row[VIS_START + VIS_LEN / 2] as i32 > 80);
        // The sync pulse is untouched by the picture.
        assert_eq!(row[2] as i32, SYNC_LEVEL);
    }
}
