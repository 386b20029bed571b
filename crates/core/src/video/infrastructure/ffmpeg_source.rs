use std::path::PathBuf;
use std::time::Duration;

use crate::shared::frame::Frame;
use crate::shared::stream_metadata::StreamMetadata;
use crate::video::domain::video_source::VideoSource;

/// A capture device opened through libavdevice.
#[derive(Clone, Debug, PartialEq)]
pub struct CameraSpec {
    /// Device URL in the input format's syntax: `/dev/video0` for v4l2,
    /// `0` for avfoundation, `video=Integrated Camera` for dshow.
    pub device: String,
    /// avdevice input format; the platform default when `None`.
    pub format: Option<String>,
    pub size: Option<(u32, u32)>,
    pub framerate: Option<u32>,
}

impl CameraSpec {
    pub fn new(device: &str) -> Self {
        Self {
            device: device.to_string(),
            format: None,
            size: None,
            framerate: None,
        }
    }

    fn format_name(&self) -> &str {
        self.format.as_deref().unwrap_or(default_camera_format())
    }
}

/// The avdevice input format that talks to cameras on this platform.
pub fn default_camera_format() -> &'static str {
    if cfg!(target_os = "macos") {
        "avfoundation"
    } else if cfg!(target_os = "windows") {
        "dshow"
    } else {
        "v4l2"
    }
}

/// The first camera on this platform, when it has a predictable name.
/// DirectShow devices are addressed by their friendly name, so Windows
/// has none.
pub fn default_camera_device() -> Option<&'static str> {
    if cfg!(target_os = "macos") {
        Some("0")
    } else if cfg!(target_os = "windows") {
        None
    } else {
        Some("/dev/video0")
    }
}

/// What an [`FfmpegSource`] decodes from.
#[derive(Clone, Debug, PartialEq)]
pub enum CaptureTarget {
    Camera(CameraSpec),
    /// A recorded video replayed at its native frame rate.
    File(PathBuf),
}

/// Decodes camera or file frames via ffmpeg-next (libavdevice, libavformat
/// and libavcodec), converting each one to RGB24.
pub struct FfmpegSource {
    target: CaptureTarget,
    stream: Option<OpenStream>,
    metadata: Option<StreamMetadata>,
}

struct OpenStream {
    ictx: ffmpeg_next::format::context::Input,
    decoder: ffmpeg_next::decoder::Video,
    scaler: ffmpeg_next::software::scaling::Context,
    width: u32,
    height: u32,
    video_stream_index: usize,
}

// Safety: FfmpegSource is only used from a single thread at a time.
// The raw pointers inside ffmpeg types are not shared across threads.
unsafe impl Send for FfmpegSource {}

impl FfmpegSource {
    pub fn new(target: CaptureTarget) -> Self {
        Self {
            target,
            stream: None,
            metadata: None,
        }
    }

    pub fn camera(spec: CameraSpec) -> Self {
        Self::new(CaptureTarget::Camera(spec))
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::new(CaptureTarget::File(path.into()))
    }

    fn open_input(&self) -> Result<ffmpeg_next::format::context::Input, Box<dyn std::error::Error>> {
        match &self.target {
            CaptureTarget::File(path) => Ok(ffmpeg_next::format::input(path)?),
            CaptureTarget::Camera(spec) => {
                ffmpeg_next::device::register_all();

                let name = spec.format_name();
                let format = ffmpeg_next::device::input::video()
                    .find(|f| f.name() == name)
                    .ok_or_else(|| format!("Capture format '{name}' is not available"))?;

                let mut options = ffmpeg_next::Dictionary::new();
                if let Some(fps) = spec.framerate {
                    options.set("framerate", &fps.to_string());
                }
                if let Some((w, h)) = spec.size {
                    options.set("video_size", &format!("{w}x{h}"));
                }

                let ctx = ffmpeg_next::format::open_with(
                    &spec.device,
                    &ffmpeg_next::Format::Input(format),
                    options,
                )?;
                if !ctx.is_input() {
                    return Err(format!("{} did not open as an input", spec.device).into());
                }
                Ok(ctx.input())
            }
        }
    }
}

impl VideoSource for FfmpegSource {
    fn label(&self) -> String {
        match &self.target {
            CaptureTarget::Camera(spec) => format!("{} ({})", spec.device, spec.format_name()),
            CaptureTarget::File(path) => path.display().to_string(),
        }
    }

    fn open(&mut self) -> Result<StreamMetadata, Box<dyn std::error::Error>> {
        ffmpeg_next::init()?;

        let ictx = self.open_input()?;

        let stream = ictx
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or("No video stream found")?;

        let video_stream_index = stream.index();
        let codec_ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())?;
        let decoder = codec_ctx.decoder().video()?;

        let rate = stream.rate();
        let fps = if rate.denominator() != 0 {
            rate.numerator() as f64 / rate.denominator() as f64
        } else {
            0.0
        };

        let width = decoder.width();
        let height = decoder.height();

        let scaler = ffmpeg_next::software::scaling::Context::get(
            decoder.format(),
            width,
            height,
            ffmpeg_next::format::Pixel::RGB24,
            width,
            height,
            ffmpeg_next::software::scaling::Flags::BILINEAR,
        )?;

        let metadata = StreamMetadata {
            width,
            height,
            fps,
            codec: decoder
                .codec()
                .map(|c| c.name().to_string())
                .unwrap_or_default(),
            source: self.label(),
        };
        log::debug!("Opened {}: {width}x{height} @ {fps:.2} fps", metadata.source);

        self.metadata = Some(metadata.clone());
        self.stream = Some(OpenStream {
            ictx,
            decoder,
            scaler,
            width,
            height,
            video_stream_index,
        });

        Ok(metadata)
    }

    fn frames(
        &mut self,
    ) -> Box<dyn Iterator<Item = Result<Frame, Box<dyn std::error::Error>>> + '_> {
        let Some(stream) = self.stream.as_mut() else {
            return Box::new(std::iter::once(Err("FfmpegSource: not opened".into())));
        };
        Box::new(FfmpegFrameIter {
            stream,
            frame_index: 0,
            flushing: false,
            done: false,
        })
    }

    fn pacing(&self) -> Option<Duration> {
        match self.target {
            CaptureTarget::Camera(_) => None,
            CaptureTarget::File(_) => self.metadata.as_ref().and_then(|m| m.frame_interval()),
        }
    }

    fn close(&mut self) {
        self.stream = None;
        self.metadata = None;
    }
}

/// Lazy iterator that decodes one frame at a time.
struct FfmpegFrameIter<'a> {
    stream: &'a mut OpenStream,
    frame_index: usize,
    flushing: bool,
    done: bool,
}

impl FfmpegFrameIter<'_> {
    fn try_receive(&mut self) -> Option<Result<Frame, Box<dyn std::error::Error>>> {
        let mut decoded = ffmpeg_next::util::frame::video::Video::empty();
        if self.stream.decoder.receive_frame(&mut decoded).is_err() {
            return None;
        }

        let mut rgb_frame = ffmpeg_next::util::frame::video::Video::empty();
        if let Err(e) = self.stream.scaler.run(&decoded, &mut rgb_frame) {
            return Some(Err(Box::new(e)));
        }

        let (width, height) = (self.stream.width, self.stream.height);
        let pixels = extract_rgb_pixels(&rgb_frame, width, height);
        let frame = Frame::new(pixels, width, height, 3, self.frame_index);
        self.frame_index += 1;
        Some(Ok(frame))
    }
}

impl Iterator for FfmpegFrameIter<'_> {
    type Item = Result<Frame, Box<dyn std::error::Error>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        if let Some(result) = self.try_receive() {
            return Some(result);
        }

        if self.flushing {
            self.done = true;
            return None;
        }

        loop {
            let Some((stream, packet)) = self.stream.ictx.packets().next() else {
                let _ = self.stream.decoder.send_eof();
                self.flushing = true;
                if let Some(result) = self.try_receive() {
                    return Some(result);
                }
                self.done = true;
                return None;
            };

            if stream.index() != self.stream.video_stream_index {
                continue;
            }

            if self.stream.decoder.send_packet(&packet).is_err() {
                continue;
            }

            if let Some(result) = self.try_receive() {
                return Some(result);
            }
        }
    }
}

/// Copies pixel data from an ffmpeg frame into a contiguous RGB buffer,
/// dropping the per-row stride padding.
fn extract_rgb_pixels(
    rgb_frame: &ffmpeg_next::util::frame::video::Video,
    width: u32,
    height: u32,
) -> Vec<u8> {
    let stride = rgb_frame.stride(0);
    let data = rgb_frame.data(0);
    let w = width as usize;
    let h = height as usize;

    let mut pixels = Vec::with_capacity(w * h * 3);
    for row in 0..h {
        let row_start = row * stride;
        pixels.extend_from_slice(&data[row_start..row_start + w * 3]);
    }
    pixels
}
