//! Output encoders: H.264 MP4 via FFmpeg and animated GIF via `image`

use std::cell::RefCell;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;

use ffmpeg_next as ffmpeg;
use ffmpeg::format::Pixel;
use ffmpeg::software::scaling::{Context as Scaler, Flags};
use ffmpeg::util::frame::video::Video as VideoFrame;
use ffmpeg::Rational;
use image::codecs::gif::{GifEncoder, Repeat};
use image::{Delay, DynamicImage, Frame, RgbImage};
use tracing::{debug, info};

use crate::domain::model::Resolution;
use crate::domain::rules::GeometryRules;
use crate::error::{MonoShotError, MonoShotResult};

fn encode_error(context: &str, e: impl std::fmt::Display) -> MonoShotError {
    MonoShotError::EncodeError {
        message: format!("{}: {}", context, e),
    }
}

/// H.264 MP4 writer fed with RGB frames at a fixed frame rate
pub struct Mp4Writer {
    encoder: ffmpeg::encoder::video::Encoder,
    output: ffmpeg::format::context::Output,
    scaler: Scaler,
    stream_index: usize,
    encoder_time_base: Rational,
    stream_time_base: Rational,
    source: Resolution,
    next_pts: i64,
    frames_written: u64,
}

impl Mp4Writer {
    /// Create the container, open the encoder and write the header
    pub fn create(path: &Path, source: Resolution, frame_rate: Rational) -> MonoShotResult<Self> {
        crate::init()?;

        let target = GeometryRules::even(source);
        let mut output =
            ffmpeg::format::output(&path).map_err(|e| encode_error("failed to create output", e))?;

        let codec = ffmpeg::encoder::find(ffmpeg::codec::Id::H264)
            .ok_or_else(|| encode_error("encoder lookup", "no H.264 encoder available"))?;
        let global_header = output
            .format()
            .flags()
            .contains(ffmpeg::format::Flags::GLOBAL_HEADER);

        let encoder_time_base = frame_rate.invert();
        let (stream_index, encoder) = {
            let mut stream = output
                .add_stream(codec)
                .map_err(|e| encode_error("failed to add video stream", e))?;

            let mut config = ffmpeg::codec::context::Context::new_with_codec(codec)
                .encoder()
                .video()
                .map_err(|e| encode_error("failed to create video encoder", e))?;
            config.set_width(target.width);
            config.set_height(target.height);
            config.set_format(Pixel::YUV420P);
            config.set_time_base(encoder_time_base);
            config.set_frame_rate(Some(frame_rate));
            if global_header {
                config.set_flags(ffmpeg::codec::Flags::GLOBAL_HEADER);
            }

            let encoder = config
                .open_as(codec)
                .map_err(|e| encode_error("failed to open H.264 encoder", e))?;
            stream.set_parameters(&encoder);
            stream.set_time_base(encoder_time_base);
            (stream.index(), encoder)
        };

        output
            .write_header()
            .map_err(|e| encode_error("failed to write output header", e))?;

        let stream_time_base = output
            .stream(stream_index)
            .map(|stream| stream.time_base())
            .unwrap_or(encoder_time_base);

        let scaler = Scaler::get(
            Pixel::RGB24,
            source.width,
            source.height,
            Pixel::YUV420P,
            target.width,
            target.height,
            Flags::BILINEAR,
        )
        .map_err(|e| encode_error("failed to create YUV converter", e))?;

        info!(
            "Writing {} at {}/{} fps ({})",
            path.display(),
            frame_rate.numerator(),
            frame_rate.denominator(),
            target
        );

        Ok(Self {
            encoder,
            output,
            scaler,
            stream_index,
            encoder_time_base,
            stream_time_base,
            source,
            next_pts: 0,
            frames_written: 0,
        })
    }

    /// Encode one frame; frames are timed by their order
    pub fn write(&mut self, image: &RgbImage) -> MonoShotResult<()> {
        if image.width() != self.source.width || image.height() != self.source.height {
            return Err(MonoShotError::Geometry {
                message: format!(
                    "frame {}x{} does not match stream {}",
                    image.width(),
                    image.height(),
                    self.source
                ),
            });
        }

        let mut rgb = VideoFrame::new(Pixel::RGB24, self.source.width, self.source.height);
        let stride = rgb.stride(0);
        let row_bytes = self.source.width as usize * 3;
        let raw = image.as_raw();
        {
            let data = rgb.data_mut(0);
            for row in 0..self.source.height as usize {
                let src = &raw[row * row_bytes..(row + 1) * row_bytes];
                data[row * stride..row * stride + row_bytes].copy_from_slice(src);
            }
        }

        let mut yuv = VideoFrame::empty();
        self.scaler
            .run(&rgb, &mut yuv)
            .map_err(|e| encode_error("failed to convert frame to YUV", e))?;
        yuv.set_pts(Some(self.next_pts));
        self.next_pts += 1;

        self.encoder
            .send_frame(&yuv)
            .map_err(|e| encode_error("failed to send frame to encoder", e))?;
        self.drain()?;
        self.frames_written += 1;
        Ok(())
    }

    /// Flush the encoder and finalize the container; returns frames written
    pub fn finish(mut self) -> MonoShotResult<u64> {
        self.encoder
            .send_eof()
            .map_err(|e| encode_error("failed to flush video encoder", e))?;
        self.drain()?;
        self.output
            .write_trailer()
            .map_err(|e| encode_error("failed to write output trailer", e))?;
        info!("Encoded {} frames", self.frames_written);
        Ok(self.frames_written)
    }

    fn drain(&mut self) -> MonoShotResult<()> {
        let mut packet = ffmpeg::Packet::empty();
        while self.encoder.receive_packet(&mut packet).is_ok() {
            packet.set_stream(self.stream_index);
            packet.rescale_ts(self.encoder_time_base, self.stream_time_base);
            packet
                .write_interleaved(&mut self.output)
                .map_err(|e| encode_error("failed to write encoded packet", e))?;
        }
        Ok(())
    }
}

/// Encoder sink kept in memory until the GIF is complete
#[derive(Clone, Default)]
struct GifBuffer(Rc<RefCell<Vec<u8>>>);

impl Write for GifBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Looping animated GIF writer.
///
/// Frames are encoded in memory; the file at `path` is only written by `finish`.
pub struct GifWriter {
    encoder: GifEncoder<GifBuffer>,
    buffer: GifBuffer,
    path: PathBuf,
    delay: Delay,
    frames_written: u64,
}

impl GifWriter {
    /// Create a GIF that shows each frame for 1/fps seconds
    pub fn create(path: &Path, fps: f64) -> MonoShotResult<Self> {
        if !(fps.is_finite() && fps > 0.0) {
            return Err(MonoShotError::invalid_parameter(
                "fps",
                format!("GIF frame rate must be positive, got {}", fps),
            ));
        }

        let buffer = GifBuffer::default();
        let mut encoder = GifEncoder::new_with_speed(buffer.clone(), 10);
        encoder
            .set_repeat(Repeat::Infinite)
            .map_err(|e| encode_error("failed to configure GIF looping", e))?;

        debug!("Writing GIF {} at {:.2} fps", path.display(), fps);
        Ok(Self {
            encoder,
            buffer,
            path: path.to_path_buf(),
            delay: Delay::from_saturating_duration(Duration::from_secs_f64(1.0 / fps)),
            frames_written: 0,
        })
    }

    pub fn write(&mut self, image: &RgbImage) -> MonoShotResult<()> {
        let rgba = DynamicImage::ImageRgb8(image.clone()).into_rgba8();
        self.encoder
            .encode_frame(Frame::from_parts(rgba, 0, 0, self.delay))
            .map_err(|e| encode_error("failed to encode GIF frame", e))?;
        self.frames_written += 1;
        Ok(())
    }

    /// Write the trailer and store the complete GIF at its path
    pub fn finish(self) -> MonoShotResult<u64> {
        let Self {
            encoder,
            buffer,
            path,
            frames_written,
            ..
        } = self;
        drop(encoder);

        let bytes = buffer.0.take();
        std::fs::write(&path, &bytes)?;
        info!(
            "Encoded {} GIF frames ({} bytes)",
            frames_written,
            bytes.len()
        );
        Ok(frames_written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::codecs::gif::GifDecoder;
    use image::{AnimationDecoder, Rgb};
    use std::io::BufReader;

    #[test]
    fn test_gif_is_written_only_on_finish() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("loop.gif");

        let mut writer = GifWriter::create(&path, 10.0).unwrap();
        for value in [0u8, 120, 240] {
            writer
                .write(&RgbImage::from_pixel(6, 4, Rgb([value, 0, 255 - value])))
                .unwrap();
        }
        assert!(!path.exists());

        assert_eq!(writer.finish().unwrap(), 3);
        let file = std::fs::File::open(&path).unwrap();
        let frames = GifDecoder::new(BufReader::new(file))
            .unwrap()
            .into_frames()
            .collect_frames()
            .unwrap();
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0].buffer().dimensions(), (6, 4));
    }

    #[test]
    fn test_gif_write_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("loop.gif");

        let mut writer = GifWriter::create(&path, 25.0).unwrap();
        writer.write(&RgbImage::new(4, 4)).unwrap();
        assert!(matches!(writer.finish(), Err(MonoShotError::IoError(_))));
        assert!(!path.exists());
    }

    #[test]
    fn test_gif_rejects_zero_rate() {
        let dir = tempfile::tempdir().unwrap();
        assert!(GifWriter::create(&dir.path().join("x.gif"), 0.0).is_err());
    }
}
