//! Video decoding into RGB frames

use std::path::Path;

use ffmpeg_next as ffmpeg;
use ffmpeg::format::Pixel;
use ffmpeg::media::Type;
use ffmpeg::software::scaling::{Context as Scaler, Flags};
use ffmpeg::util::frame::video::Video as VideoFrame;
use ffmpeg::Rational;
use image::{ImageReader, RgbImage};
use tracing::{debug, info};

use crate::domain::model::Resolution;
use crate::error::{MonoShotError, MonoShotResult};

/// A decoded frame with its presentation time
#[derive(Debug, Clone)]
pub struct DecodedFrame {
    /// Position in decode order, starting at 0
    pub index: u64,
    /// Presentation time in seconds
    pub timestamp: f64,
    pub image: RgbImage,
}

/// Container-level properties of the primary video stream
#[derive(Debug, Clone, PartialEq)]
pub struct StreamProperties {
    pub codec: String,
    pub resolution: Resolution,
    pub frame_rate: f64,
    pub frame_count: u64,
    pub duration_secs: f64,
}

/// Sequential RGB frame reader over the best video stream.
///
/// Owns the demuxer and decoder; both are released when the reader is dropped,
/// on success and on every early-return path.
pub struct FrameReader {
    decoder: ffmpeg::codec::decoder::Video,
    input: ffmpeg::format::context::Input,
    scaler: Option<Scaler>,
    stream_index: usize,
    time_base: Rational,
    properties: StreamProperties,
    next_index: u64,
    eof_sent: bool,
}

impl FrameReader {
    /// Open a video file and prepare a decoder for its primary stream
    pub fn open(path: &Path) -> MonoShotResult<Self> {
        crate::init()?;

        let input = ffmpeg::format::input(&path).map_err(|e| MonoShotError::DecodeError {
            message: format!("failed to open {}: {}", path.display(), e),
        })?;

        let (stream_index, time_base, rate, stream_frames, stream_duration, parameters) = {
            let stream = input
                .streams()
                .best(Type::Video)
                .ok_or_else(|| MonoShotError::DecodeError {
                    message: format!("no video stream found in {}", path.display()),
                })?;
            let avg = stream.avg_frame_rate();
            let rate = if avg.numerator() > 0 && avg.denominator() > 0 {
                avg
            } else {
                stream.rate()
            };
            (
                stream.index(),
                stream.time_base(),
                rate,
                stream.frames(),
                stream.duration(),
                stream.parameters(),
            )
        };

        let decoder = ffmpeg::codec::context::Context::from_parameters(parameters)
            .and_then(|context| context.decoder().video())
            .map_err(|e| MonoShotError::DecodeError {
                message: format!("failed to create video decoder: {}", e),
            })?;

        let frame_rate = if rate.denominator() == 0 {
            0.0
        } else {
            f64::from(rate)
        };

        let duration_secs = if stream_duration > 0 {
            stream_duration as f64 * f64::from(time_base)
        } else if input.duration() > 0 {
            input.duration() as f64 / ffmpeg::ffi::AV_TIME_BASE as f64
        } else {
            0.0
        };

        let frame_count = if stream_frames > 0 {
            stream_frames as u64
        } else {
            (duration_secs * frame_rate).round().max(0.0) as u64
        };

        let codec = decoder
            .codec()
            .map(|codec| codec.name().to_string())
            .unwrap_or_else(|| "unknown".to_string());

        let properties = StreamProperties {
            codec,
            resolution: Resolution::new(decoder.width(), decoder.height()),
            frame_rate,
            frame_count,
            duration_secs,
        };

        info!(
            "Opened {}: {} {} @ {:.2} fps, {} frames, {:.2}s",
            path.display(),
            properties.codec,
            properties.resolution,
            properties.frame_rate,
            properties.frame_count,
            properties.duration_secs
        );

        Ok(Self {
            decoder,
            input,
            scaler: None,
            stream_index,
            time_base,
            properties,
            next_index: 0,
            eof_sent: false,
        })
    }

    pub fn properties(&self) -> &StreamProperties {
        &self.properties
    }

    pub fn resolution(&self) -> Resolution {
        self.properties.resolution
    }

    pub fn frame_rate(&self) -> f64 {
        self.properties.frame_rate
    }

    pub fn duration_secs(&self) -> f64 {
        self.properties.duration_secs
    }

    /// Decode the next frame, or `None` once the stream is exhausted
    pub fn next_frame(&mut self) -> MonoShotResult<Option<DecodedFrame>> {
        let mut decoded = VideoFrame::empty();
        loop {
            if self.decoder.receive_frame(&mut decoded).is_ok() {
                return self.convert(&decoded).map(Some);
            }
            if self.eof_sent {
                return Ok(None);
            }

            match self.input.packets().next() {
                Some((stream, packet)) => {
                    if stream.index() == self.stream_index {
                        self.decoder
                            .send_packet(&packet)
                            .map_err(|e| MonoShotError::DecodeError {
                                message: format!("failed to decode packet: {}", e),
                            })?;
                    }
                }
                None => {
                    self.decoder
                        .send_eof()
                        .map_err(|e| MonoShotError::DecodeError {
                            message: format!("failed to flush decoder: {}", e),
                        })?;
                    self.eof_sent = true;
                }
            }
        }
    }

    /// Reposition to the keyframe at or before `timestamp_ms`
    pub fn seek_ms(&mut self, timestamp_ms: u64) -> MonoShotResult<()> {
        let target = (timestamp_ms as i64).saturating_mul(ffmpeg::ffi::AV_TIME_BASE as i64 / 1000);
        self.input
            .seek(target, ..target)
            .map_err(|e| MonoShotError::DecodeError {
                message: format!("failed to seek to {}ms: {}", timestamp_ms, e),
            })?;
        self.decoder.flush();
        self.eof_sent = false;
        debug!("Seeked to {}ms", timestamp_ms);
        Ok(())
    }

    /// Decode the first frame presented at or after `timestamp_ms`.
    ///
    /// Past the end of the stream the last decoded frame is returned.
    pub fn frame_at_ms(&mut self, timestamp_ms: u64) -> MonoShotResult<DecodedFrame> {
        let target = timestamp_ms as f64 / 1000.0;
        let half_frame = if self.properties.frame_rate > 0.0 {
            0.5 / self.properties.frame_rate
        } else {
            0.0
        };

        self.seek_ms(timestamp_ms)?;

        let mut last = None;
        while let Some(frame) = self.next_frame()? {
            if frame.timestamp + half_frame >= target {
                return Ok(frame);
            }
            last = Some(frame);
        }

        last.ok_or_else(|| MonoShotError::DecodeError {
            message: format!("no frame could be decoded at {}ms", timestamp_ms),
        })
    }

    fn convert(&mut self, decoded: &VideoFrame) -> MonoShotResult<DecodedFrame> {
        let (width, height) = (decoded.width(), decoded.height());

        if self.scaler.is_none() {
            let scaler = Scaler::get(
                decoded.format(),
                width,
                height,
                Pixel::RGB24,
                width,
                height,
                Flags::BILINEAR,
            )
            .map_err(|e| MonoShotError::DecodeError {
                message: format!("failed to create RGB converter: {}", e),
            })?;
            self.scaler = Some(scaler);
        }

        let mut rgb = VideoFrame::empty();
        if let Some(scaler) = self.scaler.as_mut() {
            scaler
                .run(decoded, &mut rgb)
                .map_err(|e| MonoShotError::DecodeError {
                    message: format!("failed to convert frame to RGB: {}", e),
                })?;
        }

        let stride = rgb.stride(0);
        let row_bytes = width as usize * 3;
        let data = rgb.data(0);
        let mut buffer = Vec::with_capacity(row_bytes * height as usize);
        for row in 0..height as usize {
            let start = row * stride;
            buffer.extend_from_slice(&data[start..start + row_bytes]);
        }

        let image = RgbImage::from_raw(width, height, buffer).ok_or_else(|| {
            MonoShotError::DecodeError {
                message: format!("frame buffer does not match {}x{}", width, height),
            }
        })?;

        let index = self.next_index;
        self.next_index += 1;

        let timestamp = match decoded.timestamp().or_else(|| decoded.pts()) {
            Some(ts) => ts as f64 * f64::from(self.time_base),
            None if self.properties.frame_rate > 0.0 => index as f64 / self.properties.frame_rate,
            None => 0.0,
        };

        Ok(DecodedFrame {
            index,
            timestamp,
            image,
        })
    }
}

impl Drop for FrameReader {
    fn drop(&mut self) {
        debug!("Releasing decoder after {} frames", self.next_index);
    }
}

/// Open an image by content, ignoring the extension; alpha is dropped
pub fn load_image(path: &Path) -> MonoShotResult<RgbImage> {
    let image = ImageReader::open(path)?.with_guessed_format()?.decode()?;
    Ok(image.to_rgb8())
}

/// Image dimensions read from the header only
pub fn image_dimensions(path: &Path) -> MonoShotResult<Resolution> {
    let (width, height) = ImageReader::open(path)?
        .with_guessed_format()?
        .into_dimensions()?;
    Ok(Resolution::new(width, height))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_load_image_ignores_extension() {
        let dir = tempfile::tempdir().unwrap();
        let png = dir.path().join("frame.png");
        RgbImage::from_pixel(6, 4, Rgb([9, 8, 7])).save(&png).unwrap();
        let renamed = dir.path().join("upload.bin");
        std::fs::rename(&png, &renamed).unwrap();

        assert_eq!(image_dimensions(&renamed).unwrap(), Resolution::new(6, 4));
        assert_eq!(load_image(&renamed).unwrap().get_pixel(0, 0), &Rgb([9, 8, 7]));
    }

    #[test]
    fn test_open_missing_video_fails() {
        let err = FrameReader::open(Path::new("/no/such/clip.mp4")).unwrap_err();
        assert!(!matches!(err, MonoShotError::InputRejected { .. }));
    }
}
