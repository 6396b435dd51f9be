// Domain rules - Gates, parameter bounds and frame planning policies

use crate::domain::model::*;
use crate::error::{MonoShotError, MonoShotResult};

/// Slow-motion output frame rate, as numerator/denominator (5.5 fps)
pub const SLOW_MOTION_RATE: (i32, i32) = (11, 2);
/// Time-lapse output frame rate
pub const TIME_LAPSE_FPS: i32 = 30;
/// Time-lapse keeps one frame out of this many
pub const TIME_LAPSE_STRIDE: u64 = 10;
/// Downscale factor applied to GIF and boomerang frames
pub const GIF_SCALE: f64 = 0.6;
/// Boomerang output frame rate
pub const BOOMERANG_FPS: u32 = 25;
/// Boomerang playback speed-up
pub const BOOMERANG_SPEED: f64 = 2.0;
/// Boomerang crop window, applied after downscaling
pub const BOOMERANG_CROP: CropRect = CropRect {
    x1: 115,
    y1: 0,
    x2: 399,
    y2: 288,
};
/// Default maximum accepted video duration in seconds
pub const DEFAULT_MAX_DURATION_SECS: u64 = 30;
/// Enhancement level bounds and slider step
pub const ENHANCEMENT_MIN: f32 = 0.0;
pub const ENHANCEMENT_MAX: f32 = 2.0;
pub const ENHANCEMENT_STEP: f32 = 0.2;

/// Accepted resolution band, roughly 480p to 1080p in either orientation
pub struct ResolutionBand;

impl ResolutionBand {
    pub const LONG_SIDE: (u32, u32) = (852, 1920);
    pub const SHORT_SIDE: (u32, u32) = (480, 1080);

    /// True iff (w, h) or (h, w) falls inside the band; bounds are inclusive
    pub fn accepts(resolution: Resolution) -> bool {
        Self::landscape_fits(resolution) || Self::landscape_fits(resolution.transposed())
    }

    fn landscape_fits(resolution: Resolution) -> bool {
        let (w_min, w_max) = Self::LONG_SIDE;
        let (h_min, h_max) = Self::SHORT_SIDE;
        (w_min..=w_max).contains(&resolution.width) && (h_min..=h_max).contains(&resolution.height)
    }
}

/// Upload gate applied to videos before any transformation is offered
#[derive(Debug, Clone)]
pub struct InputPolicy {
    pub max_duration_secs: u64,
}

impl Default for InputPolicy {
    fn default() -> Self {
        Self {
            max_duration_secs: DEFAULT_MAX_DURATION_SECS,
        }
    }
}

impl InputPolicy {
    pub fn new(max_duration_secs: u64) -> Self {
        Self { max_duration_secs }
    }

    /// Reject videos that are too long or outside the resolution band
    pub fn check_video(&self, duration_secs: u64, resolution: Resolution) -> MonoShotResult<()> {
        if duration_secs > self.max_duration_secs {
            return Err(MonoShotError::InputRejected {
                reason: format!(
                    "video too long to be processed ({}s, limit {}s)",
                    duration_secs, self.max_duration_secs
                ),
            });
        }

        if !ResolutionBand::accepts(resolution) {
            return Err(MonoShotError::InputRejected {
                reason: format!(
                    "resolution {} outside the allowed 480p-1080p band",
                    resolution
                ),
            });
        }

        Ok(())
    }
}

/// Duration arithmetic shared by the probe and the shell
pub struct DurationRules;

impl DurationRules {
    /// Whole seconds: floor(frame_count / trunc(fps)); a zero rate is an error
    pub fn from_frames(frame_count: u64, frame_rate: f64) -> MonoShotResult<u64> {
        let fps = if frame_rate.is_finite() { frame_rate.trunc() } else { 0.0 };
        if fps < 1.0 {
            return Err(MonoShotError::ProbeError {
                message: format!("frame rate {:.3} is unusable for duration", frame_rate),
            });
        }
        Ok(frame_count / fps as u64)
    }
}

/// Frame selection policies
pub struct FrameSelection;

impl FrameSelection {
    /// True when the frame at `index` is kept by a stride-N selection
    pub fn keeps(index: u64, stride: u64) -> bool {
        stride <= 1 || index % stride == 0
    }

    /// Keep every `stride`-th item starting from the first, preserving order
    pub fn every_nth<T>(items: impl IntoIterator<Item = T>, stride: u64) -> Vec<T> {
        items
            .into_iter()
            .enumerate()
            .filter(|(index, _)| Self::keeps(*index as u64, stride))
            .map(|(_, item)| item)
            .collect()
    }
}

/// Axis-aligned crop rectangle with exclusive upper bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
}

impl CropRect {
    pub fn width(&self) -> u32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> u32 {
        self.y2 - self.y1
    }

    /// Fail unless the rectangle lies inside a frame of the given size
    pub fn check_fits(&self, frame: Resolution) -> MonoShotResult<()> {
        if self.x2 > frame.width || self.y2 > frame.height {
            return Err(MonoShotError::Geometry {
                message: format!(
                    "crop x={}..{} y={}..{} exceeds scaled frame {}",
                    self.x1, self.x2, self.y1, self.y2, frame
                ),
            });
        }
        Ok(())
    }
}

/// Frame geometry helpers
pub struct GeometryRules;

impl GeometryRules {
    /// Dimensions after scaling by `factor`, truncated and never below 1
    pub fn scaled(resolution: Resolution, factor: f64) -> Resolution {
        let scale = |v: u32| ((v as f64 * factor) as u32).max(1);
        Resolution::new(scale(resolution.width), scale(resolution.height))
    }

    /// Largest even dimensions not exceeding the input (4:2:0 encoders need even sizes)
    pub fn even(resolution: Resolution) -> Resolution {
        Resolution::new(
            (resolution.width & !1).max(2),
            (resolution.height & !1).max(2),
        )
    }
}

/// Source timestamps sampled for each boomerang output frame
#[derive(Debug, Clone, PartialEq)]
pub struct BoomerangPlan {
    pub forward: Vec<f64>,
    pub reverse: Vec<f64>,
    pub fps: u32,
}

impl BoomerangPlan {
    /// Sample the sped-up forward pass and its mirror at the output rate
    pub fn new(range: BoomerangRange, speed: f64, fps: u32) -> Self {
        let segment_secs = range.span() / speed;
        let frames = (segment_secs * fps as f64 - 1e-9).ceil().max(1.0) as usize;
        let forward: Vec<f64> = (0..frames)
            .map(|i| range.start + speed * i as f64 / fps as f64)
            .collect();
        let reverse = forward.iter().rev().copied().collect();
        Self {
            forward,
            reverse,
            fps,
        }
    }

    /// All sampled source timestamps in output order
    pub fn timeline(&self) -> impl Iterator<Item = f64> + '_ {
        self.forward.iter().chain(self.reverse.iter()).copied()
    }

    pub fn frame_count(&self) -> usize {
        self.forward.len() + self.reverse.len()
    }

    /// Output duration in seconds
    pub fn duration_secs(&self) -> f64 {
        self.frame_count() as f64 / self.fps as f64
    }

    /// Validate a boomerang range against the clip duration
    pub fn validate(range: &BoomerangRange, duration_secs: f64) -> MonoShotResult<()> {
        if range.start < 0.0 || range.end <= range.start || range.end > duration_secs {
            return Err(MonoShotError::InvalidTimeRange {
                start: range.start,
                end: range.end,
                duration: duration_secs,
            });
        }
        Ok(())
    }
}

/// Enhancement level validation
pub struct EnhancementRules;

impl EnhancementRules {
    /// Levels must lie in [0.0, 2.0] on the 0.2 grid
    pub fn validate(levels: &EnhancementLevels) -> MonoShotResult<()> {
        for (kind, level) in levels.ordered() {
            if !level.is_finite() || !(ENHANCEMENT_MIN..=ENHANCEMENT_MAX).contains(&level) {
                return Err(MonoShotError::invalid_parameter(
                    &kind.to_string(),
                    format!(
                        "{} outside [{}, {}]",
                        level, ENHANCEMENT_MIN, ENHANCEMENT_MAX
                    ),
                ));
            }
            let steps = level / ENHANCEMENT_STEP;
            if (steps - steps.round()).abs() > 1e-3 {
                return Err(MonoShotError::invalid_parameter(
                    &kind.to_string(),
                    format!("{} is not a multiple of {}", level, ENHANCEMENT_STEP),
                ));
            }
        }
        Ok(())
    }

    /// Adjustments to apply, in priority order, for the given mode
    pub fn plan(levels: &EnhancementLevels, mode: EnhancementMode) -> Vec<(EnhancementKind, f32)> {
        let active = levels
            .ordered()
            .into_iter()
            .filter(|(_, level)| *level != 1.0);
        match mode {
            EnhancementMode::Exclusive => active.take(1).collect(),
            EnhancementMode::Composed => active.collect(),
        }
    }
}

/// Bounds the shell applies to user-chosen parameters
pub struct ParameterBounds;

impl ParameterBounds {
    /// Timestamp in whole seconds within [1, duration]
    pub fn check_timestamp(timestamp_secs: u64, duration_secs: u64) -> MonoShotResult<()> {
        if timestamp_secs < 1 || timestamp_secs > duration_secs {
            return Err(MonoShotError::invalid_parameter(
                "timestamp",
                format!("{}s outside [1, {}]", timestamp_secs, duration_secs),
            ));
        }
        Ok(())
    }

    /// Boomerang start within [1, duration], end within [start + 2, duration]
    pub fn check_boomerang(start_secs: u64, end_secs: u64, duration_secs: u64) -> MonoShotResult<BoomerangRange> {
        if start_secs < 1 || start_secs > duration_secs {
            return Err(MonoShotError::invalid_parameter(
                "start",
                format!("{}s outside [1, {}]", start_secs, duration_secs),
            ));
        }
        if end_secs < start_secs + 2 || end_secs > duration_secs {
            return Err(MonoShotError::invalid_parameter(
                "end",
                format!("{}s outside [{}, {}]", end_secs, start_secs + 2, duration_secs),
            ));
        }
        BoomerangRange::new(start_secs as f64, end_secs as f64)
    }

    /// Resolve a shot name; a range is checked for boomerang and refused otherwise
    pub fn check_shot(
        name: &str,
        range_secs: Option<(u64, u64)>,
        duration_secs: u64,
    ) -> MonoShotResult<ShotKind> {
        match range_secs {
            Some((start, end)) if ShotKind::takes_range(name) => {
                let range = Self::check_boomerang(start, end, duration_secs)?;
                ShotKind::parse(name, Some(range))
            }
            Some(_) => {
                let kind = ShotKind::parse(name, None)?;
                Err(MonoShotError::invalid_parameter(
                    "start/end",
                    format!("only boomerang takes --start and --end, not {}", kind),
                ))
            }
            None => ShotKind::parse(name, None),
        }
    }
}

#[cfg(test)]
mod tests;
