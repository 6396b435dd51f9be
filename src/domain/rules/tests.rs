// Unit tests for business rules

#[cfg(test)]
mod tests {
    use crate::domain::model::*;
    use crate::domain::rules::*;
    use crate::error::MonoShotError;

    #[test]
    fn test_resolution_band_landscape_and_portrait() {
        assert!(ResolutionBand::accepts(Resolution::new(1920, 1080)));
        assert!(ResolutionBand::accepts(Resolution::new(1280, 720)));
        assert!(ResolutionBand::accepts(Resolution::new(720, 1280)));
        assert!(ResolutionBand::accepts(Resolution::new(1080, 1920)));
    }

    #[test]
    fn test_resolution_band_inclusive_boundaries() {
        assert!(ResolutionBand::accepts(Resolution::new(852, 480)));
        assert!(ResolutionBand::accepts(Resolution::new(480, 852)));
        assert!(ResolutionBand::accepts(Resolution::new(1920, 480)));
        assert!(ResolutionBand::accepts(Resolution::new(852, 1080)));

        assert!(!ResolutionBand::accepts(Resolution::new(851, 480)));
        assert!(!ResolutionBand::accepts(Resolution::new(852, 479)));
        assert!(!ResolutionBand::accepts(Resolution::new(1921, 1080)));
        assert!(!ResolutionBand::accepts(Resolution::new(3840, 2160)));
        assert!(!ResolutionBand::accepts(Resolution::new(640, 360)));
    }

    #[test]
    fn test_resolution_band_square_between_bands_is_rejected() {
        // Both sides sit in the short band but neither reaches the long band
        assert!(!ResolutionBand::accepts(Resolution::new(800, 800)));
        assert!(!ResolutionBand::accepts(Resolution::new(600, 700)));
        assert!(ResolutionBand::accepts(Resolution::new(1000, 1000)));
    }

    #[test]
    fn test_input_policy() {
        let policy = InputPolicy::default();
        assert!(policy.check_video(30, Resolution::new(1280, 720)).is_ok());

        let too_long = policy.check_video(31, Resolution::new(1280, 720)).unwrap_err();
        assert!(matches!(too_long, MonoShotError::InputRejected { .. }));

        let too_small = policy.check_video(10, Resolution::new(320, 240)).unwrap_err();
        assert!(too_small.is_rejection());
    }

    #[test]
    fn test_duration_from_frames() {
        assert_eq!(DurationRules::from_frames(300, 30.0).unwrap(), 10);
        assert_eq!(DurationRules::from_frames(299, 30.0).unwrap(), 9);
        // Rate is truncated before dividing
        assert_eq!(DurationRules::from_frames(300, 29.97).unwrap(), 10);
        assert_eq!(
            DurationRules::from_frames(300, 29.97).unwrap(),
            DurationRules::from_frames(300, 29.97).unwrap()
        );
        assert!(DurationRules::from_frames(300, 0.0).is_err());
        assert!(DurationRules::from_frames(300, 0.5).is_err());
        assert!(DurationRules::from_frames(300, f64::NAN).is_err());
    }

    #[test]
    fn test_time_lapse_stride_keeps_ten_of_hundred_in_order() {
        let frames: Vec<u32> = (0..100).collect();
        let kept = FrameSelection::every_nth(frames, TIME_LAPSE_STRIDE);
        assert_eq!(kept.len(), 10);
        assert_eq!(kept, vec![0, 10, 20, 30, 40, 50, 60, 70, 80, 90]);
    }

    #[test]
    fn test_frame_selection_stride_one_keeps_all() {
        assert!(FrameSelection::keeps(7, 1));
        assert_eq!(FrameSelection::every_nth(0..5, 1).len(), 5);
    }

    #[test]
    fn test_geometry_scaled_and_even() {
        let scaled = GeometryRules::scaled(Resolution::new(1280, 720), GIF_SCALE);
        assert_eq!(scaled, Resolution::new(768, 432));
        assert_eq!(
            GeometryRules::even(Resolution::new(853, 481)),
            Resolution::new(852, 480)
        );
    }

    #[test]
    fn test_boomerang_crop_fits_landscape_only() {
        let landscape = GeometryRules::scaled(Resolution::new(852, 480), GIF_SCALE);
        assert!(BOOMERANG_CROP.check_fits(landscape).is_ok());

        let portrait = GeometryRules::scaled(Resolution::new(480, 852), GIF_SCALE);
        let err = BOOMERANG_CROP.check_fits(portrait).unwrap_err();
        assert!(matches!(err, MonoShotError::Geometry { .. }));
        assert_eq!(BOOMERANG_CROP.width(), 284);
        assert_eq!(BOOMERANG_CROP.height(), 288);
    }

    #[test]
    fn test_boomerang_plan_segments_mirror() {
        let range = BoomerangRange::new(2.0, 5.0).unwrap();
        let plan = BoomerangPlan::new(range, BOOMERANG_SPEED, BOOMERANG_FPS);

        assert_eq!(plan.forward.len(), plan.reverse.len());
        assert_eq!(plan.forward.len(), 38);
        assert_eq!(plan.frame_count(), 76);
        assert_eq!(plan.forward[0], 2.0);
        assert!(*plan.forward.last().unwrap() < 5.0);

        let mirrored: Vec<f64> = plan.forward.iter().rev().copied().collect();
        assert_eq!(plan.reverse, mirrored);

        // Each sped-up pass lasts half the sub-clip
        let expected = 2.0 * range.span() / BOOMERANG_SPEED;
        assert!((plan.duration_secs() - expected).abs() <= 2.0 / BOOMERANG_FPS as f64);
    }

    #[test]
    fn test_boomerang_validate_against_duration() {
        let range = BoomerangRange::new(2.0, 5.0).unwrap();
        assert!(BoomerangPlan::validate(&range, 5.0).is_ok());
        assert!(BoomerangPlan::validate(&range, 4.0).is_err());
    }

    #[test]
    fn test_enhancement_rules_validate() {
        assert!(EnhancementLevels::new(0.0, 2.0, 1.4, 0.6).is_ok());
        assert!(EnhancementLevels::new(2.2, 1.0, 1.0, 1.0).is_err());
        assert!(EnhancementLevels::new(1.0, -0.2, 1.0, 1.0).is_err());
        assert!(EnhancementLevels::new(1.0, 1.0, 1.1, 1.0).is_err());
    }

    #[test]
    fn test_enhancement_plan_exclusive_priority() {
        let levels = EnhancementLevels::new(1.0, 1.4, 0.6, 1.2).unwrap();
        let plan = EnhancementRules::plan(&levels, EnhancementMode::Exclusive);
        assert_eq!(plan, vec![(EnhancementKind::Sharpness, 1.4)]);

        let composed = EnhancementRules::plan(&levels, EnhancementMode::Composed);
        assert_eq!(
            composed,
            vec![
                (EnhancementKind::Sharpness, 1.4),
                (EnhancementKind::Contrast, 0.6),
                (EnhancementKind::Color, 1.2),
            ]
        );

        let identity = EnhancementRules::plan(&EnhancementLevels::default(), EnhancementMode::Composed);
        assert!(identity.is_empty());
    }

    #[test]
    fn test_parameter_bounds() {
        assert!(ParameterBounds::check_timestamp(1, 10).is_ok());
        assert!(ParameterBounds::check_timestamp(10, 10).is_ok());
        assert!(ParameterBounds::check_timestamp(0, 10).is_err());
        assert!(ParameterBounds::check_timestamp(11, 10).is_err());

        let range = ParameterBounds::check_boomerang(2, 5, 10).unwrap();
        assert_eq!(range, BoomerangRange::new(2.0, 5.0).unwrap());
        assert!(ParameterBounds::check_boomerang(2, 3, 10).is_err());
        assert!(ParameterBounds::check_boomerang(0, 5, 10).is_err());
        assert!(ParameterBounds::check_boomerang(2, 11, 10).is_err());
    }

    #[test]
    fn test_shot_range_only_for_boomerang() {
        assert_eq!(
            ParameterBounds::check_shot("gif", None, 10).unwrap(),
            ShotKind::Gif
        );
        assert_eq!(
            ParameterBounds::check_shot("Boomerang", Some((2, 5)), 10).unwrap(),
            ShotKind::Boomerang(BoomerangRange::new(2.0, 5.0).unwrap())
        );

        // An out-of-range pair is refused as unused, not as out of bounds
        let err = ParameterBounds::check_shot("gif", Some((0, 50)), 10).unwrap_err();
        assert!(err.to_string().contains("only boomerang"));
        assert!(ParameterBounds::check_shot("timelapse", Some((2, 5)), 10).is_err());

        assert!(ParameterBounds::check_shot("boomerang", None, 10).is_err());
        assert!(ParameterBounds::check_shot("boomerang", Some((2, 3)), 10).is_err());
        assert!(ParameterBounds::check_shot("zoom", Some((2, 5)), 10).is_err());
    }
}
