// Copyright (c) 2023 Mike Tsao. All rights reserved.

//! Turns raw detector output into bounded, named parameters.
//!
//! Blendshape scores arrive in roughly 0..=1, but each facial movement has its
//! own useful sub-range: an open eye rarely scores below 0.04 on
//! `eyeBlinkLeft`, and a fully closed one rarely exceeds 0.4. Each input
//! therefore has a [Calibration] that rescales that sub-range, optionally
//! clips it, and optionally flips it. Head angles come from the face's
//! transformation matrix and are mapped onto -30..=30 degrees.
//!
//! The calibration constants were chosen by hand against one particular
//! detector. Changing them changes how every face-driven binding feels.

use crate::{
    detection::{Blendshape, DetectorResult, TransformMatrix},
    params::{ParamName, ParameterType},
};
use bounded_vec_deque::BoundedVecDeque;
use std::collections::HashMap;

/// Linear rescale so that `min` maps to 0 and `max` to 1. No clipping.
pub fn scale(value: f64, min: f64, max: f64) -> f64 {
    (value - min) / (max - min)
}

/// [scale()], then clamp to `clip_min..=clip_max`.
pub fn scale_clip(value: f64, min: f64, max: f64, clip_min: f64, clip_max: f64) -> f64 {
    scale(value, min, max).clamp(clip_min, clip_max)
}

/// `invert` minus [scale()], then clamp to `clip_min..=clip_max`.
pub fn scale_clip_invert(
    value: f64,
    min: f64,
    max: f64,
    clip_min: f64,
    clip_max: f64,
    invert: f64,
) -> f64 {
    (invert - scale(value, min, max)).clamp(clip_min, clip_max)
}

/// How one raw input is rescaled.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Calibration {
    /// The raw value that rescales to 0.
    pub scale_min: f64,
    /// The raw value that rescales to 1.
    pub scale_max: f64,
    /// Bounds for the rescaled value, if any.
    pub clip: Option<(f64, f64)>,
    /// If present, the rescaled value is subtracted from this before
    /// clipping.
    pub invert: Option<f64>,
}
impl Calibration {
    /// Rescale only.
    pub const fn new(scale_min: f64, scale_max: f64) -> Self {
        Self {
            scale_min,
            scale_max,
            clip: None,
            invert: None,
        }
    }

    /// Adds clipping.
    pub const fn clipped(mut self, clip_min: f64, clip_max: f64) -> Self {
        self.clip = Some((clip_min, clip_max));
        self
    }

    /// Adds inversion.
    pub const fn inverted(mut self, invert: f64) -> Self {
        self.invert = Some(invert);
        self
    }

    /// Applies the calibration to one raw value.
    pub fn apply(&self, value: f64) -> f64 {
        let scaled = match self.invert {
            Some(invert) => invert - scale(value, self.scale_min, self.scale_max),
            None => scale(value, self.scale_min, self.scale_max),
        };
        match self.clip {
            Some((clip_min, clip_max)) => scaled.clamp(clip_min, clip_max),
            None => scaled,
        }
    }
}

/// The calibration table.
pub mod calibration {
    use super::Calibration;

    /// `eyeBlinkLeft`/`eyeBlinkRight` to eye openness: 1.8 when wide open,
    /// 0 when shut.
    pub const EYE_BLINK: Calibration = Calibration::new(0.04, 0.4)
        .clipped(0.0, 1.8)
        .inverted(1.8);
    /// `jawOpen`.
    pub const JAW_OPEN: Calibration = Calibration::new(0.03, 0.5).clipped(0.0, 1.0);
    /// `mouthSmileLeft`/`mouthSmileRight`. Clipped only after the two sides
    /// are combined.
    pub const MOUTH_SMILE: Calibration = Calibration::new(0.05, 0.85);
    /// `mouthShrugLower`.
    pub const MOUTH_SHRUG_LOWER: Calibration = Calibration::new(0.1, 0.6).clipped(0.0, 1.0);
    /// `mouthLeft`/`mouthRight`.
    pub const MOUTH_LATERAL: Calibration = Calibration::new(0.02, 0.5).clipped(0.0, 1.0);
    /// `eyeLookIn*`/`eyeLookOut*`.
    pub const EYE_LOOK_HORIZONTAL: Calibration = Calibration::new(0.08, 0.7).clipped(0.0, 1.0);
    /// `eyeLookUp*`.
    pub const EYE_LOOK_UP: Calibration = Calibration::new(0.06, 0.55).clipped(0.0, 1.0);
    /// `eyeLookDown*`.
    pub const EYE_LOOK_DOWN: Calibration = Calibration::new(0.1, 0.6).clipped(0.0, 1.0);
    /// Face pitch, in radians.
    pub const FACE_PITCH: Calibration = Calibration::new(-0.5, 0.5)
        .clipped(-1.0, 1.0)
        .inverted(0.5);
    /// Face yaw, in radians.
    pub const FACE_YAW: Calibration = Calibration::new(-0.4, 0.4)
        .clipped(-1.0, 1.0)
        .inverted(0.5);
    /// Face roll, in radians.
    pub const FACE_ROLL: Calibration = Calibration::new(-0.6, 0.6)
        .clipped(-1.0, 1.0)
        .inverted(0.5);
    /// Body translation, in the detector's units.
    pub const BODY_POSITION: Calibration = Calibration::new(-10.0, 10.0).clipped(0.0, 1.0);

    /// Multiplier from a calibrated face angle to degrees.
    pub const ANGLE_DEGREES: f64 = -60.0;
    /// Head angles are clamped to +/- this many degrees.
    pub const ANGLE_LIMIT: f64 = 30.0;
    /// Calibrated body position spans this many output units...
    pub const BODY_SPAN: f64 = 20.0;
    /// ...centered on zero.
    pub const BODY_OFFSET: f64 = -10.0;
}

/// Detector blendshape names.
#[allow(missing_docs)]
pub mod blendshapes {
    pub const BROW_INNER_UP: &str = "browInnerUp";
    pub const EYE_BLINK_LEFT: &str = "eyeBlinkLeft";
    pub const EYE_BLINK_RIGHT: &str = "eyeBlinkRight";
    pub const EYE_LOOK_DOWN_LEFT: &str = "eyeLookDownLeft";
    pub const EYE_LOOK_DOWN_RIGHT: &str = "eyeLookDownRight";
    pub const EYE_LOOK_IN_LEFT: &str = "eyeLookInLeft";
    pub const EYE_LOOK_IN_RIGHT: &str = "eyeLookInRight";
    pub const EYE_LOOK_OUT_LEFT: &str = "eyeLookOutLeft";
    pub const EYE_LOOK_OUT_RIGHT: &str = "eyeLookOutRight";
    pub const EYE_LOOK_UP_LEFT: &str = "eyeLookUpLeft";
    pub const EYE_LOOK_UP_RIGHT: &str = "eyeLookUpRight";
    pub const JAW_OPEN: &str = "jawOpen";
    pub const MOUTH_LEFT: &str = "mouthLeft";
    pub const MOUTH_RIGHT: &str = "mouthRight";
    pub const MOUTH_SHRUG_LOWER: &str = "mouthShrugLower";
    pub const MOUTH_SMILE_LEFT: &str = "mouthSmileLeft";
    pub const MOUTH_SMILE_RIGHT: &str = "mouthSmileRight";
}

/// Blendshape scores seen during the current frame, per name.
#[derive(Debug, Default)]
pub struct BlendshapeHistory {
    scores: HashMap<String, BoundedVecDeque<f64>>,
}
impl BlendshapeHistory {
    /// Scores kept per name. A frame normally has one.
    pub const CAPACITY: usize = 8;

    /// Records a score.
    pub fn push(&mut self, blendshape: &Blendshape) {
        self.scores
            .entry(blendshape.category_name.clone())
            .or_insert_with(|| BoundedVecDeque::new(Self::CAPACITY))
            .push_back(blendshape.score);
    }

    /// The most recent score for `name`.
    pub fn latest(&self, name: &str) -> Option<f64> {
        self.scores.get(name).and_then(|scores| scores.back().copied())
    }

    /// The most recent score for `name`, run through `calibration`.
    pub fn calibrated(&self, name: &str, calibration: &Calibration) -> Option<f64> {
        self.latest(name).map(|score| calibration.apply(score))
    }

    /// Whether nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// Forgets everything.
    pub fn clear(&mut self) {
        self.scores.clear();
    }
}

/// Raw face rotation, in radians, before calibration.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FaceRotation {
    /// Drives [ParamName::AngleX].
    pub x: f64,
    /// Drives [ParamName::AngleY].
    pub y: f64,
    /// Drives [ParamName::AngleZ].
    pub z: f64,
}
impl FaceRotation {
    /// Euler-angle extraction from the matrix's rotation part.
    pub fn from_matrix(matrix: &TransformMatrix) -> Self {
        let m = matrix.to_matrix();
        Self {
            x: -(-m[(2, 0)]).atan2((m[(2, 1)].powi(2) + m[(2, 2)].powi(2)).sqrt()),
            y: -m[(2, 1)].atan2(m[(2, 2)]),
            z: m[(1, 0)].atan2(m[(0, 0)]),
        }
    }
}

/// Picks between two opposing candidates: the larger wins with its own sign,
/// and a tie goes to `negative`.
fn winner_take_most(positive: f64, negative: f64) -> f64 {
    if positive > negative {
        positive
    } else {
        -negative
    }
}

/// Converts detector output into parameter writes.
///
/// Call [SignalNormalizer::observe()] with a frame's blendshapes, then
/// [SignalNormalizer::normalize()], then [SignalNormalizer::end_frame()].
/// [Session](crate::session::Session) does this for you.
#[derive(Debug, Default)]
pub struct SignalNormalizer {
    history: BlendshapeHistory,
}
impl SignalNormalizer {
    /// The blendshapes observed so far this frame.
    pub fn history(&self) -> &BlendshapeHistory {
        &self.history
    }

    /// Records a frame's blendshape scores.
    pub fn observe(&mut self, blendshapes: &[Blendshape]) {
        for blendshape in blendshapes {
            self.history.push(blendshape);
        }
    }

    /// Runs every pass, sending each computed parameter to `sink`. A
    /// parameter whose inputs are missing this frame isn't written. The pose
    /// passes run whenever their matrix is present, even on a frame with no
    /// blendshapes.
    pub fn normalize(
        &self,
        result: &DetectorResult,
        sink: &mut dyn FnMut(ParamName, ParameterType),
    ) {
        if !self.history.is_empty() {
            self.process_eye_blink(sink);
            self.process_eye_x(sink);
            self.process_eye_y(sink);
            self.process_brow_y(sink);
            self.process_mouth(sink);
        }
        if let Some(matrix) = result.facial_transformation_matrix.as_ref() {
            Self::process_face_angles(matrix, sink);
        }
        if let Some(matrix) = result.body_matrix() {
            Self::process_body_position(matrix, sink);
        }
    }

    /// Clears the per-frame history.
    pub fn end_frame(&mut self) {
        self.history.clear();
    }

    fn process_brow_y(&self, sink: &mut dyn FnMut(ParamName, ParameterType)) {
        if let Some(brow) = self.history.latest(blendshapes::BROW_INNER_UP) {
            let y = (brow - 0.5) * 2.0;
            sink(ParamName::BrowLY, y);
            sink(ParamName::BrowRY, y);
        }
    }

    fn process_eye_blink(&self, sink: &mut dyn FnMut(ParamName, ParameterType)) {
        let h = &self.history;
        if let Some(v) = h.calibrated(blendshapes::EYE_BLINK_LEFT, &calibration::EYE_BLINK) {
            sink(ParamName::EyeLOpen, v);
        }
        if let Some(v) = h.calibrated(blendshapes::EYE_BLINK_RIGHT, &calibration::EYE_BLINK) {
            sink(ParamName::EyeROpen, v);
        }
    }

    fn process_eye_x(&self, sink: &mut dyn FnMut(ParamName, ParameterType)) {
        let h = &self.history;
        let c = &calibration::EYE_LOOK_HORIZONTAL;
        let (Some(in_left), Some(in_right), Some(out_left), Some(out_right)) = (
            h.calibrated(blendshapes::EYE_LOOK_IN_LEFT, c),
            h.calibrated(blendshapes::EYE_LOOK_IN_RIGHT, c),
            h.calibrated(blendshapes::EYE_LOOK_OUT_LEFT, c),
            h.calibrated(blendshapes::EYE_LOOK_OUT_RIGHT, c),
        ) else {
            return;
        };
        // Looking right turns the left eye in and the right eye out.
        let right = (in_left + out_right) / 2.0;
        let left = (out_left + in_right) / 2.0;
        sink(ParamName::EyeBallX, winner_take_most(right, left));
    }

    fn process_eye_y(&self, sink: &mut dyn FnMut(ParamName, ParameterType)) {
        let h = &self.history;
        let (Some(up_left), Some(up_right), Some(down_left), Some(down_right)) = (
            h.calibrated(blendshapes::EYE_LOOK_UP_LEFT, &calibration::EYE_LOOK_UP),
            h.calibrated(blendshapes::EYE_LOOK_UP_RIGHT, &calibration::EYE_LOOK_UP),
            h.calibrated(blendshapes::EYE_LOOK_DOWN_LEFT, &calibration::EYE_LOOK_DOWN),
            h.calibrated(blendshapes::EYE_LOOK_DOWN_RIGHT, &calibration::EYE_LOOK_DOWN),
        ) else {
            return;
        };
        let up = (up_left + up_right) / 2.0;
        let down = (down_left + down_right) / 2.0;
        sink(ParamName::EyeBallY, winner_take_most(up, down));
    }

    fn process_mouth(&self, sink: &mut dyn FnMut(ParamName, ParameterType)) {
        let h = &self.history;
        if let Some(v) = h.calibrated(blendshapes::JAW_OPEN, &calibration::JAW_OPEN) {
            sink(ParamName::MouthOpenY, v);
        }

        if let (Some(smile_left), Some(smile_right), Some(shrug)) = (
            h.calibrated(blendshapes::MOUTH_SMILE_LEFT, &calibration::MOUTH_SMILE),
            h.calibrated(blendshapes::MOUTH_SMILE_RIGHT, &calibration::MOUTH_SMILE),
            h.calibrated(blendshapes::MOUTH_SHRUG_LOWER, &calibration::MOUTH_SHRUG_LOWER),
        ) {
            let smile = smile_left.max(smile_right).clamp(0.0, 1.0);
            sink(ParamName::MouthForm, winner_take_most(smile, shrug));
        }

        if let (Some(left), Some(right)) = (
            h.calibrated(blendshapes::MOUTH_LEFT, &calibration::MOUTH_LATERAL),
            h.calibrated(blendshapes::MOUTH_RIGHT, &calibration::MOUTH_LATERAL),
        ) {
            sink(
                ParamName::MouthX,
                if left > right { -left } else { right },
            );
        }
    }

    fn face_angle(radians: f64, calibration: &Calibration) -> f64 {
        (calibration.apply(radians) * calibration::ANGLE_DEGREES)
            .clamp(-calibration::ANGLE_LIMIT, calibration::ANGLE_LIMIT)
    }

    fn process_face_angles(
        matrix: &TransformMatrix,
        sink: &mut dyn FnMut(ParamName, ParameterType),
    ) {
        let rotation = FaceRotation::from_matrix(matrix);
        sink(
            ParamName::AngleX,
            Self::face_angle(rotation.x, &calibration::FACE_PITCH),
        );
        sink(
            ParamName::AngleY,
            Self::face_angle(rotation.y, &calibration::FACE_YAW),
        );
        sink(
            ParamName::AngleZ,
            Self::face_angle(rotation.z, &calibration::FACE_ROLL),
        );
    }

    fn body_position(translation: f64) -> f64 {
        calibration::BODY_POSITION.apply(translation) * calibration::BODY_SPAN
            + calibration::BODY_OFFSET
    }

    fn process_body_position(
        matrix: &TransformMatrix,
        sink: &mut dyn FnMut(ParamName, ParameterType),
    ) {
        let m = matrix.to_matrix();
        sink(ParamName::BodyAngleX, Self::body_position(m[(0, 3)]));
        sink(ParamName::BodyAngleY, Self::body_position(m[(1, 3)]));
        sink(ParamName::BodyAngleZ, Self::body_position(m[(2, 3)]));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::approx_eq;
    use more_asserts::{assert_ge, assert_gt, assert_le, assert_lt};
    use nalgebra::{Rotation3, Vector3};

    fn run(normalizer: &SignalNormalizer, result: &DetectorResult) -> HashMap<ParamName, f64> {
        let mut written = HashMap::default();
        normalizer.normalize(result, &mut |name, value| {
            written.insert(name, value);
        });
        written
    }

    fn observe(scores: &[(&str, f64)]) -> SignalNormalizer {
        let mut normalizer = SignalNormalizer::default();
        let blendshapes: Vec<Blendshape> = scores
            .iter()
            .map(|(name, score)| Blendshape::new_with(name, *score))
            .collect();
        normalizer.observe(&blendshapes);
        normalizer
    }

    #[test]
    fn scale_maps_endpoints_and_is_monotonic() {
        for (lo, hi) in [(0.04, 0.4), (-0.5, 0.5), (-10.0, 10.0), (0.1, 0.6)] {
            assert_eq!(scale(lo, lo, hi), 0.0);
            assert!(approx_eq!(f64, scale(hi, lo, hi), 1.0, ulps = 2));
            let mut previous = f64::NEG_INFINITY;
            for i in -20..=20 {
                let v = lo + (hi - lo) * i as f64 / 10.0;
                let s = scale(v, lo, hi);
                assert_gt!(s, previous);
                previous = s;
            }
        }
    }

    #[test]
    fn scale_clip_stays_in_bounds() {
        for v in [-1000.0, -1.0, 0.0, 0.2, 0.5, 3.0, 1e9] {
            let s = scale_clip(v, 0.03, 0.5, 0.0, 1.0);
            assert_ge!(s, 0.0);
            assert_le!(s, 1.0);
            let s = scale_clip(v, -0.5, 0.5, -1.0, 1.0);
            assert_ge!(s, -1.0);
            assert_le!(s, 1.0);
        }
    }

    #[test]
    fn scale_clip_invert_flips_then_clips() {
        // At the scale endpoints, I - 0 == I and I - 1 == I - 1.
        assert_eq!(scale_clip_invert(0.04, 0.04, 0.4, 0.0, 1.8, 1.8), 1.8);
        assert!(approx_eq!(
            f64,
            scale_clip_invert(0.4, 0.04, 0.4, 0.0, 1.8, 1.8),
            0.8,
            epsilon = 1e-12
        ));
        for v in [-3.0, 0.0, 0.1, 0.3, 5.0] {
            let expected = (1.8 - scale(v, 0.04, 0.4)).clamp(0.0, 1.8);
            assert_eq!(scale_clip_invert(v, 0.04, 0.4, 0.0, 1.8, 1.8), expected);
            assert_eq!(calibration::EYE_BLINK.apply(v), expected);
        }
    }

    #[test]
    fn calibration_matches_free_functions() {
        for v in [-0.2, 0.0, 0.25, 0.9] {
            assert_eq!(
                calibration::JAW_OPEN.apply(v),
                scale_clip(v, 0.03, 0.5, 0.0, 1.0)
            );
            assert_eq!(calibration::MOUTH_SMILE.apply(v), scale(v, 0.05, 0.85));
            assert_eq!(
                calibration::FACE_YAW.apply(v),
                scale_clip_invert(v, -0.4, 0.4, -1.0, 1.0, 0.5)
            );
        }
    }

    #[test]
    fn history_keeps_latest_and_clears() {
        let mut history = BlendshapeHistory::default();
        assert!(history.is_empty());
        for i in 0..20 {
            history.push(&Blendshape::new_with("jawOpen", i as f64));
        }
        assert_eq!(history.latest("jawOpen"), Some(19.0));
        assert_eq!(history.latest("mouthLeft"), None);
        history.clear();
        assert!(history.is_empty());
        assert_eq!(history.latest("jawOpen"), None);
    }

    #[test]
    fn eyes_open_and_close() {
        let normalizer = observe(&[
            (blendshapes::EYE_BLINK_LEFT, 0.0),
            (blendshapes::EYE_BLINK_RIGHT, 0.9),
        ]);
        let written = run(&normalizer, &DetectorResult::default());
        assert_eq!(written[&ParamName::EyeLOpen], 1.8);
        assert_eq!(written[&ParamName::EyeROpen], 0.0);
    }

    #[test]
    fn smile_beats_shrug() {
        // mouthShrugLower of 0.25 calibrates to 0.3.
        let normalizer = observe(&[
            (blendshapes::MOUTH_SMILE_LEFT, 0.45),
            (blendshapes::MOUTH_SMILE_RIGHT, 0.2),
            (blendshapes::MOUTH_SHRUG_LOWER, 0.25),
        ]);
        let written = run(&normalizer, &DetectorResult::default());
        assert!(approx_eq!(
            f64,
            written[&ParamName::MouthForm],
            0.5,
            epsilon = 1e-9
        ));
    }

    #[test]
    fn shrug_beats_weak_smile() {
        let normalizer = observe(&[
            (blendshapes::MOUTH_SMILE_LEFT, 0.1),
            (blendshapes::MOUTH_SMILE_RIGHT, 0.05),
            (blendshapes::MOUTH_SHRUG_LOWER, 0.9),
        ]);
        let written = run(&normalizer, &DetectorResult::default());
        assert_eq!(written[&ParamName::MouthForm], -1.0);
    }

    #[test]
    fn mouth_lateral_picks_larger_side() {
        let normalizer = observe(&[
            (blendshapes::MOUTH_LEFT, 0.9),
            (blendshapes::MOUTH_RIGHT, 0.1),
        ]);
        let written = run(&normalizer, &DetectorResult::default());
        assert_eq!(written[&ParamName::MouthX], -1.0);

        let normalizer = observe(&[
            (blendshapes::MOUTH_LEFT, 0.1),
            (blendshapes::MOUTH_RIGHT, 0.1),
        ]);
        let written = run(&normalizer, &DetectorResult::default());
        assert_ge!(written[&ParamName::MouthX], 0.0, "ties go right");
    }

    #[test]
    fn gaze_does_not_cancel_out() {
        // Slightly more leftward than rightward: the result is the full
        // leftward magnitude, not the small difference.
        let normalizer = observe(&[
            (blendshapes::EYE_LOOK_IN_LEFT, 0.08),
            (blendshapes::EYE_LOOK_OUT_RIGHT, 0.39),
            (blendshapes::EYE_LOOK_OUT_LEFT, 0.9),
            (blendshapes::EYE_LOOK_IN_RIGHT, 0.08),
            (blendshapes::EYE_LOOK_UP_LEFT, 0.9),
            (blendshapes::EYE_LOOK_UP_RIGHT, 0.9),
            (blendshapes::EYE_LOOK_DOWN_LEFT, 0.1),
            (blendshapes::EYE_LOOK_DOWN_RIGHT, 0.1),
        ]);
        let written = run(&normalizer, &DetectorResult::default());
        assert!(approx_eq!(
            f64,
            written[&ParamName::EyeBallX],
            -0.5,
            epsilon = 1e-9
        ));
        assert!(approx_eq!(
            f64,
            written[&ParamName::EyeBallY],
            1.0,
            epsilon = 1e-9
        ));
    }

    #[test]
    fn brows_move_together() {
        let normalizer = observe(&[(blendshapes::BROW_INNER_UP, 0.75)]);
        let written = run(&normalizer, &DetectorResult::default());
        assert_eq!(written[&ParamName::BrowLY], 0.5);
        assert_eq!(written[&ParamName::BrowRY], 0.5);
    }

    #[test]
    fn incomplete_inputs_write_nothing() {
        let normalizer = observe(&[
            (blendshapes::MOUTH_SMILE_LEFT, 0.45),
            (blendshapes::EYE_LOOK_UP_LEFT, 0.3),
        ]);
        let written = run(&normalizer, &DetectorResult::default());
        assert!(written.is_empty(), "{written:?}");
    }

    #[test]
    fn neutral_pose_is_centered() {
        let normalizer = SignalNormalizer::default();
        let written = run(
            &normalizer,
            &DetectorResult {
                facial_transformation_matrix: Some(TransformMatrix::IDENTITY),
                ..Default::default()
            },
        );
        for name in [
            ParamName::AngleX,
            ParamName::AngleY,
            ParamName::AngleZ,
            ParamName::BodyAngleX,
            ParamName::BodyAngleY,
            ParamName::BodyAngleZ,
        ] {
            assert!(
                approx_eq!(f64, written[&name], 0.0, epsilon = 1e-9),
                "{name} should be centered, got {}",
                written[&name]
            );
        }
        // Without blendshapes, the pose is all that's written.
        assert_eq!(written.len(), 6);
        assert!(!written.contains_key(&ParamName::MouthOpenY));
    }

    #[test]
    fn head_rotation_reaches_its_limit() {
        // A large rotation about the x axis drives ANGLE_Y to the edge of
        // its range; the other angles stay put.
        let rotation = Rotation3::from_axis_angle(&Vector3::x_axis(), 0.6);
        let matrix = TransformMatrix::from(rotation.to_homogeneous());
        let written = run(
            &SignalNormalizer::default(),
            &DetectorResult {
                facial_transformation_matrix: Some(matrix),
                ..Default::default()
            },
        );
        assert!(approx_eq!(
            f64,
            written[&ParamName::AngleY].abs(),
            calibration::ANGLE_LIMIT,
            epsilon = 1e-9
        ));
        assert!(approx_eq!(f64, written[&ParamName::AngleX], 0.0, epsilon = 1e-9));
        assert!(approx_eq!(f64, written[&ParamName::AngleZ], 0.0, epsilon = 1e-9));

        // And a small one lands strictly inside it.
        let rotation = Rotation3::from_axis_angle(&Vector3::z_axis(), 0.1);
        let written = run(
            &SignalNormalizer::default(),
            &DetectorResult {
                facial_transformation_matrix: Some(TransformMatrix::from(
                    rotation.to_homogeneous(),
                )),
                ..Default::default()
            },
        );
        assert_lt!(written[&ParamName::AngleZ].abs(), calibration::ANGLE_LIMIT);
        assert_gt!(written[&ParamName::AngleZ].abs(), 0.0);
    }

    #[test]
    fn body_reads_each_translation_axis() {
        let mut body = TransformMatrix::IDENTITY;
        body.0[0][3] = 5.0;
        body.0[1][3] = -20.0;
        body.0[2][3] = 2.5;
        let written = run(
            &SignalNormalizer::default(),
            &DetectorResult {
                facial_transformation_matrix: Some(TransformMatrix::IDENTITY),
                body_transformation_matrix: Some(body),
                ..Default::default()
            },
        );
        assert_eq!(written[&ParamName::BodyAngleX], 5.0);
        assert_eq!(written[&ParamName::BodyAngleY], -10.0, "clipped");
        assert_eq!(written[&ParamName::BodyAngleZ], 2.5);
    }
}
