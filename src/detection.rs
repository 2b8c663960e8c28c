// Copyright (c) 2023 Mike Tsao. All rights reserved.

//! What the face-landmark detector hands us for each frame, and where those
//! frames come from.

use nalgebra::Matrix4;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};

/// One named blendshape score, roughly 0..=1.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Blendshape {
    /// The detector's name for the facial movement, e.g. `eyeBlinkLeft`.
    pub category_name: String,
    /// How strongly it's activated.
    pub score: f64,
}
impl Blendshape {
    /// Creates a [Blendshape].
    pub fn new_with(category_name: &str, score: f64) -> Self {
        Self {
            category_name: category_name.to_string(),
            score,
        }
    }
}

/// A 4x4 rotation+translation matrix, row-major, as the detector emits it.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransformMatrix(pub [[f64; 4]; 4]);
impl Default for TransformMatrix {
    fn default() -> Self {
        Self::IDENTITY
    }
}
impl TransformMatrix {
    /// No rotation, no translation.
    pub const IDENTITY: Self = Self([
        [1.0, 0.0, 0.0, 0.0],
        [0.0, 1.0, 0.0, 0.0],
        [0.0, 0.0, 1.0, 0.0],
        [0.0, 0.0, 0.0, 1.0],
    ]);

    /// Converts to a [nalgebra] matrix. Indexing is `(row, column)`.
    pub fn to_matrix(&self) -> Matrix4<f64> {
        Matrix4::from_fn(|row, column| self.0[row][column])
    }
}
impl From<Matrix4<f64>> for TransformMatrix {
    fn from(value: Matrix4<f64>) -> Self {
        let mut rows = [[0.0; 4]; 4];
        for (r, row) in rows.iter_mut().enumerate() {
            for (c, cell) in row.iter_mut().enumerate() {
                *cell = value[(r, c)];
            }
        }
        Self(rows)
    }
}

/// The detector's result for one frame. Any part may be missing; missing
/// blendshapes leave their parameters at their previous values.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectorResult {
    /// Blendshape scores for the first detected face.
    #[serde(default)]
    pub blendshapes: Vec<Blendshape>,
    /// The first face's pose.
    #[serde(default)]
    pub facial_transformation_matrix: Option<TransformMatrix>,
    /// The body's pose. When absent, the face's pose stands in for it.
    #[serde(default)]
    pub body_transformation_matrix: Option<TransformMatrix>,
}
impl DetectorResult {
    /// The matrix that body-position parameters should read.
    pub fn body_matrix(&self) -> Option<&TransformMatrix> {
        self.body_transformation_matrix
            .as_ref()
            .or(self.facial_transformation_matrix.as_ref())
    }
}

/// One frame's worth of detector output.
#[derive(Clone, Debug, PartialEq)]
pub enum Frame {
    /// The detector produced a result.
    Detected(DetectorResult),
    /// The detector produced nothing for this frame. It's skipped.
    Missed,
}

/// A supply of frames, such as a live detector or a recording. Any iterator
/// of [Frame]s is one; exhaustion ends the session.
pub trait FrameSource: Send {
    /// Blocks until the next frame is available. `None` means the source is
    /// done.
    fn next_frame(&mut self) -> Option<Frame>;
}
impl<I> FrameSource for I
where
    I: Iterator<Item = Frame> + Send,
{
    fn next_frame(&mut self) -> Option<Frame> {
        self.next()
    }
}

/// Replays recorded detector output, one JSON [DetectorResult] per line. A
/// line reading `null`, or one that doesn't parse, is a missed frame. Blank
/// lines are ignored.
#[derive(Debug)]
pub struct ReplaySource<R: BufRead> {
    reader: R,
    line_number: usize,
}
impl ReplaySource<BufReader<File>> {
    /// Opens a recording on disk.
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let file = File::open(path)
            .map_err(|e| anyhow::format_err!("Couldn't open {path:?}: {}", e))?;
        Ok(Self::new_with(BufReader::new(file)))
    }
}
impl<R: BufRead> ReplaySource<R> {
    /// Replays from any buffered reader, such as stdin.
    pub fn new_with(reader: R) -> Self {
        Self {
            reader,
            line_number: 0,
        }
    }

    fn parse(&self, line: &str) -> Frame {
        match serde_json::from_str::<Option<DetectorResult>>(line) {
            Ok(Some(result)) => Frame::Detected(result),
            Ok(None) => Frame::Missed,
            Err(e) => {
                log::warn!("line {}: unreadable detector result: {e}", self.line_number);
                Frame::Missed
            }
        }
    }
}
impl<R: BufRead> Iterator for ReplaySource<R> {
    type Item = Frame;

    fn next(&mut self) -> Option<Self::Item> {
        let mut line = String::new();
        loop {
            line.clear();
            self.line_number += 1;
            match self.reader.read_line(&mut line) {
                Ok(0) => return None,
                Ok(_) => {
                    let trimmed = line.trim();
                    if !trimmed.is_empty() {
                        return Some(self.parse(trimmed));
                    }
                }
                Err(e) => {
                    log::error!("stopped replay at line {}: {e}", self.line_number);
                    return None;
                }
            }
        }
    }
}
