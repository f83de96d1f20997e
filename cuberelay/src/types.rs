//! Cube face identifiers shared by the relay and the upload client.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One face of the cube, named by its canonical orientation letter.
///
/// The declaration order is the canonical upload order (`U, R, F, D, L, B`),
/// so `Ord` and [`Face::ALL`] agree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Face {
    U,
    R,
    F,
    D,
    L,
    B,
}

impl Face {
    /// Every face in canonical order.
    pub const ALL: [Face; 6] = [Face::U, Face::R, Face::F, Face::D, Face::L, Face::B];

    /// The multipart field name used for this face.
    pub fn code(self) -> &'static str {
        match self {
            Face::U => "U",
            Face::R => "R",
            Face::F => "F",
            Face::D => "D",
            Face::L => "L",
            Face::B => "B",
        }
    }

    /// Human readable label, including the expected center colour.
    pub fn label(self) -> &'static str {
        match self {
            Face::U => "Up (White)",
            Face::R => "Right (Red)",
            Face::F => "Front (Green)",
            Face::D => "Down (Yellow)",
            Face::L => "Left (Orange)",
            Face::B => "Back (Blue)",
        }
    }
}

impl fmt::Display for Face {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown face code {0:?}, expected one of U, R, F, D, L, B")]
pub struct UnknownFace(pub String);

impl FromStr for Face {
    type Err = UnknownFace;

    /// Face codes are matched exactly; `u` is not a face.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "U" => Ok(Face::U),
            "R" => Ok(Face::R),
            "F" => Ok(Face::F),
            "D" => Ok(Face::D),
            "L" => Ok(Face::L),
            "B" => Ok(Face::B),
            other => Err(UnknownFace(other.to_string())),
        }
    }
}

/// Join faces as `"U, R, B"` for user facing messages.
pub fn join_faces(faces: &[Face]) -> String {
    faces.iter().map(|f| f.code()).collect::<Vec<_>>().join(", ")
}
