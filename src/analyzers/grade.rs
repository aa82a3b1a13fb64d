use serde::{Deserialize, Serialize};
use std::fmt;

/// Letter bucket for a percentile rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Grade {
    A,
    B,
    C,
    D,
    F,
}

impl Grade {
    pub const ALL: [Grade; 5] = [Grade::A, Grade::B, Grade::C, Grade::D, Grade::F];

    pub fn as_str(&self) -> &'static str {
        match self {
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
            Grade::D => "D",
            Grade::F => "F",
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Converts a percentile rank (0–100) into a letter grade.
///
/// | Range  | Grade |
/// |--------|-------|
/// | >= 90  | A     |
/// | >= 75  | B     |
/// | >= 50  | C     |
/// | >= 25  | D     |
/// | < 25   | F     |
pub fn grade(p: f64) -> Grade {
    match p {
        p if p >= 90.0 => Grade::A,
        p if p >= 75.0 => Grade::B,
        p if p >= 50.0 => Grade::C,
        p if p >= 25.0 => Grade::D,
        _ => Grade::F,
    }
}
