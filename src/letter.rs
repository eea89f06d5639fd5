use crate::error::CalcError;
use serde::{Serialize, Serializer};
use serde_json::json;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LetterGrade {
    APlus,
    A,
    AMinus,
    BPlus,
    B,
    BMinus,
    CPlus,
    C,
    CMinus,
    DPlus,
    D,
    DMinus,
    F,
}

/// Lower bound (inclusive) of each letter, best first. Anything below 60 is F.
///
/// | Range  | Grade |
/// |--------|-------|
/// | >= 97  | A+    |
/// | >= 93  | A     |
/// | >= 90  | A-    |
/// | >= 87  | B+    |
/// | >= 83  | B     |
/// | >= 80  | B-    |
/// | >= 77  | C+    |
/// | >= 73  | C     |
/// | >= 70  | C-    |
/// | >= 67  | D+    |
/// | >= 63  | D     |
/// | >= 60  | D-    |
/// | < 60   | F     |
pub const BREAKPOINTS: [(f64, LetterGrade); 12] = [
    (97.0, LetterGrade::APlus),
    (93.0, LetterGrade::A),
    (90.0, LetterGrade::AMinus),
    (87.0, LetterGrade::BPlus),
    (83.0, LetterGrade::B),
    (80.0, LetterGrade::BMinus),
    (77.0, LetterGrade::CPlus),
    (73.0, LetterGrade::C),
    (70.0, LetterGrade::CMinus),
    (67.0, LetterGrade::DPlus),
    (63.0, LetterGrade::D),
    (60.0, LetterGrade::DMinus),
];

impl LetterGrade {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::APlus => "A+",
            Self::A => "A",
            Self::AMinus => "A-",
            Self::BPlus => "B+",
            Self::B => "B",
            Self::BMinus => "B-",
            Self::CPlus => "C+",
            Self::C => "C",
            Self::CMinus => "C-",
            Self::DPlus => "D+",
            Self::D => "D",
            Self::DMinus => "D-",
            Self::F => "F",
        }
    }
}

impl fmt::Display for LetterGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for LetterGrade {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

pub fn letter_grade(average: f64) -> Result<LetterGrade, CalcError> {
    if !average.is_finite() || !(0.0..=100.0).contains(&average) {
        return Err(CalcError::invalid_input(
            "average must be a number in 0..=100",
            json!({ "average": average.to_string() }),
        ));
    }
    Ok(BREAKPOINTS
        .iter()
        .find(|(floor, _)| average >= *floor)
        .map(|(_, letter)| *letter)
        .unwrap_or(LetterGrade::F))
}
