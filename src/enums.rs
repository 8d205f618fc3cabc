use std::fmt;

use serde::Serialize;

/// How many series of a study are analysed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum SelectionMode {
    /// Only the series with the most files. Ties go to the lexicographically
    /// smallest series id.
    #[default]
    Single,
    /// Every series independently, in series id order.
    Multi,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    Normal,
    Pathology,
}

impl Label {
    /// Scores at or above 0.5 are labelled as pathology.
    pub fn from_score(score: f32) -> Self {
        if score >= 0.5 {
            Label::Pathology
        } else {
            Label::Normal
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::Normal => f.write_str("normal"),
            Label::Pathology => f.write_str("pathology"),
        }
    }
}
