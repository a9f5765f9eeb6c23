use serde::{Deserialize, Serialize};

/// Side of an over/under prop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Over,
    Under,
}

impl Side {
    /// Get the opposite side
    pub fn opposite(&self) -> Self {
        match self {
            Side::Over => Side::Under,
            Side::Under => Side::Over,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Over => "OVER",
            Side::Under => "UNDER",
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Final decision category for a prediction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Recommendation {
    Over,
    Under,
    Pass,
    NoLine,
    Skip,
    Error,
}

impl Recommendation {
    pub fn from_side(side: Side) -> Self {
        match side {
            Side::Over => Recommendation::Over,
            Side::Under => Recommendation::Under,
        }
    }

    /// The bet side, if this is an actionable recommendation.
    pub fn side(&self) -> Option<Side> {
        match self {
            Recommendation::Over => Some(Side::Over),
            Recommendation::Under => Some(Side::Under),
            _ => None,
        }
    }

    pub fn is_actionable(&self) -> bool {
        self.side().is_some()
    }

    /// SKIP and ERROR end the pipeline without a usable score.
    pub fn is_terminal_failure(&self) -> bool {
        matches!(self, Recommendation::Skip | Recommendation::Error)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Recommendation::Over => "OVER",
            Recommendation::Under => "UNDER",
            Recommendation::Pass => "PASS",
            Recommendation::NoLine => "NO_LINE",
            Recommendation::Skip => "SKIP",
            Recommendation::Error => "ERROR",
        }
    }
}

impl std::fmt::Display for Recommendation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_as_upper_snake_case() {
        let json = serde_json::to_string(&Recommendation::NoLine).unwrap();
        assert_eq!(json, "\"NO_LINE\"");
        let parsed: Recommendation = serde_json::from_str("\"OVER\"").unwrap();
        assert_eq!(parsed, Recommendation::Over);
    }

    #[test]
    fn only_over_and_under_have_sides() {
        assert_eq!(Recommendation::Over.side(), Some(Side::Over));
        assert_eq!(Recommendation::Under.side(), Some(Side::Under));
        for rec in [
            Recommendation::Pass,
            Recommendation::NoLine,
            Recommendation::Skip,
            Recommendation::Error,
        ] {
            assert!(rec.side().is_none());
        }
        assert_eq!(Side::Over.opposite(), Side::Under);
    }
}
