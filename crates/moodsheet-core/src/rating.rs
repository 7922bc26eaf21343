//! Ratings and their encoded cell expressions.
//!
//! Each rating is stored in the tracker table as a Notion equation whose
//! expression draws a colored square. The mapping is fixed and bijective.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::RatingError;

/// How a day went.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rating {
    Good,
    Ok,
    Bad,
}

const GOOD_EXPR: &str = "\\color{2E6F40}\\rule{10px}{10px}";
const OK_EXPR: &str = "\\color{FF8C00}\\rule{10px}{10px}";
const BAD_EXPR: &str = "\\color{9B111E}\\rule{10px}{10px}";

impl Rating {
    /// All ratings, in display order.
    pub const ALL: [Rating; 3] = [Rating::Good, Rating::Ok, Rating::Bad];

    /// The equation expression written into a table cell.
    pub fn expression(self) -> &'static str {
        match self {
            Rating::Good => GOOD_EXPR,
            Rating::Ok => OK_EXPR,
            Rating::Bad => BAD_EXPR,
        }
    }

    /// Inverse of [`Rating::expression`].
    pub fn from_expression(expression: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.expression() == expression)
    }

    /// Lowercase wire name (`good`, `ok`, `bad`).
    pub fn as_str(self) -> &'static str {
        match self {
            Rating::Good => "good",
            Rating::Ok => "ok",
            Rating::Bad => "bad",
        }
    }

    pub fn emoji(self) -> &'static str {
        match self {
            Rating::Good => "😊",
            Rating::Ok => "😐",
            Rating::Bad => "😞",
        }
    }

    /// Button label, e.g. `😊 Good`.
    pub fn button_label(self) -> &'static str {
        match self {
            Rating::Good => "😊 Good",
            Rating::Ok => "😐 OK",
            Rating::Bad => "😞 Bad",
        }
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Rating {
    type Err = RatingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "good" => Ok(Rating::Good),
            "ok" => Ok(Rating::Ok),
            "bad" => Ok(Rating::Bad),
            _ => Err(RatingError {
                input: s.to_string(),
            }),
        }
    }
}

/// Decoded content of a filled cell.
///
/// An unfilled cell is represented by the absence of a `DayStatus`
/// (`Option::None`), never by [`DayStatus::Unknown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DayStatus {
    Rated(Rating),
    /// The cell has content that is not one of the known expressions.
    Unknown,
}

impl DayStatus {
    /// Decode an equation expression.
    pub fn from_expression(expression: &str) -> Self {
        Rating::from_expression(expression)
            .map(DayStatus::Rated)
            .unwrap_or(DayStatus::Unknown)
    }

    pub fn rating(self) -> Option<Rating> {
        match self {
            DayStatus::Rated(r) => Some(r),
            DayStatus::Unknown => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expression_round_trip() {
        for rating in Rating::ALL {
            assert_eq!(Rating::from_expression(rating.expression()), Some(rating));
            assert_eq!(
                DayStatus::from_expression(rating.expression()),
                DayStatus::Rated(rating)
            );
        }
    }

    #[test]
    fn test_unknown_expression() {
        assert_eq!(Rating::from_expression("\\color{000000}"), None);
        assert_eq!(DayStatus::from_expression("x^2"), DayStatus::Unknown);
        assert_eq!(DayStatus::Unknown.rating(), None);
    }

    #[test]
    fn test_expressions_are_distinct() {
        assert_ne!(GOOD_EXPR, OK_EXPR);
        assert_ne!(OK_EXPR, BAD_EXPR);
        assert_ne!(GOOD_EXPR, BAD_EXPR);
    }

    #[test]
    fn test_parse() {
        assert_eq!("good".parse::<Rating>().unwrap(), Rating::Good);
        assert_eq!(" OK ".parse::<Rating>().unwrap(), Rating::Ok);
        assert_eq!("Bad".parse::<Rating>().unwrap(), Rating::Bad);

        let err = "meh".parse::<Rating>().unwrap_err();
        assert_eq!(err.input, "meh");
        assert_eq!(err.to_string(), "Invalid rating. Must be: good, ok, or bad");
    }

    #[test]
    fn test_display_and_serde() {
        assert_eq!(Rating::Ok.to_string(), "ok");
        assert_eq!(serde_json::to_string(&Rating::Bad).unwrap(), "\"bad\"");
        let parsed: Rating = serde_json::from_str("\"good\"").unwrap();
        assert_eq!(parsed, Rating::Good);
    }
}
