//! Parser for prior expressions of the form `name ~ family(p1, p2)`.
//!
//! The accepted grammar is deliberately small: a parameter name, a tilde, and
//! one of the four family names (case-insensitive) applied to exactly two
//! real arguments. Whitespace is insignificant around every token. Anything
//! else is a [`PriorError::ParseError`] naming the offending expression.
use crate::priors::distribution::Prior;
use crate::priors::errors::{PriorError, PriorResult};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// One parsed prior expression: the parameter name and its distribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriorSpec {
    pub name: String,
    pub prior: Prior,
}

impl FromStr for PriorSpec {
    type Err = PriorError;

    /// Parse `name ~ family(p1, p2)`.
    ///
    /// Accepts any of `uniform`, `normal`, `lognormal`, `gamma` in any letter
    /// case. Family parameter constraints are enforced by the corresponding
    /// [`Prior`] constructor.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse_error = |reason: &'static str| PriorError::ParseError {
            expression: s.to_string(),
            reason,
        };

        let (name, rhs) = s.split_once('~').ok_or_else(|| parse_error("missing '~'"))?;
        let name = name.trim();
        if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(parse_error("parameter name must be a non-empty identifier"));
        }

        let rhs = rhs.trim();
        let (family, args) = rhs
            .split_once('(')
            .ok_or_else(|| parse_error("missing '(' after the family name"))?;
        let args = args
            .strip_suffix(')')
            .ok_or_else(|| parse_error("missing closing ')'"))?;
        let parts: Vec<&str> = args.split(',').map(str::trim).collect();
        if parts.len() != 2 {
            return Err(parse_error("expected exactly two parameters"));
        }
        let p1: f64 =
            parts[0].parse().map_err(|_| parse_error("first parameter is not a number"))?;
        let p2: f64 =
            parts[1].parse().map_err(|_| parse_error("second parameter is not a number"))?;

        let prior = match family.trim().to_lowercase().as_str() {
            "uniform" => Prior::uniform(p1, p2)?,
            "normal" => Prior::normal(p1, p2)?,
            "lognormal" => Prior::lognormal(p1, p2)?,
            "gamma" => Prior::gamma(p1, p2)?,
            other => return Err(PriorError::UnknownFamily { family: other.to_string() }),
        };
        Ok(PriorSpec { name: name.to_string(), prior })
    }
}
