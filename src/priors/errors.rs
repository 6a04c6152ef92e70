//! priors::errors — unified error type for prior parsing and binding.

/// Crate-wide result alias for prior operations.
pub type PriorResult<T> = Result<T, PriorError>;

/// `PriorError` — parse, parameter, and binding failures for prior sets.
///
/// Covers malformed `name ~ family(p1, p2)` expressions, invalid family
/// parameters, and name-resolution failures against the model's parameter
/// spaces. `Statrs` wraps distribution-construction errors surfaced by the
/// underlying `statrs` distributions.
#[derive(Debug, Clone, PartialEq)]
pub enum PriorError {
    // ---- Parsing ----
    ParseError { expression: String, reason: &'static str },
    UnknownFamily { family: String },

    // ---- Parameters ----
    InvalidParam { family: &'static str, param: &'static str, value: f64, reason: &'static str },

    // ---- Set construction ----
    EmptySet,
    DuplicateParameter { name: String },

    // ---- Binding ----
    UnknownParameter { name: String },
    MixedTarget { gdata_name: String, ldata_name: String },

    // ---- Statrs passthrough ----
    Statrs { message: String },
}

impl std::error::Error for PriorError {}

impl std::fmt::Display for PriorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            // ---- Parsing ----
            PriorError::ParseError { expression, reason } => {
                write!(f, "Cannot parse prior '{expression}': {reason}")
            }
            PriorError::UnknownFamily { family } => {
                write!(
                    f,
                    "Unknown prior family '{family}': expected one of \
                     uniform, normal, lognormal, gamma"
                )
            }

            // ---- Parameters ----
            PriorError::InvalidParam { family, param, value, reason } => {
                write!(f, "Invalid {family} parameter {param} = {value}: {reason}")
            }

            // ---- Set construction ----
            PriorError::EmptySet => {
                write!(f, "A prior set must contain at least one prior")
            }
            PriorError::DuplicateParameter { name } => {
                write!(f, "Parameter '{name}' appears more than once in the prior set")
            }

            // ---- Binding ----
            PriorError::UnknownParameter { name } => {
                write!(f, "Parameter '{name}' matches neither a gdata name nor an ldata row name")
            }
            PriorError::MixedTarget { gdata_name, ldata_name } => {
                write!(
                    f,
                    "Priors mix parameter spaces: '{gdata_name}' targets gdata while \
                     '{ldata_name}' targets ldata"
                )
            }

            // ---- Statrs passthrough ----
            PriorError::Statrs { message } => {
                write!(f, "Distribution error: {message}")
            }
        }
    }
}
