// column.rs — Per-field column type checks
//
// Validates one whitespace-delimited field against its declared column spec.
// Every applicable check runs; a failed cast does not suppress the decimal
// or length checks. Errors are returned as data, never raised.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Datatype {
    /// An optional sign followed by ASCII digits, of any length.
    Int,
    Float,
    String,
}

impl fmt::Display for Datatype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Datatype::Int => "int",
            Datatype::Float => "float",
            Datatype::String => "string",
        })
    }
}

/// Declared contract for one column of tabular output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    #[serde(default)]
    pub datatype: Option<Datatype>,
    /// Required number of digits after the decimal point (float columns only).
    #[serde(default)]
    pub decimal_positions: Option<usize>,
    /// Maximum field length, counted in characters.
    #[serde(default)]
    pub max_length: Option<usize>,
}

impl ColumnSpec {
    pub fn of(datatype: Datatype) -> Self {
        Self {
            datatype: Some(datatype),
            ..Self::default()
        }
    }

    pub fn with_decimals(mut self, positions: usize) -> Self {
        self.decimal_positions = Some(positions);
        self
    }

    pub fn with_max_length(mut self, max: usize) -> Self {
        self.max_length = Some(max);
        self
    }
}

/// A single failed field check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldError {
    Cast {
        field: String,
        datatype: Datatype,
    },
    MissingDecimalPoint {
        field: String,
    },
    DecimalPositions {
        field: String,
        found: usize,
        expected: usize,
    },
    TooLong {
        field: String,
        length: usize,
        max: usize,
    },
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldError::Cast { field, datatype } => {
                write!(f, "cannot convert '{}' to {}", field, datatype)
            }
            FieldError::MissingDecimalPoint { field } => {
                write!(f, "'{}' has no decimal point", field)
            }
            FieldError::DecimalPositions {
                field,
                found,
                expected,
            } => write!(
                f,
                "'{}' has {} decimal positions, expected {}",
                field, found, expected
            ),
            FieldError::TooLong { field, length, max } => write!(
                f,
                "'{}' is {} characters long, maximum is {}",
                field, length, max
            ),
        }
    }
}

fn is_integer(field: &str) -> bool {
    let digits = field.strip_prefix(['+', '-']).unwrap_or(field);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

/// Run every check `spec` declares against `field`.
pub fn check_field(spec: &ColumnSpec, field: &str) -> Vec<FieldError> {
    let mut errors = Vec::new();

    if let Some(datatype) = spec.datatype {
        let ok = match datatype {
            Datatype::Int => is_integer(field),
            Datatype::Float => field.parse::<f64>().is_ok(),
            Datatype::String => true,
        };
        if !ok {
            errors.push(FieldError::Cast {
                field: field.to_string(),
                datatype,
            });
        }
    }

    if let (Some(expected), Some(Datatype::Float)) = (spec.decimal_positions, spec.datatype) {
        match field.split_once('.') {
            Some((_, fraction)) => {
                let found = fraction.chars().count();
                if found != expected {
                    errors.push(FieldError::DecimalPositions {
                        field: field.to_string(),
                        found,
                        expected,
                    });
                }
            }
            None => errors.push(FieldError::MissingDecimalPoint {
                field: field.to_string(),
            }),
        }
    }

    if let Some(max) = spec.max_length {
        let length = field.chars().count();
        if length > max {
            errors.push(FieldError::TooLong {
                field: field.to_string(),
                length,
                max,
            });
        }
    }

    errors
}
