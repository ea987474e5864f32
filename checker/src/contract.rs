// contract.rs — Required function contracts and signature matching
//
// Compares the functions found in the source against the contracts declared
// in the configuration. Argument types are matched as a multiset: each
// required type consumes one matching actual argument, regardless of order.
// Extra actual arguments are never an error; a contract is a lower bound.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::signature::FunctionTable;

/// A function the source file is required to define.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequiredFunctionContract {
    pub name: String,
    pub return_type: String,
    #[serde(default)]
    pub arg_types: Vec<String>,
}

/// One way a source file fails a contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SignatureMismatch {
    ReturnType {
        function: String,
        actual: String,
        required: String,
    },
    MissingArgument {
        function: String,
        arg_type: String,
    },
    NotFound {
        function: String,
    },
}

impl fmt::Display for SignatureMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignatureMismatch::ReturnType {
                function,
                actual,
                required,
            } => write!(
                f,
                "Function {}: return type {} != {}",
                function, actual, required
            ),
            SignatureMismatch::MissingArgument { function, arg_type } => write!(
                f,
                "Function {}: missing argument of type {}",
                function, arg_type
            ),
            SignatureMismatch::NotFound { function } => {
                write!(f, "Function {} not found", function)
            }
        }
    }
}

/// Check every contract against the extracted functions.
///
/// Mismatches come out in contract declaration order. A missing function
/// yields only `NotFound`; a return-type mismatch does not stop the
/// argument check.
pub fn check_contracts(
    table: &FunctionTable,
    contracts: &[RequiredFunctionContract],
) -> Vec<SignatureMismatch> {
    let mut mismatches = Vec::new();

    for contract in contracts {
        let Some(actual) = table.lookup(&contract.name) else {
            mismatches.push(SignatureMismatch::NotFound {
                function: contract.name.clone(),
            });
            continue;
        };

        if actual.return_type != contract.return_type {
            mismatches.push(SignatureMismatch::ReturnType {
                function: contract.name.clone(),
                actual: actual.return_type.clone(),
                required: contract.return_type.clone(),
            });
        }

        let mut remaining: Vec<&str> = actual.arg_types.iter().map(String::as_str).collect();
        for required in &contract.arg_types {
            match remaining.iter().position(|t| *t == required.as_str()) {
                Some(idx) => {
                    remaining.swap_remove(idx);
                }
                None => mismatches.push(SignatureMismatch::MissingArgument {
                    function: contract.name.clone(),
                    arg_type: required.clone(),
                }),
            }
        }
    }

    mismatches
}
