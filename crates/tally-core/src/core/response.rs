//! Success/failure envelope returned to transports.

use serde::Serialize;

use super::errors::{CoreResult, FailureCode};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Failure {
    pub code: FailureCode,
    pub message: String,
}

/// `{ success, data?, error? }`. Exactly one of `data` and `error` is set.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<Failure>,
}

impl<T> ServiceResponse<T> {
    pub fn from_result(result: CoreResult<T>) -> Self {
        match result {
            Ok(data) => Self {
                success: true,
                data: Some(data),
                error: None,
            },
            Err(err) => Self {
                success: false,
                data: None,
                error: Some(Failure {
                    code: err.code(),
                    message: err.to_string(),
                }),
            },
        }
    }
}
