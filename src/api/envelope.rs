//! API response envelope
//!
//! Uniform wrapper around every REST reply. Transport failures never produce
//! an envelope; they surface as [`ProviderError`]s of kind `transport`.

use super::error::{ApiError, Phase, ProviderError};

/// One REST reply: exactly one of `data` / `error` is meaningful
#[derive(Debug, Clone)]
pub struct Response<T> {
    pub data: Option<T>,
    pub error: Option<ApiError>,
    pub status: u16,
}

impl<T> Response<T> {
    pub fn ok(status: u16, data: Option<T>) -> Self {
        Self {
            data,
            error: None,
            status,
        }
    }

    pub fn failed(status: u16, error: ApiError) -> Self {
        Self {
            data: None,
            error: Some(error),
            status,
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some() || !(200..300).contains(&self.status)
    }

    pub fn is_not_found(&self) -> bool {
        self.status == 404
    }

    /// Classify a failed envelope; `None` when the call succeeded
    pub fn to_error(&self, phase: Phase) -> Option<ProviderError> {
        if !self.is_error() {
            return None;
        }
        let fallback = ApiError::default();
        let api = self.error.as_ref().unwrap_or(&fallback);
        Some(ProviderError::from_api(phase, self.status, api))
    }

    /// Payload of a successful call, or the classified error
    pub fn into_result(self, phase: Phase) -> Result<Option<T>, ProviderError> {
        match self.to_error(phase) {
            Some(err) => Err(err),
            None => Ok(self.data),
        }
    }

    /// Payload of a successful call that must carry a body
    pub fn into_data(self, phase: Phase) -> Result<T, ProviderError> {
        let status = self.status;
        self.into_result(phase)?.ok_or_else(|| {
            ProviderError::validation(
                phase,
                "Empty response",
                format!("the API answered HTTP {} without a body", status),
            )
        })
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Response<U> {
        Response {
            data: self.data.map(f),
            error: self.error,
            status: self.status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::error::ErrorKind;

    #[test]
    fn test_success_envelope() {
        let resp = Response::ok(200, Some(42));
        assert!(!resp.is_error());
        assert_eq!(resp.into_result(Phase::Read).unwrap(), Some(42));
    }

    #[test]
    fn test_not_found_envelope() {
        let resp: Response<()> = Response::failed(404, ApiError::default());
        assert!(resp.is_error());
        assert!(resp.is_not_found());
        let err = resp.to_error(Phase::Read).unwrap();
        assert_eq!(err.kind, ErrorKind::NotFound);
    }

    #[test]
    fn test_error_status_without_problem_body() {
        let resp: Response<()> = Response {
            data: None,
            error: None,
            status: 502,
        };
        assert!(resp.is_error());
        assert_eq!(resp.to_error(Phase::Create).unwrap().kind, ErrorKind::Server);
    }

    #[test]
    fn test_into_data_requires_body() {
        let resp: Response<u8> = Response::ok(204, None);
        let err = resp.into_data(Phase::Create).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
    }
}
