//! Mapping of HTTP outcomes onto the life-cycle error taxonomy

use reqwest::header::HeaderMap;
use stackrun_cloud::{CamError, HttpFailure};

/// Network-level failure: connect, timeout, reset, undecodable body
pub(crate) fn transport(e: reqwest::Error) -> CamError {
    CamError::Transport(e.to_string())
}

pub(crate) fn render_headers(headers: &HeaderMap) -> String {
    headers
        .iter()
        .map(|(name, value)| format!("{}: {}", name, value.to_str().unwrap_or("<binary>")))
        .collect::<Vec<_>>()
        .join("\n")
}

/// One finished HTTP exchange
#[derive(Debug, Clone)]
pub struct Exchange {
    pub method: String,
    pub url: String,
    pub status: u16,
    pub response_headers: String,
    pub response_body: String,
    pub request_body: Option<String>,
}

impl Exchange {
    /// 2xx only; a redirect left unfollowed is a failure
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn failure(&self) -> HttpFailure {
        HttpFailure {
            method: self.method.clone(),
            url: self.url.clone(),
            status: self.status,
            response_headers: self.response_headers.clone(),
            response_body: self.response_body.clone(),
            request_body: self.request_body.clone(),
        }
    }

    pub fn json(&self) -> Result<serde_json::Value, CamError> {
        serde_json::from_str(&self.response_body).map_err(|e| {
            CamError::Api(format!(
                "Invalid JSON from {} {}: {}\n{}",
                self.method, self.url, e, self.response_body
            ))
        })
    }

    /// Succeed with the parsed body, or fail with `on_failure`
    pub fn into_json(
        self,
        on_failure: impl FnOnce(HttpFailure) -> CamError,
    ) -> Result<serde_json::Value, CamError> {
        if !self.is_success() {
            return Err(on_failure(self.failure()));
        }
        self.json()
    }

    pub fn ok_or(self, on_failure: impl FnOnce(HttpFailure) -> CamError) -> Result<(), CamError> {
        if self.is_success() {
            Ok(())
        } else {
            Err(on_failure(self.failure()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exchange(status: u16, body: &str) -> Exchange {
        Exchange {
            method: "GET".to_string(),
            url: "https://cam.test/cam/api/v1/stacks".to_string(),
            status,
            response_headers: String::new(),
            response_body: body.to_string(),
            request_body: None,
        }
    }

    #[test]
    fn test_success_range() {
        assert!(exchange(200, "").is_success());
        assert!(exchange(204, "").is_success());
        assert!(!exchange(300, "").is_success());
        assert!(!exchange(301, "").is_success());
        assert!(!exchange(500, "").is_success());
    }

    #[test]
    fn test_into_json_maps_failure() {
        let err = exchange(500, "boom")
            .into_json(|failure| CamError::Api(failure.to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("status code is 500"));

        let value = exchange(200, r#"{"id": "x"}"#)
            .into_json(|failure| CamError::Api(failure.to_string()))
            .unwrap();
        assert_eq!(value["id"], "x");
    }
}
