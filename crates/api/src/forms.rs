//! Form results
//!
//! Validation failures are reported as a map of field name to messages.
//! Errors that do not belong to a single field are grouped under
//! [`NON_FIELD_ERRORS`].

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::collections::BTreeMap;

/// Reserved key for form-wide errors
pub const NON_FIELD_ERRORS: &str = "non_field";

/// Field-keyed validation errors
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FormErrors(BTreeMap<String, Vec<String>>);

impl FormErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Errors with a single form-wide message
    pub fn non_field(message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(NON_FIELD_ERRORS, message);
        errors
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn has(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `Ok(())` when no errors were collected
    pub fn into_result(self) -> Result<(), FormErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

#[derive(Debug, Serialize)]
struct FormFailure<'a> {
    result: &'static str,
    errors: &'a FormErrors,
}

impl IntoResponse for FormErrors {
    fn into_response(self) -> Response {
        let body = Json(FormFailure {
            result: "failed",
            errors: &self,
        });
        (StatusCode::BAD_REQUEST, body).into_response()
    }
}

/// Successful form submission
#[derive(Debug, Clone, Serialize)]
pub struct FormSuccess {
    pub result: &'static str,
    pub redirect: bool,
    pub redirect_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
}

impl FormSuccess {
    pub fn redirect(url: impl Into<String>) -> Self {
        Self {
            result: "success",
            redirect: true,
            redirect_url: url.into(),
            access_token: None,
        }
    }

    pub fn with_access_token(mut self, token: String) -> Self {
        self.access_token = Some(token);
        self
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_collects_messages_per_field() {
        let mut errors = FormErrors::new();
        assert!(errors.clone().into_result().is_ok());

        errors.add("subdomain", "This field is required.");
        errors.add("subdomain", "The subdomain already exists");
        errors.add(NON_FIELD_ERRORS, "Login Failed");

        assert_eq!(errors.get("subdomain").map(|m| m.len()), Some(2));
        assert!(errors.has(NON_FIELD_ERRORS));
        assert!(!errors.has("description"));
        assert!(errors.into_result().is_err());
    }

    #[test]
    fn test_failure_json_shape() {
        let errors = FormErrors::non_field("Login Failed");
        let body = serde_json::to_value(FormFailure {
            result: "failed",
            errors: &errors,
        })
        .unwrap();
        assert_eq!(
            body,
            serde_json::json!({"result": "failed", "errors": {"non_field": ["Login Failed"]}})
        );
    }

    #[test]
    fn test_success_json_shape() {
        let body = serde_json::to_value(FormSuccess::redirect("/user_cp")).unwrap();
        assert_eq!(
            body,
            serde_json::json!({"result": "success", "redirect": true, "redirect_url": "/user_cp"})
        );

        let body =
            serde_json::to_value(FormSuccess::redirect("/").with_access_token("t".into())).unwrap();
        assert_eq!(body["access_token"], "t");
    }
}
