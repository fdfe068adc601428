//! Validated JSON extractor.
//!
//! [`ValidateJson`] deserializes like [`Json`] and then runs the
//! `validator` rules of the body type. Failed rules are reported as 422.

use std::borrow::Cow;
use std::collections::HashMap;

use axum::extract::{FromRequest, Request};
use derive_more::{Deref, DerefMut, From};
use serde::de::DeserializeOwned;
use validator::{Validate, ValidationErrors};

use super::Json;
use crate::handler::{Error, ErrorKind};

/// JSON extractor that validates the body with the `validator` crate.
#[must_use]
#[derive(Debug, Clone, Copy, Default, Deref, DerefMut, From)]
pub struct ValidateJson<T>(pub T);

impl<T> ValidateJson<T> {
    /// Creates a new instance of [`ValidateJson`].
    #[inline]
    pub fn new(inner: T) -> Self {
        Self(inner)
    }

    /// Returns the inner validated value.
    #[inline]
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T, S> FromRequest<S> for ValidateJson<T>
where
    T: DeserializeOwned + Validate + 'static,
    S: Send + Sync,
{
    type Rejection = Error<'static>;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(data) = <Json<T> as FromRequest<S>>::from_request(req, state).await?;
        data.validate()?;
        Ok(Self::new(data))
    }
}

/// Formats length validation errors.
fn format_length_error(
    field: &str,
    params: &HashMap<Cow<'static, str>, serde_json::Value>,
) -> String {
    let min = params.get("min").and_then(serde_json::Value::as_u64);
    let max = params.get("max").and_then(serde_json::Value::as_u64);

    match (min, max) {
        (Some(min), Some(max)) => format!("Field '{field}' must have between {min} and {max} items"),
        (Some(min), None) => format!("Field '{field}' must have at least {min} items"),
        (None, Some(max)) => format!("Field '{field}' must have at most {max} items"),
        (None, None) => format!("Field '{field}' has invalid length"),
    }
}

/// Formats a single validation error.
fn format_validation_error(field: &str, error: &validator::ValidationError) -> String {
    if let Some(custom_message) = &error.message {
        return format!("Field '{field}': {custom_message}");
    }

    match error.code.as_ref() {
        "required" => format!("Field '{field}' is required"),
        "length" => format_length_error(field, &error.params),
        "blank" => format!("Field '{field}' must not be blank"),
        code => format!("Field '{field}' failed validation: {code}"),
    }
}

impl From<ValidationErrors> for Error<'static> {
    fn from(errors: ValidationErrors) -> Self {
        let mut error_messages: Vec<String> = errors
            .field_errors()
            .iter()
            .flat_map(|(field, field_errors)| {
                field_errors
                    .iter()
                    .map(move |error| format_validation_error(field, error))
            })
            .collect();
        error_messages.sort();

        let user_message = match error_messages.as_slice() {
            [] => "Validation failed".to_string(),
            [single_error] => single_error.clone(),
            multiple => multiple.join(". "),
        };

        tracing::warn!(
            errors = ?errors.field_errors(),
            "Request validation failed"
        );

        ErrorKind::UnprocessableEntity
            .with_message(user_message)
            .with_resource("request")
    }
}

impl<T> aide::OperationInput for ValidateJson<T>
where
    T: schemars::JsonSchema,
{
    fn operation_input(
        ctx: &mut aide::generate::GenContext,
        operation: &mut aide::openapi::Operation,
    ) {
        Json::<T>::operation_input(ctx, operation);
    }

    fn inferred_early_responses(
        ctx: &mut aide::generate::GenContext,
        operation: &mut aide::openapi::Operation,
    ) -> Vec<(Option<u16>, aide::openapi::Response)> {
        Json::<T>::inferred_early_responses(ctx, operation)
    }
}

#[cfg(test)]
mod tests {
    use validator::ValidationError;

    use super::*;

    #[test]
    fn validation_errors_are_unprocessable() {
        let mut errors = ValidationErrors::new();
        errors.add("prompt", ValidationError::new("blank"));

        let error = Error::from(errors);
        assert_eq!(error.kind(), ErrorKind::UnprocessableEntity);
        assert_eq!(error.message(), Some("Field 'prompt' must not be blank"));
    }

    #[test]
    fn length_errors_name_bounds() {
        let mut error = ValidationError::new("length");
        error.add_param(Cow::Borrowed("min"), &1);
        assert_eq!(
            format_validation_error("slides", &error),
            "Field 'slides' must have at least 1 items"
        );
    }
}
