//! JSON body extractor that runs `validator` rules
//!
//! Rejections use the common envelope. Validation failures answer 422 and
//! list every message under `fields`, keyed by field path (`email`,
//! `permissions[1]`); checks spanning the whole body are keyed `body`.

use std::collections::BTreeMap;

use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Request};
use axum::http::StatusCode;
use axum::Json;
use serde::de::DeserializeOwned;
use validator::{Validate, ValidationErrors, ValidationErrorsKind};

use super::{api_error, ApiError, ApiResponse};

/// Key of the whole-body checks in the `fields` map
const BODY_KEY: &str = "body";

/// `Json<T>` that only yields values passing `T::validate()`
pub struct ValidatedJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(json_rejection)?;
        value.validate().map_err(|e| invalid_body(&e))?;
        Ok(ValidatedJson(value))
    }
}

/// Keeps axum's status: 415 without a JSON content type, 400 for broken
/// syntax, 422 when the shape does not match the DTO.
fn json_rejection(rejection: JsonRejection) -> ApiError {
    api_error(rejection.status(), rejection.body_text())
}

fn invalid_body(errors: &ValidationErrors) -> ApiError {
    let mut fields = BTreeMap::new();
    collect(errors, "", &mut fields);

    let names: Vec<&str> = fields.keys().map(String::as_str).collect();
    let message = format!("Validation failed: {}", names.join(", "));
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(ApiResponse::invalid(message, fields)),
    )
}

fn collect(errors: &ValidationErrors, prefix: &str, out: &mut BTreeMap<String, Vec<String>>) {
    for (field, kind) in errors.errors() {
        let field: &str = field.as_ref();
        let path = match (prefix, field) {
            ("", "__all__") => BODY_KEY.to_string(),
            (_, "__all__") => prefix.to_string(),
            ("", name) => name.to_string(),
            (_, name) => format!("{}.{}", prefix, name),
        };
        match kind {
            ValidationErrorsKind::Field(list) => {
                let messages = out.entry(path).or_default();
                messages.extend(list.iter().map(|e| match &e.message {
                    Some(message) => message.to_string(),
                    None => format!("failed {} check", e.code),
                }));
            }
            ValidationErrorsKind::Struct(inner) => collect(inner, &path, out),
            ValidationErrorsKind::List(items) => {
                for (index, inner) in items {
                    collect(inner, &format!("{}[{}]", path, index), out);
                }
            }
        }
    }
}
