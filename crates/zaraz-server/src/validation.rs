//! Typed validation of submitted forms.
//!
//! Forms arrive as string maps. A [`FormSchema`] turns one into a typed value
//! or the full list of field problems, so a form can be re-rendered with
//! every error at once.

use std::collections::HashMap;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// Maximum length of a task title, in characters.
pub const MAX_TITLE_LEN: usize = 200;

/// A problem with one form field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Outcome of validating a form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validated<T> {
    Valid(T),
    Invalid(Vec<FieldError>),
}

impl<T> Validated<T> {
    /// Converts into a `Result`, pairing naturally with `?` in handlers.
    pub fn into_result(self) -> Result<T, ValidationErrors> {
        match self {
            Self::Valid(value) => Ok(value),
            Self::Invalid(errors) => Err(ValidationErrors(errors)),
        }
    }
}

/// A form shape.
pub trait FormSchema: Sized {
    fn validate(input: &HashMap<String, String>) -> Validated<Self>;
}

/// Field errors answered as `422 {"errors": [...]}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationErrors(pub Vec<FieldError>);

#[derive(Serialize)]
struct ValidationBody<'a> {
    errors: &'a [FieldError],
}

impl IntoResponse for ValidationErrors {
    fn into_response(self) -> Response {
        let body = Json(ValidationBody { errors: &self.0 });
        (StatusCode::UNPROCESSABLE_ENTITY, body).into_response()
    }
}

fn required<'a>(
    input: &'a HashMap<String, String>,
    field: &str,
    errors: &mut Vec<FieldError>,
) -> Option<&'a str> {
    match input.get(field).map(|v| v.trim()) {
        Some(value) if !value.is_empty() => Some(value),
        _ => {
            errors.push(FieldError::new(field, "is required"));
            None
        }
    }
}

/// `POST /z/{user_id}/actions/add`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTodo {
    pub title: String,
}

impl FormSchema for NewTodo {
    fn validate(input: &HashMap<String, String>) -> Validated<Self> {
        let mut errors = Vec::new();
        let title = required(input, "title", &mut errors);

        if title.is_some_and(|t| t.chars().count() > MAX_TITLE_LEN) {
            errors.push(FieldError::new(
                "title",
                format!("must be at most {MAX_TITLE_LEN} characters"),
            ));
        }

        match title {
            Some(title) if errors.is_empty() => Validated::Valid(Self {
                title: title.to_string(),
            }),
            _ => Validated::Invalid(errors),
        }
    }
}

/// `POST /z/{user_id}/actions/remove`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoveTodo {
    pub id: String,
}

impl FormSchema for RemoveTodo {
    fn validate(input: &HashMap<String, String>) -> Validated<Self> {
        let mut errors = Vec::new();
        match required(input, "id", &mut errors) {
            Some(id) => Validated::Valid(Self { id: id.to_string() }),
            None => Validated::Invalid(errors),
        }
    }
}
