use serde_json::{Map, Value};
use validator::{Validate, ValidationErrors};

use crate::errors::{AppError, AppResult, ErrorCode};

/// Runs the derived validator and turns field errors into a 400 whose
/// `details` maps each field to its messages.
pub fn validate_request<T: Validate>(value: &T) -> AppResult<()> {
    value.validate().map_err(validation_error)
}

pub fn validation_error(errors: ValidationErrors) -> AppError {
    let mut fields = Map::new();
    let mut summary = Vec::new();

    let mut field_errors: Vec<_> = errors.field_errors().into_iter().collect();
    field_errors.sort_by_key(|(field, _)| *field);

    for (field, errs) in field_errors {
        let messages: Vec<Value> = errs
            .iter()
            .map(|e| {
                let text = e
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| e.code.to_string());
                Value::String(text)
            })
            .collect();
        summary.push(field.to_string());
        fields.insert(field.to_string(), Value::Array(messages));
    }

    AppError::with_details(
        ErrorCode::ValidationError,
        format!("invalid fields: {}", summary.join(", ")),
        Value::Object(fields),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Validate)]
    struct Signup {
        #[validate(email(message = "must be a valid email"))]
        email: String,
        #[validate(length(min = 1))]
        name: String,
    }

    #[test]
    fn valid_request_passes() {
        let req = Signup { email: "a@x.com".into(), name: "Ada".into() };
        assert!(validate_request(&req).is_ok());
    }

    #[test]
    fn field_errors_are_listed() {
        let req = Signup { email: "not-an-email".into(), name: String::new() };
        let err = validate_request(&req).unwrap_err();

        match err {
            AppError::Known { code, message, details } => {
                assert_eq!(code, ErrorCode::ValidationError);
                assert_eq!(message, "invalid fields: email, name");
                let details = details.unwrap();
                assert_eq!(details["email"][0], "must be a valid email");
                assert_eq!(details["name"][0], "length");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
