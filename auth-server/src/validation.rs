//! Registration input rules
//!
//! The rules are data ([`REGISTRATION_RULES`]); [`validate_registration`]
//! walks them and returns either normalized input or every violation found.

use serde_json::{Map, Value};
use shared::client::RegisterRequest;
use shared::error::AppError;
use validator::ValidateEmail;

use crate::db::UserStore;
use crate::error::ServiceResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Name,
    Email,
    Password,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Name => "name",
            Field::Email => "email",
            Field::Password => "password",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Constraint {
    /// Present and not blank. Failing it skips the field's other constraints.
    Required,
    Email,
    MaxLength(usize),
    MinLength(usize),
    /// Equal to `<field>_confirmation`
    Confirmed,
    /// Not already used by another account
    Unique,
}

pub const REGISTRATION_RULES: &[(Field, &[Constraint])] = &[
    (Field::Name, &[Constraint::Required, Constraint::MaxLength(255)]),
    (
        Field::Email,
        &[
            Constraint::Required,
            Constraint::Email,
            Constraint::MaxLength(255),
            Constraint::Unique,
        ],
    ),
    (
        Field::Password,
        &[
            Constraint::Required,
            Constraint::MinLength(6),
            Constraint::Confirmed,
        ],
    ),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Violation {
    pub field: Field,
    pub constraint: Constraint,
}

impl Violation {
    pub fn message(&self) -> String {
        let f = self.field.as_str();
        match self.constraint {
            Constraint::Required => format!("The {f} field is required."),
            Constraint::Email => format!("The {f} must be a valid email address."),
            Constraint::MaxLength(n) => format!("The {f} may not be greater than {n} characters."),
            Constraint::MinLength(n) => format!("The {f} must be at least {n} characters."),
            Constraint::Confirmed => format!("The {f} confirmation does not match."),
            Constraint::Unique => format!("The {f} has already been taken."),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Violations(Vec<Violation>);

impl Violations {
    pub fn single(field: Field, constraint: Constraint) -> Self {
        Self(vec![Violation { field, constraint }])
    }

    pub fn push(&mut self, field: Field, constraint: Constraint) {
        self.0.push(Violation { field, constraint });
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn has(&self, field: Field) -> bool {
        self.0.iter().any(|v| v.field == field)
    }

    /// 422 error with `details.errors = {field: [messages]}`
    pub fn into_error(self) -> AppError {
        let mut errors = Map::new();
        for violation in &self.0 {
            let messages = errors
                .entry(violation.field.as_str())
                .or_insert_with(|| Value::Array(Vec::new()));
            if let Value::Array(list) = messages {
                list.push(Value::String(violation.message()));
            }
        }
        AppError::new(shared::ErrorCode::ValidationFailed).with_detail("errors", errors)
    }
}

/// Registration input that passed every rule
#[derive(Clone)]
pub struct ValidRegistration {
    pub name: String,
    /// Trimmed and lower-cased
    pub email: String,
    pub password: String,
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Blank counts as absent
fn present(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// Check one local constraint against a present value
fn check(constraint: Constraint, value: &str, req: &RegisterRequest) -> bool {
    match constraint {
        Constraint::Required | Constraint::Unique => true,
        Constraint::Email => value.validate_email(),
        Constraint::MaxLength(n) => value.chars().count() <= n,
        Constraint::MinLength(n) => value.chars().count() >= n,
        Constraint::Confirmed => req.password_confirmation.as_deref() == Some(value),
    }
}

/// Apply [`REGISTRATION_RULES`] to a request
///
/// `Unique` hits the store, and only for an email that passed its other rules.
pub async fn validate_registration(
    req: &RegisterRequest,
    store: &dyn UserStore,
) -> ServiceResult<ValidRegistration> {
    let name = present(req.name.as_deref()).map(|n| n.trim().to_string());
    let email = present(req.email.as_deref()).map(normalize_email);
    // Passwords are taken verbatim
    let password = present(req.password.as_deref()).map(str::to_string);

    let mut violations = Violations::default();

    for (field, constraints) in REGISTRATION_RULES {
        let value = match field {
            Field::Name => name.as_deref(),
            Field::Email => email.as_deref(),
            Field::Password => password.as_deref(),
        };

        let Some(value) = value else {
            violations.push(*field, Constraint::Required);
            continue;
        };

        for constraint in constraints.iter() {
            if *constraint == Constraint::Unique {
                if !violations.has(*field) && store.email_exists(value).await? {
                    violations.push(*field, Constraint::Unique);
                }
                continue;
            }
            if !check(*constraint, value, req) {
                violations.push(*field, *constraint);
            }
        }
    }

    match (name, email, password) {
        (Some(name), Some(email), Some(password)) if violations.is_empty() => {
            Ok(ValidRegistration {
                name,
                email,
                password,
            })
        }
        _ => Err(violations.into_error().into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{MemoryUserStore, NewUser};

    fn request(name: &str, email: &str, password: &str, confirmation: &str) -> RegisterRequest {
        RegisterRequest {
            name: Some(name.into()),
            email: Some(email.into()),
            password: Some(password.into()),
            password_confirmation: Some(confirmation.into()),
        }
    }

    async fn violations_of(req: &RegisterRequest, store: &MemoryUserStore) -> Value {
        let err: AppError = validate_registration(req, store).await.err().unwrap().into();
        assert_eq!(err.code, shared::ErrorCode::ValidationFailed);
        assert_eq!(err.message, "The given data was invalid.");
        err.details.unwrap().remove("errors").unwrap()
    }

    #[tokio::test]
    async fn test_valid_input_is_normalized() {
        let store = MemoryUserStore::new();
        let req = request("  Ada ", " Ada@Example.COM ", "secret1", "secret1");

        let valid = validate_registration(&req, &store).await.unwrap();
        assert_eq!(valid.name, "Ada");
        assert_eq!(valid.email, "ada@example.com");
        assert_eq!(valid.password, "secret1");
    }

    #[tokio::test]
    async fn test_missing_fields_are_required() {
        let store = MemoryUserStore::new();
        let req = RegisterRequest {
            name: Some("   ".into()),
            ..RegisterRequest::default()
        };

        let errors = violations_of(&req, &store).await;
        assert_eq!(errors["name"][0], "The name field is required.");
        assert_eq!(errors["email"][0], "The email field is required.");
        assert_eq!(errors["password"][0], "The password field is required.");
        // Required suppresses the field's other rules
        assert_eq!(errors["password"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_bad_email_and_short_password() {
        let store = MemoryUserStore::new();
        let req = request("Ada", "not-an-email", "abc", "xyz");

        let errors = violations_of(&req, &store).await;
        assert_eq!(errors["email"][0], "The email must be a valid email address.");
        assert_eq!(
            errors["password"],
            serde_json::json!([
                "The password must be at least 6 characters.",
                "The password confirmation does not match."
            ])
        );
        assert!(errors.get("name").is_none());
    }

    #[tokio::test]
    async fn test_mismatched_confirmation() {
        let store = MemoryUserStore::new();
        let req = request("Ada", "ada@example.com", "secret1", "secret2");

        let errors = violations_of(&req, &store).await;
        assert_eq!(errors["password"][0], "The password confirmation does not match.");
    }

    #[tokio::test]
    async fn test_length_counts_characters() {
        let store = MemoryUserStore::new();
        // 255 multi-byte characters is within the limit
        let name = "é".repeat(255);
        let req = request(&name, "ada@example.com", "secret1", "secret1");
        assert!(validate_registration(&req, &store).await.is_ok());

        let name = "é".repeat(256);
        let req = request(&name, "ada@example.com", "secret1", "secret1");
        let errors = violations_of(&req, &store).await;
        assert_eq!(
            errors["name"][0],
            "The name may not be greater than 255 characters."
        );
    }

    #[tokio::test]
    async fn test_taken_email_is_case_insensitive() {
        let store = MemoryUserStore::new();
        store
            .create(NewUser::new("Ada".into(), "ada@example.com".into(), "h".into()))
            .await
            .unwrap();

        let req = request("Eve", "ADA@example.com", "secret1", "secret1");
        let errors = violations_of(&req, &store).await;
        assert_eq!(errors["email"][0], "The email has already been taken.");
    }
}
