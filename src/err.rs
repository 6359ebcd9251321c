use axum::http::{StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::json;

/// Every handler resolves to a status code plus the `success` envelope,
/// or to an [`Error`] carrying its own status.
pub type Payload<T> = Result<(StatusCode, Json<Success<T>>), Error>;

pub fn proceeds<V>(value: V) -> Payload<V>
where
    V: Serialize,
{
    Ok((StatusCode::OK, Json(Success::of(value))))
}

pub fn creates<V>(value: V) -> Payload<V>
where
    V: Serialize,
{
    Ok((StatusCode::CREATED, Json(Success::of(value))))
}

pub async fn handler404(path: Uri) -> (StatusCode, Json<serde_json::Value>) {
    log::debug!("Unmatched route: {}", path);
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "success": false, "error": "Endpoint not found" })),
    )
}

#[derive(Debug, Clone, Serialize)]
pub struct Success<V> {
    success: bool,
    #[serde(flatten)]
    value: V,
}

impl<V: Serialize> Success<V> {
    pub fn of(value: V) -> Self {
        Self {
            success: true,
            value,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Data<V> {
    pub data: V,
}

#[derive(Debug, Clone, Serialize)]
pub struct Message {
    pub message: String,
}

#[derive(Debug, Clone)]
pub enum Error {
    Validation { message: String },
    Conflict { message: String },
    NotFound { message: String },
    Unauthorized { message: String },
    Internal { kind: &'static str, message: String },
}

impl Error {
    pub fn validation<S: Into<String>>(message: S) -> Error {
        Error::Validation {
            message: message.into(),
        }
    }

    pub fn conflict<S: Into<String>>(message: S) -> Error {
        Error::Conflict {
            message: message.into(),
        }
    }

    pub fn not_found<S: Into<String>>(message: S) -> Error {
        Error::NotFound {
            message: message.into(),
        }
    }

    pub fn unauthorized<S: Into<String>>(message: S) -> Error {
        Error::Unauthorized {
            message: message.into(),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            Error::Validation { message } => (StatusCode::BAD_REQUEST, message),
            Error::Conflict { message } => (StatusCode::CONFLICT, message),
            Error::NotFound { message } => (StatusCode::NOT_FOUND, message),
            Error::Unauthorized { message } => (StatusCode::UNAUTHORIZED, message),
            Error::Internal { kind, message } => {
                // The detail goes to the log, never to the wire.
                log::error!("{}: {}", kind, message);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };
        (status, Json(json!({ "success": false, "error": error }))).into_response()
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Internal { kind, message } => write!(f, "{}: {}", kind, message),
            Error::Validation { message }
            | Error::Conflict { message }
            | Error::NotFound { message }
            | Error::Unauthorized { message } => f.write_str(message),
        }
    }
}

impl std::error::Error for Error {}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        // A unique violation can only come from the email constraint.
        if let sqlx::Error::Database(ref db) = err {
            if db.code().as_deref() == Some("23505") {
                return Error::conflict("Email already registered");
            }
        }
        Self::Internal {
            kind: "DatabaseError",
            message: err.to_string(),
        }
    }
}

impl From<uuid::Error> for Error {
    fn from(_: uuid::Error) -> Self {
        // A malformed identifier is indistinguishable from a missing record.
        Error::not_found("Student not found")
    }
}

impl From<pbkdf2::password_hash::Error> for Error {
    fn from(err: pbkdf2::password_hash::Error) -> Self {
        Self::Internal {
            kind: "PasswordHashError",
            message: err.to_string(),
        }
    }
}
