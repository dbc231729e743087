use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::{StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Json;

use serde::Serialize;

use crate::rules::RuleError;
use crate::store::StoreError;

pub type Payload<T> = Result<(StatusCode, Json<Success<T>>), Error>;

pub fn proceeds<V>(value: V) -> Payload<V>
where
    V: Serialize,
{
    responds(StatusCode::OK, value)
}

pub fn creates<V>(value: V) -> Payload<V>
where
    V: Serialize,
{
    responds(StatusCode::CREATED, value)
}

pub fn responds<V>(status: StatusCode, value: V) -> Payload<V>
where
    V: Serialize,
{
    Ok((status, Json(Success::of(value))))
}

pub async fn handler404(path: Uri) -> Error {
    Error::NotFound {
        message: format!("Invalid path: {}", path),
    }
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
#[serde(tag = "error")]
pub enum Error {
    ValidationError {
        message: String,
    },
    DuplicateKey {
        message: String,
        #[serde(rename = "rollNumber")]
        roll_number: String,
    },
    NotFound {
        message: String,
    },
    InternalError {
        kind: &'static str,
        message: String,
    },
}

impl Error {
    pub fn validation<S: Into<String>>(msg: S) -> Error {
        Error::ValidationError {
            message: msg.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Error::ValidationError { .. } => StatusCode::BAD_REQUEST,
            Error::DuplicateKey { .. } => StatusCode::CONFLICT,
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::InternalError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

impl From<RuleError> for Error {
    fn from(err: RuleError) -> Self {
        let message = err.to_string();
        match err {
            RuleError::Validation(_) => Error::ValidationError { message },
            RuleError::DuplicateKey { roll_number } => Error::DuplicateKey {
                message,
                roll_number,
            },
            RuleError::NotFound { .. } => Error::NotFound { message },
            RuleError::Store(store) => Error::from(store),
        }
    }
}

impl From<StoreError> for Error {
    fn from(err: StoreError) -> Self {
        log::error!("Storage failure: {}", err);
        Self::InternalError {
            kind: "DatabaseError",
            message: err.to_string(),
        }
    }
}

impl From<JsonRejection> for Error {
    fn from(rejection: JsonRejection) -> Self {
        Error::validation(rejection.to_string())
    }
}

impl From<PathRejection> for Error {
    fn from(rejection: PathRejection) -> Self {
        Error::validation(rejection.to_string())
    }
}

impl From<QueryRejection> for Error {
    fn from(rejection: QueryRejection) -> Self {
        Error::validation(rejection.to_string())
    }
}
