use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::{error, warn};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Missing form field: {0}")]
    MissingField(&'static str),

    #[error(transparent)]
    Api(#[from] api::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        use api::Error as E;

        match self {
            AppError::MissingField(_) => StatusCode::BAD_REQUEST,
            AppError::Api(err) => match err {
                E::Invalid(_) => StatusCode::BAD_REQUEST,
                E::Unauthenticated | E::InvalidCredentials => StatusCode::UNAUTHORIZED,
                E::Forbidden => StatusCode::FORBIDDEN,
                E::NotFound(_) => StatusCode::NOT_FOUND,
                E::UsernameTaken => StatusCode::CONFLICT,
                E::Store(store::Error::Conflict(_)) => StatusCode::CONFLICT,
                E::Store(store::Error::Missing(_)) => StatusCode::NOT_FOUND,
                E::Store(_) | E::Password(_) | E::Session(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Backend details stay in the log
        let body = if status.is_server_error() {
            error!("Request failed: {}", self);
            "Internal Server Error.".to_string()
        } else {
            warn!("Request rejected ({}): {}", status, self);
            self.to_string()
        };

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (AppError::MissingField("slug"), StatusCode::BAD_REQUEST),
            (api::Error::invalid("bad").into(), StatusCode::BAD_REQUEST),
            (api::Error::Unauthenticated.into(), StatusCode::UNAUTHORIZED),
            (api::Error::Forbidden.into(), StatusCode::FORBIDDEN),
            (api::Error::NotFound("profile").into(), StatusCode::NOT_FOUND),
            (api::Error::UsernameTaken.into(), StatusCode::CONFLICT),
            (
                api::Error::Store(store::Error::Conflict("slug".into())).into(),
                StatusCode::CONFLICT,
            ),
            (
                api::Error::Store(store::Error::Backend("down".into())).into(),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                api::Error::Store(store::Error::Integrity("two rows".into())).into(),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (error, status) in cases {
            assert_eq!(error.status(), status, "{error}");
        }
    }
}
