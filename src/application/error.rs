use std::error::Error as StdError;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::{
    cache::{ControlError, FillError, LifecycleError, StoreError},
    config::LoadError,
    infra::error::InfraError,
};

#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub status: StatusCode,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, status: StatusCode, error: &dyn StdError) -> Self {
        let mut messages = Vec::new();
        messages.push(error.to_string());
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self {
            source,
            status,
            messages,
        }
    }

    pub fn from_message(
        source: &'static str,
        status: StatusCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source,
            status,
            messages: vec![message.into()],
        }
    }

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

#[derive(Debug)]
pub struct HttpError {
    status: StatusCode,
    public_message: &'static str,
    report: ErrorReport,
}

impl HttpError {
    pub fn new(
        source: &'static str,
        status: StatusCode,
        public_message: &'static str,
        detail: impl Into<String>,
    ) -> Self {
        let report = ErrorReport::from_message(source, status, detail);
        Self {
            status,
            public_message,
            report,
        }
    }

    pub fn from_error(
        source: &'static str,
        status: StatusCode,
        public_message: &'static str,
        error: &dyn StdError,
    ) -> Self {
        let report = ErrorReport::from_error(source, status, error);
        Self {
            status,
            public_message,
            report,
        }
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let mut response = (self.status, self.public_message).into_response();
        self.report.attach(&mut response);
        response
    }
}

impl From<ControlError> for HttpError {
    fn from(error: ControlError) -> Self {
        HttpError::from_error(
            "infra::http::control",
            StatusCode::BAD_REQUEST,
            "Invalid control message",
            &error,
        )
    }
}

impl From<FillError> for HttpError {
    fn from(error: FillError) -> Self {
        let (status, message) = match &error {
            FillError::InvalidUrl { .. } => (StatusCode::BAD_REQUEST, "Invalid url"),
            FillError::Store(_) => (StatusCode::SERVICE_UNAVAILABLE, "Cache store unavailable"),
            FillError::Origin(_) | FillError::Status { .. } => {
                (StatusCode::BAD_GATEWAY, "Origin unavailable")
            }
        };
        HttpError::from_error("infra::http::fill_error", status, message, &error)
    }
}

impl From<StoreError> for HttpError {
    fn from(error: StoreError) -> Self {
        HttpError::from_error(
            "infra::http::store_error",
            StatusCode::SERVICE_UNAVAILABLE,
            "Cache store unavailable",
            &error,
        )
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error(transparent)]
    Config(#[from] LoadError),
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Store(_) | AppError::Lifecycle(LifecycleError::Store(_)) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            AppError::Lifecycle(LifecycleError::InstallFailed { .. }) => StatusCode::BAD_GATEWAY,
            AppError::Lifecycle(LifecycleError::InvalidManifest { .. })
            | AppError::Config(_)
            | AppError::Infra(_)
            | AppError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn presentation_message(&self) -> &'static str {
        match self {
            AppError::Store(_) | AppError::Lifecycle(LifecycleError::Store(_)) => {
                "Cache store unavailable"
            }
            AppError::Lifecycle(LifecycleError::InstallFailed { .. }) => {
                "Core assets could not be fetched"
            }
            AppError::Lifecycle(LifecycleError::InvalidManifest { .. }) | AppError::Config(_) => {
                "Service misconfigured"
            }
            AppError::Infra(InfraError::Telemetry(_)) => "Logging subsystem could not start",
            AppError::Infra(_) => "Service could not start",
            AppError::Unexpected(_) => "Unexpected error occurred",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = self.presentation_message();
        let report = ErrorReport::from_error("application::error::AppError", status, &self);
        let mut response = (status, message).into_response();
        report.attach(&mut response);
        response
    }
}
