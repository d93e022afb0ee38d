use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use delivery_sync_engine::{traits::CourierGatewayError, DispatchError, ReconcileError, TrackingError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Payload deserialization error. {0}")]
    CouldNotDeserializePayload(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("The request conflicts with the current state of the delivery. {0}")]
    Conflict(String),
    #[error("The courier could not handle the request. {0}")]
    CourierError(String),
    #[error("The courier did not respond in time.")]
    CourierTimeout,
    #[error("Requests from {0} are not allowed on this endpoint.")]
    ForbiddenPeer(String),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::CouldNotDeserializePayload(_) => StatusCode::BAD_REQUEST,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::CourierError(_) => StatusCode::BAD_GATEWAY,
            Self::CourierTimeout => StatusCode::GATEWAY_TIMEOUT,
            Self::ForbiddenPeer(_) => StatusCode::FORBIDDEN,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.to_string() }).to_string())
    }
}

impl From<CourierGatewayError> for ServerError {
    fn from(e: CourierGatewayError) -> Self {
        match e {
            CourierGatewayError::Timeout => Self::CourierTimeout,
            e => Self::CourierError(e.to_string()),
        }
    }
}

impl From<ReconcileError> for ServerError {
    fn from(e: ReconcileError) -> Self {
        match e {
            ReconcileError::DatabaseError(e) => Self::BackendError(format!("Database error: {e}")),
            e @ ReconcileError::StaleWrite { .. } => Self::Conflict(e.to_string()),
        }
    }
}

impl From<DispatchError> for ServerError {
    fn from(e: DispatchError) -> Self {
        match e {
            DispatchError::DatabaseError(e) => Self::BackendError(format!("Database error: {e}")),
            DispatchError::CourierError(e) => e.into(),
            DispatchError::OrderNotFound(_) | DispatchError::DeliveryNotFound(_) => Self::NoRecordFound(e.to_string()),
            DispatchError::NotDispatchable(_, _) | DispatchError::StaleWrite(_) => Self::Conflict(e.to_string()),
            DispatchError::SerializationError(s) => Self::InvalidRequestBody(s),
            DispatchError::ReconcileError(e) => e.into(),
        }
    }
}

impl From<TrackingError> for ServerError {
    fn from(e: TrackingError) -> Self {
        match e {
            TrackingError::DatabaseError(e) => Self::BackendError(format!("Database error: {e}")),
            TrackingError::CourierError(e) => e.into(),
            TrackingError::OrderNotFound(_) | TrackingError::DeliveryNotFound(_) => Self::NoRecordFound(e.to_string()),
            TrackingError::NotTrackable(_, _) => Self::Conflict(e.to_string()),
            TrackingError::ReconcileError(e) => e.into(),
        }
    }
}
