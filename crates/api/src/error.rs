use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use fieldops_core::FieldOpsError;
use tracing::error;

use crate::response::ApiResponse;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("领域错误: {0}")]
    Domain(#[from] FieldOpsError),

    #[error("验证错误: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("请求参数错误: {0}")]
    BadRequest(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message, details) = match &self {
            ApiError::Domain(err) => match err {
                FieldOpsError::JobNotFound { .. } => {
                    (StatusCode::NOT_FOUND, "JOB_NOT_FOUND", err.to_string(), None)
                }
                FieldOpsError::DispatchNotFound { .. } => (
                    StatusCode::NOT_FOUND,
                    "DISPATCH_NOT_FOUND",
                    err.to_string(),
                    None,
                ),
                FieldOpsError::TechnicianNotFound { .. } => (
                    StatusCode::NOT_FOUND,
                    "TECHNICIAN_NOT_FOUND",
                    err.to_string(),
                    None,
                ),
                FieldOpsError::DispatchItemNotFound { .. } => (
                    StatusCode::NOT_FOUND,
                    "ITEM_NOT_FOUND",
                    err.to_string(),
                    None,
                ),
                FieldOpsError::AttachmentNotFound { .. } => (
                    StatusCode::NOT_FOUND,
                    "ATTACHMENT_NOT_FOUND",
                    err.to_string(),
                    None,
                ),
                FieldOpsError::ValidationError(_) => (
                    StatusCode::BAD_REQUEST,
                    "VALIDATION_ERROR",
                    err.to_string(),
                    None,
                ),
                // 状态机违规按验证错误对待，不是服务端故障
                FieldOpsError::InvalidTransition { .. } => (
                    StatusCode::BAD_REQUEST,
                    "INVALID_TRANSITION",
                    err.to_string(),
                    None,
                ),
                FieldOpsError::AssignmentRejected { conflicts } => (
                    StatusCode::BAD_REQUEST,
                    "ASSIGNMENT_CONFLICT",
                    err.to_string(),
                    serde_json::to_value(conflicts)
                        .ok()
                        .map(|c| serde_json::json!({ "conflicts": c })),
                ),
                FieldOpsError::Conflict(_) => {
                    (StatusCode::CONFLICT, "CONFLICT", err.to_string(), None)
                }
                FieldOpsError::AuthRequired => (
                    StatusCode::UNAUTHORIZED,
                    "AUTH_REQUIRED",
                    err.to_string(),
                    None,
                ),
                // 内部错误细节只进日志，不外泄
                _ => {
                    error!("内部错误: {err}");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "INTERNAL_ERROR",
                        "系统内部错误，请稍后重试".to_string(),
                        None,
                    )
                }
            },
            ApiError::Validation(errors) => {
                let detail: Vec<String> = errors
                    .field_errors()
                    .iter()
                    .map(|(field, errs)| {
                        let messages: Vec<String> = errs
                            .iter()
                            .map(|e| {
                                e.message
                                    .as_ref()
                                    .map(|m| m.to_string())
                                    .unwrap_or_else(|| "验证失败".to_string())
                            })
                            .collect();
                        format!("{}: {}", field, messages.join(", "))
                    })
                    .collect();
                (
                    StatusCode::BAD_REQUEST,
                    "VALIDATION_ERROR",
                    format!("请求参数验证失败: {}", detail.join("; ")),
                    None,
                )
            }
            ApiError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                "BAD_REQUEST",
                format!("请求参数错误: {msg}"),
                None,
            ),
        };

        let body = match details {
            Some(details) => ApiResponse::failure_with_details(code, message, details),
            None => ApiResponse::failure(code, message),
        };
        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use fieldops_core::errors::{ConflictDetail, ConflictKind};
    use uuid::Uuid;

    use super::*;

    #[test]
    fn test_not_found_maps_to_404() {
        let error = ApiError::Domain(FieldOpsError::DispatchNotFound { id: Uuid::new_v4() });
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_invalid_transition_maps_to_400() {
        let error = ApiError::Domain(FieldOpsError::invalid_transition("PENDING", "COMPLETED"));
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_assignment_conflict_maps_to_400() {
        let error = ApiError::Domain(FieldOpsError::AssignmentRejected {
            conflicts: vec![ConflictDetail {
                kind: ConflictKind::DoubleBooking,
                technician_id: Some(Uuid::new_v4()),
                source_id: None,
                message: "重叠".to_string(),
            }],
        });
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_concurrency_conflict_maps_to_409() {
        let error = ApiError::Domain(FieldOpsError::conflict("版本冲突"));
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_auth_required_maps_to_401() {
        let error = ApiError::Domain(FieldOpsError::AuthRequired);
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_internal_error_hides_detail() {
        let error = ApiError::Domain(FieldOpsError::internal("secret database detail"));
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
