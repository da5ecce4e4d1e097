use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use fieldops_core::FieldOpsError;
use fieldops_domain::value_objects::ActorContext;
use uuid::Uuid;

use crate::error::ApiError;

/// 从请求头提取操作人身份
///
/// 认证签发在上游网关完成，这里只消费身份头：
/// X-Actor-Id 必填（UUID），X-Actor-Name 可选。
/// 缺失身份直接拒绝，绝不退化为匿名或系统身份。
#[derive(Debug, Clone)]
pub struct Actor(pub ActorContext);

const ACTOR_ID_HEADER: &str = "x-actor-id";
const ACTOR_NAME_HEADER: &str = "x-actor-name";

impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(ACTOR_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or(ApiError::Domain(FieldOpsError::AuthRequired))?;

        let actor_id = Uuid::parse_str(raw)
            .map_err(|_| ApiError::BadRequest(format!("无效的操作人ID: {raw}")))?;

        let display_name = parts
            .headers
            .get(ACTOR_NAME_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(String::from);

        Ok(Actor(ActorContext {
            actor_id,
            display_name,
        }))
    }
}
