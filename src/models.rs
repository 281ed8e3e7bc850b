use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::model::permission::PermKey;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LoginReqDto {
    #[schema(example = "adm-es")]
    pub username: String,
    #[schema(example = "1234")]
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SessionInfo {
    pub user_id: i64,
    pub username: String,
    pub is_master: bool,
    pub permissions: Vec<PermKey>,
}

/// Session token body. Carries identity only; permissions are loaded per
/// request.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    pub user_id: i64,
    pub sub: String,
    pub iat: usize,
    pub exp: usize,
    pub jti: String,
}
