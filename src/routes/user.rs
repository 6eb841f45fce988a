use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};

use crate::auth::{AuthService, LoginInfo};
use crate::error::AppError;
use crate::routes::BaseResponse;
use crate::store::User;
use crate::validators::is_valid_name;

/// Linked provider, without provider-side identifiers
#[derive(Serialize)]
pub struct IntegrationInfo {
    pub service: String,
}

/// Public view of a user: no sessions, no provider ids
#[derive(Serialize)]
pub struct UserInfo {
    pub id: String,
    pub name: String,
    pub email: String,
    pub created_at: String,
    pub integrations: Vec<IntegrationInfo>,
}

impl From<&User> for UserInfo {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            name: user.name.clone(),
            email: user.email.clone(),
            created_at: user.created_at.to_rfc3339(),
            integrations: user
                .integrations
                .iter()
                .map(|i| IntegrationInfo {
                    service: i.service.clone(),
                })
                .collect(),
        }
    }
}

#[derive(Deserialize)]
pub struct UserInfoRequest {
    pub name: String,
}

/// GET /api/v1/user/info
pub async fn get_user_info(login: web::ReqData<LoginInfo>) -> HttpResponse {
    HttpResponse::Ok().json(BaseResponse::new(
        "User successfully queried",
        UserInfo::from(&login.user),
    ))
}

/// PUT /api/v1/user/info
///
/// # Errors
/// - 400: Empty, too long or suspicious name
pub async fn put_user_info(
    login: web::ReqData<LoginInfo>,
    body: web::Json<UserInfoRequest>,
    auth: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    let name = is_valid_name(&body.name)?;
    let user = auth.rename(&login.user.id, &name).await?;

    tracing::info!(user_id = %user.id, "User info updated");

    Ok(HttpResponse::Ok().json(BaseResponse::new(
        "Info successfully updated.",
        UserInfo::from(&user),
    )))
}
