mod health_check;
mod login;
mod user;

use serde::Serialize;

pub use health_check::health_check;
pub use login::{google_login, logout, refresh, test_login};
pub use user::{get_user_info, put_user_info};

/// Human-readable outcome, present on every successful response
#[derive(Serialize)]
pub struct Meta {
    pub message: String,
}

/// Response envelope: `{"meta": {"message": ...}, "data": ...}`
#[derive(Serialize)]
pub struct BaseResponse<T: Serialize> {
    pub meta: Meta,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> BaseResponse<T> {
    pub fn new(message: impl Into<String>, data: T) -> Self {
        Self {
            meta: Meta {
                message: message.into(),
            },
            data: Some(data),
        }
    }
}

impl BaseResponse<()> {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            meta: Meta {
                message: message.into(),
            },
            data: None,
        }
    }
}
