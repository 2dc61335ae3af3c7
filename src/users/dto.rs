use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Partial update; omitted fields are left as they are.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DeletedUser {
    pub deleted: bool,
    pub id: Uuid,
}
