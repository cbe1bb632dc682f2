//! Cookie session keys.

pub const USER_ID: &str = "user_id";
