//! Authentication: local accounts, password hashing and the session accessor.

mod accounts;
mod password;
mod session;

pub use accounts::{normalize_email, sign_in, sign_up, MIN_PASSWORD_LEN};
pub use password::{hash_password, verify_password};
pub use session::{forget, identify, remember, Identity, SESSION_IDENTITY_KEY};
