pub mod cookie;
pub mod password;
pub mod session;
pub mod tokens;

pub use password::{generate_reset_token, hash_password, hash_reset_token, verify_password, PasswordError};
pub use session::{end_session, rotate_session, start_session, IssuedSession, SessionError};
pub use tokens::{Claims, IssuedToken, TokenError, TokenKind, TokenService};
