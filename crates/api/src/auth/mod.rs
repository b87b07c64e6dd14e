//! Authentication module for devfaq

pub mod jwt;
pub mod middleware;
pub mod password;
pub mod tokens;

pub use jwt::{Claims, JwtError, JwtManager};
pub use middleware::{optional_auth, AuthState, AuthUser};
pub use password::{hash_password, validate_password_strength, verify_password};
pub use tokens::TokenError;
