//! Token issuance and password hashing.

pub mod claims;
pub mod jwt;
pub mod password;

pub use claims::{Claims, Role};
pub use jwt::{IssuedToken, JwtManager};
