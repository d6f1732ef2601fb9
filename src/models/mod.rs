pub mod token_blacklist;
pub mod user;

pub use token_blacklist::BlacklistedToken;
pub use user::{User, normalize_email};
