pub mod token_blacklist;
pub mod user;

pub use token_blacklist::TokenBlacklistRepository;
pub use user::{NewUser, ProfileUpdate, UserRepository};
