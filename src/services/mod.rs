pub mod auth;
pub mod email;
pub mod jwt;
pub mod password_reset;
pub mod signer;

pub use auth::AuthService;
pub use email::{EmailService, Mailer, OutgoingEmail};
pub use jwt::{JwtService, TokenPair};
pub use password_reset::{AccountStore, PasswordResetService, ResetSettings};
pub use signer::TokenSigner;
