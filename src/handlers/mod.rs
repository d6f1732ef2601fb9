pub mod health;
pub mod login;
pub mod logout;
pub mod password_reset;
pub mod token;
pub mod users;

pub use health::health_check;
pub use login::{custom_login, login};
pub use logout::logout;
pub use password_reset::{confirm_password_reset, confirm_reset, request_password_reset};
pub use token::refresh_token;
pub use users::{
    create_user, deactivate_account, delete_user, get_user, list_users, partial_update_user,
    update_user,
};
