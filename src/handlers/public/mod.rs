// Public tier: no token required. Token acquisition and company signup.

pub mod login;
pub mod signup;

pub use login::login_post;
pub use signup::{check_subdomain_get, signup_post};
