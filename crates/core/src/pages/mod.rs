//! Page objects for the campaign site.
//!
//! Each page borrows a session and the suite config, holds its selectors as
//! constants and exposes the handful of operations the scenarios need.

pub mod home;
pub mod login;
pub mod rewards;

pub use home::HomePage;
pub use login::LoginPage;
pub use rewards::RewardsPage;
