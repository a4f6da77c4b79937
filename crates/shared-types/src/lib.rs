pub mod error;
pub mod feature_flags;
pub mod user;
pub mod weather;

pub use error::*;
pub use feature_flags::*;
pub use user::*;
pub use weather::*;
