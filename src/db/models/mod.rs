//! Domain records: slot arithmetic, subscriptions, users and feed reservations.

pub mod reservation;
pub mod slot;
pub mod subscription;
pub mod user;

pub use self::reservation::*;
pub use self::slot::*;
pub use self::subscription::*;
pub use self::user::*;
