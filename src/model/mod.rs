pub mod approval;
pub mod attendance;
pub mod period;
pub mod role;
pub mod shift;
pub mod user;
