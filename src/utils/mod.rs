pub mod clock;
pub mod roster_cache;
pub mod timeout;
