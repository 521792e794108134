pub mod credits;
pub mod events;
pub mod jobs;
pub mod models;
pub mod providers;
