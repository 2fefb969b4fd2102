pub mod attendance;
pub mod courses;
pub mod groups;
pub mod health;
pub mod rooms;
pub mod schedule;
pub mod substitutions;
