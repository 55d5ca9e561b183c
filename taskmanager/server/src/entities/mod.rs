//! SeaORM entities for the `users` and `tasks` tables.

pub mod task;
pub mod user;
