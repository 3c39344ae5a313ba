pub mod catalog;
pub mod events;
pub mod intake;
pub mod models;
pub mod runs;
