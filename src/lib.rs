pub mod api;
pub mod clock;
pub mod config;
pub mod err;
pub mod models;
pub mod rules;
pub mod store;

pub use rules::Registry;
