pub mod models;
pub mod registry;
pub mod session;
pub mod settings;
