pub mod decoder;
pub mod models;
pub mod settings;
pub mod tracker;
