pub mod data;
pub mod generate;
pub mod host;
pub mod server;
pub mod update;
pub mod validate;
