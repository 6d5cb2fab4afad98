pub mod mongo_config;
pub mod server_config;
