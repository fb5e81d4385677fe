pub mod config;
pub mod error;
pub mod frame;
pub mod layout;
pub mod participant;
pub mod state;
