pub mod channel_transport;
pub mod event_handler;
