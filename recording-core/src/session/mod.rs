pub mod dispatch;
pub mod engine;
pub mod participants;
