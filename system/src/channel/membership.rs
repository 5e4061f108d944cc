pub mod event;
pub mod inbound;
pub mod sender;
