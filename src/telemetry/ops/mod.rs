pub mod monitor;
pub mod aggregate;
pub mod dispatch;
pub mod chat;
pub mod feed;
