pub mod backends;
pub mod chat;
pub mod report;
