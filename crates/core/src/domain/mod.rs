pub mod conversation;
pub mod tracking;
