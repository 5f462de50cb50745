pub mod alignment;
pub mod notify;
