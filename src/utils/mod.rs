pub mod format;
pub mod time;
