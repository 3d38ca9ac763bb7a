pub mod magnitude;
pub mod time;
