pub mod control;
pub mod ws;
