pub mod keyboard;
pub mod spelling;
