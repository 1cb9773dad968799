pub mod file_utils;
pub mod log_setup;
pub mod normalize_string;
