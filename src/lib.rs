pub mod frontend;
pub mod utils;
