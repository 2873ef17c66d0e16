pub mod temp_file;

pub use temp_file::{ensure_writable_dir, TempFileGuard};
