pub mod process;
pub use process::describe_exit;
