mod thread;

pub use thread::{thread_boot, ThreadPriority};
