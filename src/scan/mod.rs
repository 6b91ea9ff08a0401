pub mod options;
pub mod scanner;
pub mod task;
