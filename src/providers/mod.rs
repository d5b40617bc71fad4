pub mod memory;
pub mod openai;
pub mod retry;
