pub mod openai;
pub mod response_handler;
pub mod stream;
