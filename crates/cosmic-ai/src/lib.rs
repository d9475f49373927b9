#![deny(unsafe_code)]

pub mod chat;
pub mod console;
pub mod llm;
pub mod settings;
