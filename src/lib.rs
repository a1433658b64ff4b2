pub mod artifact;
pub mod clipboard;
pub mod config;
pub mod editor;
pub mod errors;
pub mod generate;
pub mod history;
pub mod init;
pub mod llm;
pub mod orchestrator;
pub mod phase;
pub mod router;
pub mod util;
