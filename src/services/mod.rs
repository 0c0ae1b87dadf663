pub mod assistant;
pub mod chatbot;
pub mod orchestrator;
pub mod session_manager;
