pub mod extraction;
pub mod checkers;
pub mod aggregate;
pub mod progress;
pub mod processor; // Document processing orchestrator
