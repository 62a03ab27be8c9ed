#![forbid(unsafe_code)]

//! Service layer for the SURGE reflective-chat platform: chat lifecycle,
//! chapter progress, completion aggregation, and the scoring oracle.

pub mod app_services;
pub mod chat_service;
pub mod completion_service;
pub mod error;
pub mod oracle;
pub mod progress_service;

pub use app_services::AppServices;
pub use chat_service::{ChatHistory, ChatService, ChatTurn, FinishOutcome, SsiReport, SsiReportRow};
pub use completion_service::{
    CompletionService, CompletionStatus, ModuleCompletion, ModuleCompletionDetail,
};
pub use error::{AppServicesError, ChatError, CompletionError, OracleError, ProgressError};
pub use oracle::{OpenAiOracle, OracleConfig, OracleReply, ScoringOracle};
pub use progress_service::ProgressService;

pub use surge_core::time::Clock;
