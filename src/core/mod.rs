//! 核心编排层：错误与恢复、状态机、会话管理、响应组装

pub mod composer;
pub mod error;
pub mod orchestrator;
pub mod recovery;
pub mod sessions;
pub mod state;

pub use composer::{Payload, ResponseComposer, ResponseEnvelope, NO_ACTIVE_RECIPE};
pub use error::{CapabilityError, ErrorKind, RecoveryAction};
pub use orchestrator::{
    ConversationHistory, ImageInput, Orchestrator, OrchestratorSettings, TurnOutcome, UserRequest,
};
pub use recovery::RecoveryEngine;
pub use sessions::{JsonFileSessionPersistence, SessionManager, SessionPersistence};
pub use state::{OrchestratorState, TurnTrace};
