//! Department agents for the ERP assistant.
//!
//! - **Parameter resolution**: binds structured, JSON or free-text input to
//!   an operation's declared parameters, asking the oracle for gaps
//! - **Correction loop**: runs an operation and, on failure, retries exactly
//!   once with oracle-corrected parameters
//! - **Department agent**: retrieves prior interactions, asks the model for a
//!   tool choice and remembers successful replies
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                    DEPARTMENT AGENT                      │
//! ├──────────────────────────────────────────────────────────┤
//! │                                                          │
//! │  query ──► ContextStore ──► LLM ──► tool choice          │
//! │                 ▲                       │                │
//! │                 │                       ▼                │
//! │                 │              CorrectionLoop            │
//! │                 │              ├─ ParameterResolver      │
//! │                 │              └─ Operation (≤ 2 calls)  │
//! │                 │                       │                │
//! │                 └────── store ◄─────────┘                │
//! │                                                          │
//! └──────────────────────────────────────────────────────────┘
//! ```

pub mod correction;
pub mod department;
pub mod dispatch;
pub mod params;

pub use correction::{CorrectionLoop, Outcome, parse_json_object};
pub use department::{AgentReply, AgentSettings, DepartmentAgent, context_path};
pub use dispatch::{ToolChoice, parse_tool_choice};
pub use params::{ParameterResolver, RawInput, ResolveError, bind, coerce};
