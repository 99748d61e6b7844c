// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! gm-core: shared data model for the gm agent runtime

pub mod checkpoint;
pub mod clock;
pub mod command;
pub mod event;
pub mod id;
pub mod message;
pub mod permission;
pub mod session;
pub mod state;

pub use checkpoint::{Checkpoint, CheckpointId, FileChange, FileOperation, PatchId};
pub use clock::{Clock, FakeClock, SystemClock};
pub use command::{Command, CommandId, CommandKind};
pub use event::{Actor, ErrorSeverity, Event, EventId, EventPayload, MessageSemantic};
pub use id::ShortId;
pub use message::{estimate_tokens, ContextMessage, Role, ToolCall, Usage};
pub use permission::{canonical_json, PermissionAction, PermissionRule, RequestId, RuleId};
pub use session::SessionId;
pub use state::{
    AgentState, Artifact, ArtifactId, Context, Goal, GoalId, GoalStatus, GoalType, LockType, Mode,
    ResourceLock, Task, TaskId, TaskStatus,
};
