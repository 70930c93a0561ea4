//! Identifier newtypes.
//!
//! Every identifier the supervision runtime passes around is a UUID wrapped
//! in its own type so a chain id can never be handed to an API expecting a
//! supervisor id. Remote ids are issued by the backend; `ExecutionId` is
//! minted locally once per intercepted call.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new, random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

uuid_id!(
    /// One agent run. All registrations and review requests hang off a run.
    RunId
);

uuid_id!(
    /// One intercepted call (the "tool request group" on the backend).
    ///
    /// Every supervisor consulted for the same call sees the same id.
    ExecutionId
);

uuid_id!(
    /// A tool registered with the backend.
    ToolId
);

uuid_id!(
    /// A supervisor registered with the backend.
    SupervisorId
);

uuid_id!(
    /// One chain assigned to a tool within a run.
    ChainId
);

uuid_id!(
    /// A supervision request created on the backend.
    RequestId
);

uuid_id!(
    /// A supervision result created on the backend.
    ResultId
);
