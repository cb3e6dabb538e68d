//! Session hosting: registry, routing and the process runtime.

pub mod registry;
pub mod router;
pub mod runtime;

pub use registry::{SessionHandle, SessionRegistry};
pub use router::{EventRouter, RouterOptions};
pub use runtime::{Host, HostOptions, StopReason};
