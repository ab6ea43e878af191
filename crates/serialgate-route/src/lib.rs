//! Session routing and publish dispatch.
//!
//! The [`Router`] accumulates decoded fields per device address and decides
//! when a merged record is flushed. The [`Dispatcher`] fans each flush out to
//! one or more [`PublishSink`]s without ever failing the caller.

pub mod dispatch;
pub mod error;
pub mod router;

pub use dispatch::{DispatchConfig, Dispatcher, JsonLinesSink, LogSink, MemorySink, PublishSink};
pub use error::{Result, RouteError, SinkError};
pub use router::{PublishAction, Router, RouterConfig, COMMAND_TOPIC};
