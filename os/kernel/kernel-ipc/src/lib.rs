//! # Horizon IPC wire format
//!
//! Types shared by every layer of the IPC extension: the command header that
//! frames a synchronous request, the
//! thread-local command buffer that carries it, kernel result codes, and the
//! identities used to talk about sessions and the services behind them.
//!
//! ## Command buffer layout
//!
//! ```text
//! TLS + 0x080 ┌──────────────────────────────────────────────┐
//!             │ word 0: header                               │
//!             │   [31:16] command id                         │
//!             │   [11:6]  normal parameter count             │
//!             │   [5:0]   translate parameter count          │
//!             ├──────────────────────────────────────────────┤
//!             │ words 1..=N: normal parameters               │
//!             ├──────────────────────────────────────────────┤
//!             │ translate descriptors (buffers, handles)     │
//! TLS + 0x180 ├──────────────────────────────────────────────┤
//!             │ static buffer descriptors (receive side)     │
//! TLS + 0x200 └──────────────────────────────────────────────┘
//! ```
//!
//! The buffer is never reallocated; every component overwrites it in place.

#![cfg_attr(not(any(test, doctest)), no_std)]

mod buffer;
mod header;
mod object;
mod result;
mod service;
mod version;

pub use buffer::{
    COMMAND_BUFFER_TLS_OFFSET, COMMAND_BUFFER_WORDS, CommandBuffer, IpcRegion,
    STATIC_BUFFER_WORDS, STATIC_BUFFERS_TLS_OFFSET, StaticBufferTable,
};
pub use header::{IpcHeader, make_header};
pub use object::{Handle, SessionId};
pub use result::{ResultBits, ResultCode};
pub use service::{NameError, SERVICE_NAME_CAPACITY, ServiceId, ServiceName};
pub use version::KernelVersion;
