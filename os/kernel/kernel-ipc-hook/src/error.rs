use kernel_ipc::{ResultCode, ServiceId, SessionId};

#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InterruptError {
    #[error("no {0} session is registered")]
    ServiceNotRegistered(ServiceId),
    #[error("could not open a handle to {session:?}: {result}")]
    HandleCreation {
        session: SessionId,
        result: ResultCode,
    },
}

/// A side-band request the hook depends on did not go through.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HookError {
    #[error(transparent)]
    Interrupt(#[from] InterruptError),
    #[error("side-band request failed with {0}")]
    Send(ResultCode),
}
