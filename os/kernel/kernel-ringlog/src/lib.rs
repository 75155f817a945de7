//! # In-memory kernel log
//!
//! The IPC extension runs inside the kernel with no console and no debug
//! port. Its `log` records are formatted into a fixed-size byte ring that a
//! debugger, or the menu process through a custom syscall, can drain.
//!
//! ## Usage
//! ```rust,no_run
//! use kernel_ringlog::RingLogger;
//! use log::LevelFilter;
//!
//! static LOGGER: RingLogger<4096> = RingLogger::new(LevelFilter::Debug);
//!
//! LOGGER.init().expect("logger initialization");
//! log::info!("IPC hook installed");
//!
//! let mut text = [0u8; 256];
//! let n = LOGGER.drain(&mut text);
//! ```
//!
//! ## Behavior
//! * Each record is written as `"[LEVEL] target: message\n"`.
//! * Formatting happens straight into the ring; nothing is allocated.
//! * When the ring is full the oldest bytes are overwritten and counted in
//!   [`RingLogger::dropped`].

#![cfg_attr(not(any(test, doctest)), no_std)]

mod ring;

use core::fmt::Write;
use kernel_sync::SpinMutex;
use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};
use ring::ByteRing;

pub struct RingLogger<const N: usize> {
    max_level: LevelFilter,
    ring: SpinMutex<ByteRing<N>>,
}

impl<const N: usize> RingLogger<N> {
    #[must_use]
    pub const fn new(max_level: LevelFilter) -> Self {
        Self {
            max_level,
            ring: SpinMutex::new(ByteRing::new()),
        }
    }

    /// Install as the global logger. Call once during extension start-up.
    ///
    /// # Errors
    /// Another logger is already installed.
    pub fn init(&'static self) -> Result<(), SetLoggerError> {
        log::set_logger(self)?;
        log::set_max_level(self.max_level);
        Ok(())
    }

    /// Move the oldest buffered bytes into `out`; returns how many.
    pub fn drain(&self, out: &mut [u8]) -> usize {
        self.ring.with_lock(|r| r.pop_into(out))
    }

    /// Bytes currently buffered.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ring.with_lock(|r| r.len())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bytes overwritten before anyone drained them.
    #[must_use]
    pub fn dropped(&self) -> usize {
        self.ring.with_lock(|r| r.dropped())
    }
}

impl<const N: usize> Log for RingLogger<N> {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.max_level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        self.ring.with_lock(|r| {
            // The ring never rejects bytes.
            let _ = writeln!(
                r,
                "[{}] {}: {}",
                record.level(),
                record.target(),
                record.args()
            );
        });
    }

    fn flush(&self) {}
}
