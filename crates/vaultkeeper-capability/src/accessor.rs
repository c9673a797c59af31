//! Callback-based, auto-zeroing, post-use-revoked secret reader.
//!
//! Internally a tagged enum (`Armed` / `Consumed`) swapped atomically at
//! entry into `read`: the state transitions to `Consumed` before the
//! callback even runs, so a callback that panics still leaves the
//! accessor unusable, and the buffer it was given is zeroed on the way
//! out regardless of how the callback exits.

use std::sync::Mutex;

use zeroize::Zeroize;

use vaultkeeper_core::error::{Error, Result};

enum State {
    Armed(Vec<u8>),
    Consumed,
}

/// A single-use reader over one secret's plaintext bytes.
pub struct SingleUseAccessor {
    state: Mutex<State>,
}

struct ZeroizingBuffer(Vec<u8>);

impl Drop for ZeroizingBuffer {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl SingleUseAccessor {
    pub fn new(secret: &str) -> Self {
        SingleUseAccessor {
            state: Mutex::new(State::Armed(secret.as_bytes().to_vec())),
        }
    }

    /// Invokes `f` with the secret's bytes exactly once. The buffer is
    /// zeroed before this call returns, whether `f` returns normally or
    /// panics. Any call after the first — successful or not — fails
    /// `AlreadyConsumed`.
    pub fn read<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&[u8]) -> T,
    {
        let taken = {
            let mut guard = self.state.lock().expect("accessor mutex poisoned");
            std::mem::replace(&mut *guard, State::Consumed)
        };

        match taken {
            State::Armed(buffer) => {
                let zbuf = ZeroizingBuffer(buffer);
                Ok(f(&zbuf.0))
            }
            State::Consumed => Err(Error::AlreadyConsumed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::{catch_unwind, AssertUnwindSafe};

    #[test]
    fn first_read_succeeds_second_fails() {
        let accessor = SingleUseAccessor::new("sk-live-abc");
        let value = accessor
            .read(|bytes| String::from_utf8(bytes.to_vec()).unwrap())
            .unwrap();
        assert_eq!(value, "sk-live-abc");

        let err = accessor.read(|_| ()).unwrap_err();
        assert!(matches!(err, Error::AlreadyConsumed));
    }

    #[test]
    fn buffer_is_zeroed_after_read() {
        let accessor = SingleUseAccessor::new("sk-live-abc");
        let mut observed = Vec::new();
        accessor
            .read(|bytes| {
                observed = bytes.to_vec();
            })
            .unwrap();
        assert_eq!(observed, b"sk-live-abc");
        // The accessor's internal buffer (not our copy) must be consumed;
        // a second read must fail regardless of what we did with `observed`.
        assert!(accessor.read(|_| ()).is_err());
    }

    #[test]
    fn panicking_callback_still_consumes_and_fails_afterward() {
        let accessor = SingleUseAccessor::new("sk-live-abc");
        let result = catch_unwind(AssertUnwindSafe(|| {
            accessor.read(|_| panic!("boom")).ok();
        }));
        assert!(result.is_err());

        let err = accessor.read(|_| ()).unwrap_err();
        assert!(matches!(err, Error::AlreadyConsumed));
    }
}
