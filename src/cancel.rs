/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 *
 * Licensed under the Apache License, Version 2.0 (the "License").
 * You may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

//! Cooperative cancellation, per §5: the executor checks a
//! [`CancelToken`] between paginated calls and between batched
//! sub-operations, never mid-RPC. A deadline is just a cancellation
//! that fires itself once `Instant::now()` passes it, so callers that
//! want a timeout don't need a separate mechanism.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use crate::error::Cancelled;

struct Inner {
    cancelled: AtomicBool,
    deadline: Mutex<Option<Instant>>,
}

/// Cheap to clone; every clone observes the same cancellation state.
#[derive(Clone)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

impl CancelToken {
    pub fn new() -> Self {
        CancelToken {
            inner: Arc::new(Inner {
                cancelled: AtomicBool::new(false),
                deadline: Mutex::new(None),
            }),
        }
    }

    /// A token that's never cancelled and has no deadline, for callers
    /// (tests, one-shot CLI invocations) that don't need cooperative
    /// cancellation.
    pub fn noop() -> Self {
        Self::new()
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        let token = Self::new();
        *token.inner.deadline.lock().unwrap() = Some(deadline);
        token
    }

    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        if self.inner.cancelled.load(Ordering::SeqCst) {
            return true;
        }
        matches!(*self.inner.deadline.lock().unwrap(), Some(deadline) if Instant::now() >= deadline)
    }

    /// The point the executor calls between paginated/batched
    /// sub-operations; turns "cancelled" into the `Cancelled` error so
    /// callers can just `?` it.
    pub fn check(&self) -> Result<(), Cancelled> {
        if self.is_cancelled() {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn fresh_token_is_not_cancelled() {
        let token = CancelToken::new();
        assert!(token.check().is_ok());
    }

    #[test]
    fn explicit_cancel_is_observed_by_clones() {
        let token = CancelToken::new();
        let clone = token.clone();
        clone.cancel();
        assert!(token.check().is_err());
    }

    #[test]
    fn past_deadline_is_treated_as_cancelled() {
        let token = CancelToken::with_deadline(Instant::now() - Duration::from_secs(1));
        assert!(token.check().is_err());
    }

    #[test]
    fn future_deadline_does_not_cancel() {
        let token = CancelToken::with_deadline(Instant::now() + Duration::from_secs(60));
        assert!(token.check().is_ok());
    }
}
