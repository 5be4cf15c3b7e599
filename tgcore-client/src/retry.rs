//! Retry policies for flood waits and transient failures.

use std::num::NonZeroU32;
use std::ops::ControlFlow;
use std::time::Duration;

use crate::errors::InvocationError;

/// Controls how a session reacts when an RPC call fails.
pub trait RetryPolicy: Send + Sync + 'static {
    fn should_retry(&self, ctx: &RetryContext) -> ControlFlow<(), Duration>;
}

/// Context passed to [`RetryPolicy::should_retry`] on each failure.
pub struct RetryContext {
    pub fail_count:   NonZeroU32,
    pub slept_so_far: Duration,
    pub error:        InvocationError,
    /// From [`InvokeOptions::retries`].
    pub max_retries:  u32,
    /// From [`InvokeOptions::sleep_threshold`], overriding the policy's own.
    pub sleep_threshold: Option<Duration>,
}

/// Never retry.
pub struct NoRetries;

impl RetryPolicy for NoRetries {
    fn should_retry(&self, _: &RetryContext) -> ControlFlow<(), Duration> {
        ControlFlow::Break(())
    }
}

/// Sleep through short flood waits and retry transient failures.
///
/// * `FLOOD_WAIT_X` / `FLOOD_PREMIUM_WAIT_X` / `SLOWMODE_WAIT_X` with `X` at or
///   below the threshold: sleep `X` seconds, then resend.
/// * transport errors, timeouts and 500-class errors: sleep `retry_delay`,
///   then resend, at most `max_retries` times.
pub struct AutoSleep {
    pub threshold:   Duration,
    pub retry_delay: Duration,
}

impl Default for AutoSleep {
    fn default() -> Self {
        Self {
            threshold:   Duration::from_secs(10),
            retry_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy for AutoSleep {
    fn should_retry(&self, ctx: &RetryContext) -> ControlFlow<(), Duration> {
        if ctx.fail_count.get() > ctx.max_retries {
            return ControlFlow::Break(());
        }
        if let Some(secs) = ctx.error.flood_wait_seconds() {
            let threshold = ctx.sleep_threshold.unwrap_or(self.threshold);
            if secs <= threshold.as_secs() {
                tracing::info!("[tgcore] waiting {secs} s for flood wait");
                return ControlFlow::Continue(Duration::from_secs(secs));
            }
            return ControlFlow::Break(());
        }
        if ctx.error.is_transient() {
            tracing::debug!(
                "[tgcore] retry {}/{} after: {}",
                ctx.fail_count, ctx.max_retries, ctx.error
            );
            return ControlFlow::Continue(self.retry_delay);
        }
        ControlFlow::Break(())
    }
}

// ─── InvokeOptions ────────────────────────────────────────────────────────────

/// Per-call knobs for [`crate::Session::invoke_with`].
#[derive(Clone, Debug)]
pub struct InvokeOptions {
    /// How many times a failed call may be resubmitted.
    pub retries: u32,
    /// How long to wait for each answer.
    pub timeout: Duration,
    /// Whether the request may reach the server twice. When `false`, a call
    /// that was already written is not resent after a transport failure or
    /// a timeout.
    pub replay_safe: bool,
    /// Overrides the policy's flood-wait threshold for this call.
    pub sleep_threshold: Option<Duration>,
}

impl Default for InvokeOptions {
    fn default() -> Self {
        Self {
            retries:         5,
            timeout:         Duration::from_secs(15),
            replay_safe:     true,
            sleep_threshold: None,
        }
    }
}

impl InvokeOptions {
    /// Options for requests with side effects that must not be repeated.
    pub fn non_idempotent() -> Self {
        Self { replay_safe: false, ..Self::default() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{RpcError, TransportError};

    fn ctx(fail_count: u32, error: InvocationError) -> RetryContext {
        RetryContext {
            fail_count: NonZeroU32::new(fail_count).unwrap(),
            slept_so_far: Duration::ZERO,
            error,
            max_retries: 5,
            sleep_threshold: None,
        }
    }

    fn flood(secs: u32) -> InvocationError {
        InvocationError::Rpc(RpcError::from_telegram(420, &format!("FLOOD_WAIT_{secs}")))
    }

    #[test]
    fn short_flood_waits_are_slept_through() {
        let policy = AutoSleep::default();
        assert_eq!(policy.should_retry(&ctx(1, flood(7))), ControlFlow::Continue(Duration::from_secs(7)));
        assert_eq!(policy.should_retry(&ctx(1, flood(11))), ControlFlow::Break(()));
    }

    #[test]
    fn per_call_threshold_wins() {
        let policy = AutoSleep::default();
        let mut c = ctx(1, flood(17));
        c.sleep_threshold = Some(Duration::from_secs(30));
        assert_eq!(policy.should_retry(&c), ControlFlow::Continue(Duration::from_secs(17)));
    }

    #[test]
    fn transient_errors_stop_after_max_retries() {
        let policy = AutoSleep::default();
        let closed = || InvocationError::Transport(TransportError::Closed);
        assert_eq!(policy.should_retry(&ctx(5, closed())), ControlFlow::Continue(policy.retry_delay));
        assert_eq!(policy.should_retry(&ctx(6, closed())), ControlFlow::Break(()));
        assert_eq!(
            policy.should_retry(&ctx(1, InvocationError::Rpc(RpcError::from_telegram(400, "PEER_ID_INVALID")))),
            ControlFlow::Break(())
        );
    }

    #[test]
    fn no_retries_never_retries() {
        assert_eq!(NoRetries.should_retry(&ctx(1, InvocationError::Timeout)), ControlFlow::Break(()));
    }
}
