//! Process-wide message identifier allocation.
//!
//! A `msg_id` approximates `unix_time * 2^32`: the upper 32 bits hold
//! seconds, the lower 32 bits the fraction of the current second. Client ids
//! are divisible by four and strictly increase across every session in the
//! process, so the generator is a single mutex-guarded counter.

use std::sync::{Mutex, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

struct MsgIdState {
    last: i64,
    /// Seconds to add to the local clock to approximate server time.
    time_offset: i32,
}

static STATE: Mutex<MsgIdState> = Mutex::new(MsgIdState { last: 0, time_offset: 0 });

fn unix_now() -> (i64, u32) {
    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
    (now.as_secs() as i64, now.subsec_nanos())
}

/// Allocate the next client `msg_id`.
///
/// When two calls land on the same clock reading the later one gets the
/// previous id plus four.
pub fn next() -> i64 {
    let mut state = STATE.lock().unwrap_or_else(PoisonError::into_inner);
    let (secs, nanos) = unix_now();
    let secs = secs + i64::from(state.time_offset);
    let frac = ((u64::from(nanos) << 32) / 1_000_000_000) as i64;

    let mut id = (secs << 32) | (frac & !3);
    if id <= state.last {
        id = state.last + 4;
    }
    state.last = id;
    id
}

/// Re-base the clock on a `msg_id` produced by the server.
///
/// Called after `bad_msg_notification` 16 or 17. Only the offset moves: if
/// the corrected clock is behind ids already handed out, [`next`] keeps
/// stepping from the last one until the clock catches up.
pub fn correct_clock(server_msg_id: i64) {
    let mut state = STATE.lock().unwrap_or_else(PoisonError::into_inner);
    let (secs, _) = unix_now();
    let offset = (server_msg_id >> 32) - secs;
    state.time_offset = offset as i32;
    log::info!("[tgcore] clock corrected by {offset}s from server msg_id {server_msg_id}");
}

/// Current correction applied to the local clock, in seconds.
pub fn time_offset() -> i32 {
    STATE.lock().unwrap_or_else(PoisonError::into_inner).time_offset
}

/// Server time in seconds, as far as the corrected clock knows.
pub fn server_now() -> i64 {
    unix_now().0 + i64::from(time_offset())
}
