//! The long-lived connection to one DC.
//!
//! A [`Session`] keeps exactly one obfuscated connection open at a time and
//! runs four tasks on it:
//! * the receive pump, which only reads frames off the socket;
//! * the net worker, which decrypts, acks and routes every message;
//! * the pinger, which keeps the server from dropping an idle link;
//! * the salt refresher, which fetches the next server salt before the
//!   current one expires.
//!
//! A supervisor task replaces the connection whenever it breaks. Callers that
//! were waiting on the old connection are woken and resubmit on the new one
//! according to the [`RetryPolicy`](crate::RetryPolicy).
//!
//! ```text
//! Idle → Connecting → Handshaking → Running ⇄ Reconnecting
//!                                      ↓
//!                                   Stopped
//! ```

use std::collections::HashMap;
use std::fmt;
use std::io;
use std::num::NonZeroU32;
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tgcore_crypto::AuthKey;
use tgcore_mtproto::{
    BadMsgCode, EncryptedSession, Frame, Inbound, Packed, RpcAnswer, SeenMsgIds, ServerSalt,
    ServiceMessage, msg_id, service,
};
use tgcore_tl::{Deserializable, LAYER, RemoteCall, Serializable, enums, functions, types};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{Instant, sleep, timeout, timeout_at};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::dc::DcAddress;
use crate::errors::{InvocationError, RpcError, StopReason, TransportError};
use crate::retry::{InvokeOptions, RetryContext};
use crate::transport::{self, Connector, FrameReader, TcpConnector};
use crate::{RawUpdate, SessionConfig, UpdateStream};

/// Upper bound for the delay between reconnect attempts.
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// How often one request may be resent for salt or msg_id corrections
/// before the failure is handed to the caller.
const MAX_CORRECTIONS: u32 = 4;

// ─── State ────────────────────────────────────────────────────────────────────

/// Lifecycle of a [`Session`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    /// Connected; ping, salt and layer handshake in progress.
    Handshaking,
    Running,
    /// The connection broke and is being replaced.
    Reconnecting,
    Stopped(StopReason),
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle         => f.write_str("idle"),
            Self::Connecting   => f.write_str("connecting"),
            Self::Handshaking  => f.write_str("handshaking"),
            Self::Running      => f.write_str("running"),
            Self::Reconnecting => f.write_str("reconnecting"),
            Self::Stopped(r)   => write!(f, "stopped ({r:?})"),
        }
    }
}

// ─── Dispatcher ───────────────────────────────────────────────────────────────

/// What the net worker hands to a waiting caller.
#[derive(Debug)]
enum Reply {
    Answer(Vec<u8>),
    Rpc(types::RpcError),
    /// The salt was replaced; resend.
    BadServerSalt,
    BadMsg(i32),
    /// The connection the request went out on is gone.
    Reconnected,
    Stopped(StopReason),
}

struct Waiter {
    tx:         oneshot::Sender<Reply>,
    generation: u64,
}

/// Outstanding requests keyed by `msg_id`.
#[derive(Default)]
struct Pending {
    waiters:    HashMap<i64, Waiter>,
    /// container `msg_id` → `msg_id` of the request it carried
    containers: HashMap<i64, i64>,
}

impl Pending {
    fn insert(&mut self, packed: &Packed, waiter: Waiter) {
        if let Some(container_id) = packed.container_id {
            self.containers.insert(container_id, packed.msg_id);
        }
        self.waiters.insert(packed.msg_id, waiter);
    }

    /// Remove the waiter for `id`, which may also be the id of the container
    /// the request travelled in.
    fn take(&mut self, id: i64) -> Option<Waiter> {
        let id = self.containers.remove(&id).unwrap_or(id);
        let waiter = self.waiters.remove(&id)?;
        self.containers.retain(|_, m| *m != id);
        Some(waiter)
    }

    /// Fail every waiter, or only those of one connection.
    fn release(&mut self, generation: Option<u64>, reply: impl Fn() -> Reply) {
        let ids: Vec<i64> = self
            .waiters
            .iter()
            .filter(|(_, w)| generation.is_none_or(|g| w.generation == g))
            .map(|(id, _)| *id)
            .collect();
        for id in ids {
            if let Some(w) = self.take(id) {
                let _ = w.tx.send(reply());
            }
        }
    }
}

// ─── Shared state ─────────────────────────────────────────────────────────────

/// The write side of the live connection.
struct Connection {
    frames:     transport::FrameWriter,
    session:    tgcore_mtproto::Session,
    generation: u64,
    cancel:     CancellationToken,
    /// Set once the layer handshake is done; only then may callers send.
    ready:      bool,
}

struct Shared {
    config:        SessionConfig,
    dc:            DcAddress,
    auth_key:      AuthKey,
    connector:     Arc<dyn Connector>,
    state:         watch::Sender<SessionState>,
    conn:          tokio::sync::Mutex<Option<Connection>>,
    pending:       Mutex<Pending>,
    salt:          Mutex<ServerSalt>,
    server_config: Mutex<Option<types::Config>>,
    /// Id of the newest connection; tasks of older ones are stale.
    generation:    AtomicU64,
    lost:          mpsc::UnboundedSender<u64>,
    updates:       mpsc::Sender<RawUpdate>,
    updates_rx:    Mutex<Option<mpsc::Receiver<RawUpdate>>>,
    shutdown:      CancellationToken,
    tasks:         TaskTracker,
}

/// Which requests may go out before the session is `Running`.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Gate {
    Handshake,
    Caller,
}

/// One failed attempt, and whether its bytes may have reached the server.
struct Failure {
    error:   InvocationError,
    written: bool,
}

impl Failure {
    fn sent(error: InvocationError) -> Self { Self { error, written: true } }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

fn stop_reason(e: &InvocationError) -> StopReason {
    match e {
        InvocationError::AuthKeyDuplicated => StopReason::AuthKeyDuplicated,
        InvocationError::ServerCode(c)     => StopReason::ServerCode(*c),
        _                                  => StopReason::Shutdown,
    }
}

// ─── Session ──────────────────────────────────────────────────────────────────

/// A running MTProto session. Cheap to clone; all clones drive the same
/// connection.
#[derive(Clone)]
pub struct Session {
    shared: Arc<Shared>,
}

impl Session {
    /// Connect to `dc_id` (looked up in the built-in DC table) and complete
    /// the handshake.
    pub async fn start(
        config:   SessionConfig,
        dc_id:    i32,
        auth_key: AuthKey,
    ) -> Result<Self, InvocationError> {
        let dc = DcAddress::lookup(dc_id, config.test_mode, config.ipv6, config.is_media)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, format!("unknown DC{dc_id}")))?;
        Self::start_at(config, dc, auth_key).await
    }

    /// Like [`Session::start`], against an explicit address.
    pub async fn start_at(
        config:   SessionConfig,
        dc:       DcAddress,
        auth_key: AuthKey,
    ) -> Result<Self, InvocationError> {
        let connector = config.connector.clone().unwrap_or_else(|| {
            Arc::new(TcpConnector { proxy: config.proxy.clone(), ..TcpConnector::default() })
        });
        let (lost_tx, lost_rx) = mpsc::unbounded_channel();
        let (updates_tx, updates_rx) = mpsc::channel(config.updates_capacity.max(1));
        let (state, _) = watch::channel(SessionState::Idle);

        let shared = Arc::new(Shared {
            config,
            dc,
            auth_key,
            connector,
            state,
            conn:          tokio::sync::Mutex::new(None),
            pending:       Mutex::new(Pending::default()),
            salt:          Mutex::new(ServerSalt::initial()),
            server_config: Mutex::new(None),
            generation:    AtomicU64::new(0),
            lost:          lost_tx,
            updates:       updates_tx,
            updates_rx:    Mutex::new(Some(updates_rx)),
            shutdown:      CancellationToken::new(),
            tasks:         TaskTracker::new(),
        });

        let mut attempt = 0;
        loop {
            match shared.connect().await {
                Ok(()) => break,
                Err(e) if e.is_terminal() || attempt >= shared.config.max_retries => {
                    tracing::error!("[tgcore] DC{}: could not start session: {e}", shared.dc.dc_id);
                    shared.stop(stop_reason(&e)).await;
                    return Err(e);
                }
                Err(e) => {
                    attempt += 1;
                    tracing::warn!(
                        "[tgcore] DC{}: start attempt {attempt}/{} failed: {e}",
                        shared.dc.dc_id, shared.config.max_retries
                    );
                    sleep(shared.config.reconnect_backoff).await;
                }
            }
        }

        shared.tasks.spawn(shared.clone().supervise(lost_rx));
        Ok(Self { shared })
    }

    pub fn dc_id(&self) -> i32 { self.shared.dc.dc_id }

    pub fn state(&self) -> SessionState { *self.shared.state.borrow() }

    /// Observe state transitions.
    pub fn state_changes(&self) -> watch::Receiver<SessionState> {
        self.shared.state.subscribe()
    }

    /// The `config` returned by the last successful handshake.
    pub fn server_config(&self) -> Option<types::Config> {
        lock(&self.shared.server_config).clone()
    }

    /// Take the update stream. Only the first call gets it.
    pub fn updates(&self) -> Option<UpdateStream> {
        lock(&self.shared.updates_rx).take().map(|rx| UpdateStream { rx })
    }

    /// Invoke a raw API call with [`InvokeOptions::default`].
    ///
    /// ```rust,no_run
    /// # async fn f(session: tgcore_client::Session) -> Result<(), Box<dyn std::error::Error>> {
    /// use tgcore_tl::functions;
    ///
    /// let config = session.invoke(&functions::help::GetConfig {}).await?;
    /// println!("{config:?}");
    /// # Ok(()) }
    /// ```
    pub async fn invoke<R: RemoteCall>(&self, request: &R) -> Result<R::Return, InvocationError> {
        self.invoke_with(request, &InvokeOptions::default()).await
    }

    pub async fn invoke_with<R: RemoteCall>(
        &self,
        request: &R,
        options: &InvokeOptions,
    ) -> Result<R::Return, InvocationError> {
        let body = self.invoke_raw(&request.to_bytes(), options).await?;
        Ok(R::Return::from_bytes(&body)?)
    }

    /// Send an already-encoded request and return the encoded answer.
    pub async fn invoke_raw(
        &self,
        body:    &[u8],
        options: &InvokeOptions,
    ) -> Result<Vec<u8>, InvocationError> {
        let mut fail_count = NonZeroU32::MIN;
        let mut slept_so_far = Duration::ZERO;
        loop {
            let Failure { error, written } =
                match self.shared.request(body, options.timeout, Gate::Caller).await {
                    Ok(answer) => return Ok(answer),
                    Err(f) => f,
                };
            if error.is_terminal() {
                return Err(error);
            }
            if written && !options.replay_safe && matches!(error, InvocationError::Transport(_) | InvocationError::Timeout) {
                tracing::debug!("[tgcore] not resending non-idempotent request after: {error}");
                return Err(error);
            }

            let ctx = RetryContext {
                fail_count,
                slept_so_far,
                error,
                max_retries: options.retries,
                sleep_threshold: options.sleep_threshold,
            };
            match self.shared.config.retry_policy.should_retry(&ctx) {
                ControlFlow::Continue(delay) => {
                    sleep(delay).await;
                    slept_so_far += delay;
                    fail_count = fail_count.saturating_add(1);
                }
                ControlFlow::Break(()) => return Err(ctx.error),
            }
        }
    }

    /// Stop the session, fail every outstanding request with
    /// [`InvocationError::Dropped`] and wait for the tasks to finish.
    pub async fn stop(&self) {
        self.shared.stop(StopReason::Shutdown).await;
        self.shared.tasks.close();
        self.shared.tasks.wait().await;
    }
}

// ─── Connection lifecycle ─────────────────────────────────────────────────────

impl Shared {
    fn set_state(&self, new: SessionState) {
        self.state.send_if_modified(|s| {
            if matches!(s, SessionState::Stopped(_)) || *s == new {
                return false;
            }
            tracing::debug!("[tgcore] DC{}: {s} -> {new}", self.dc.dc_id);
            *s = new;
            true
        });
    }

    fn salt(&self) -> ServerSalt { *lock(&self.salt) }

    /// Open a new connection and run the handshake on it.
    async fn connect(self: &Arc<Self>) -> Result<(), InvocationError> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.set_state(SessionState::Connecting);
        tracing::info!("[tgcore] DC{}: connecting to {}", self.dc.dc_id, self.dc);

        let (reader, writer) = timeout(
            self.config.start_timeout,
            transport::connect(self.connector.as_ref(), &self.dc),
        )
        .await
        .map_err(|_| InvocationError::Timeout)??;

        self.set_state(SessionState::Handshaking);
        let session = tgcore_mtproto::Session::new(self.auth_key.clone(), self.salt().salt);
        let envelope = session.envelope().clone();
        let cancel = self.shutdown.child_token();
        *self.conn.lock().await = Some(Connection {
            frames: writer,
            session,
            generation,
            cancel: cancel.clone(),
            ready: false,
        });

        let (frames_tx, frames_rx) = mpsc::channel(64);
        self.tasks.spawn(recv_pump(reader, frames_tx, cancel.clone()));
        self.tasks.spawn(self.clone().net_worker(frames_rx, envelope, cancel.clone(), generation));

        if let Err(e) = self.handshake(generation).await {
            self.teardown(generation).await;
            return Err(e);
        }

        match self.conn.lock().await.as_mut() {
            Some(c) if c.generation == generation => c.ready = true,
            _ => return Err(TransportError::Closed.into()),
        }
        self.tasks.spawn(self.clone().pinger(cancel.clone(), generation));
        self.tasks.spawn(self.clone().salt_refresher(cancel, generation));
        self.set_state(SessionState::Running);
        tracing::info!("[tgcore] DC{}: session started", self.dc.dc_id);
        Ok(())
    }

    /// Ping, fetch a salt, then `invokeWithLayer(initConnection(help.getConfig))`.
    async fn handshake(&self, generation: u64) -> Result<(), InvocationError> {
        let t = self.config.start_timeout;
        let fail = |f: Failure| f.error;

        self.request(&functions::Ping { ping_id: 0 }.to_bytes(), t, Gate::Handshake)
            .await
            .map_err(fail)?;

        let salts = self
            .request(&functions::GetFutureSalts { num: 1 }.to_bytes(), t, Gate::Handshake)
            .await
            .map_err(fail)?;
        let salts = enums::FutureSalts::from_bytes(&salts)?.into_inner();
        if let Some(salt) = ServerSalt::pick(&salts) {
            self.adopt_salt(salt, generation).await;
        }

        let init = functions::InvokeWithLayer {
            layer: LAYER,
            query: functions::InitConnection {
                api_id:           self.config.api_id,
                device_model:     self.config.device_model.clone(),
                system_version:   self.config.system_version.clone(),
                app_version:      self.config.app_version.clone(),
                system_lang_code: self.config.system_lang_code.clone(),
                lang_pack:        self.config.lang_pack.clone(),
                lang_code:        self.config.lang_code.clone(),
                query:            functions::help::GetConfig {},
            },
        };
        let config = self
            .request(&init.to_bytes(), t, Gate::Handshake)
            .await
            .map_err(fail)?;
        let config = enums::Config::from_bytes(&config)?.into_inner();
        tracing::debug!(
            "[tgcore] DC{}: layer {LAYER} initialised, this_dc = {}",
            self.dc.dc_id, config.this_dc
        );
        *lock(&self.server_config) = Some(config);
        Ok(())
    }

    /// Close connection `generation` and fail its outstanding requests.
    async fn teardown(&self, generation: u64) {
        let conn = {
            let mut guard = self.conn.lock().await;
            if guard.as_ref().is_some_and(|c| c.generation == generation) {
                guard.take()
            } else {
                None
            }
        };
        if let Some(mut c) = conn {
            c.cancel.cancel();
            c.frames.shutdown().await;
        }
        lock(&self.pending).release(Some(generation), || Reply::Reconnected);
    }

    /// Called by any task that finds connection `generation` unusable.
    fn connection_lost(&self, generation: u64, reason: &dyn fmt::Display) {
        if self.shutdown.is_cancelled() || self.generation.load(Ordering::SeqCst) != generation {
            return;
        }
        tracing::warn!("[tgcore] DC{}: connection lost: {reason}", self.dc.dc_id);
        let mut pending = lock(&self.pending);
        self.set_state(SessionState::Reconnecting);
        pending.release(Some(generation), || Reply::Reconnected);
        drop(pending);
        let _ = self.lost.send(generation);
    }

    /// Replace broken connections until the session stops.
    async fn supervise(self: Arc<Self>, mut lost: mpsc::UnboundedReceiver<u64>) {
        loop {
            let generation = tokio::select! {
                _ = self.shutdown.cancelled() => return,
                g = lost.recv() => match g {
                    Some(g) => g,
                    None => return,
                },
            };
            if generation != self.generation.load(Ordering::SeqCst) {
                continue;
            }

            self.set_state(SessionState::Reconnecting);
            self.teardown(generation).await;

            let mut delay = self.config.reconnect_backoff;
            loop {
                tokio::select! {
                    _ = self.shutdown.cancelled() => return,
                    _ = sleep(delay) => {}
                }
                match self.connect().await {
                    Ok(()) => break,
                    Err(e) if e.is_terminal() => {
                        self.stop(stop_reason(&e)).await;
                        return;
                    }
                    Err(e) => {
                        tracing::warn!("[tgcore] DC{}: reconnect failed: {e}", self.dc.dc_id);
                        delay = (delay * 2).min(MAX_BACKOFF);
                    }
                }
            }
        }
    }

    /// Enter `Stopped` (keeping the first reason) and release everything.
    async fn stop(&self, reason: StopReason) {
        let changed = self.state.send_if_modified(|s| {
            if matches!(s, SessionState::Stopped(_)) {
                return false;
            }
            *s = SessionState::Stopped(reason);
            true
        });
        if changed {
            match reason {
                StopReason::Shutdown => tracing::info!("[tgcore] DC{}: session stopped", self.dc.dc_id),
                r => tracing::error!("[tgcore] DC{}: session stopped: {r:?}", self.dc.dc_id),
            }
        }
        self.shutdown.cancel();

        let conn = self.conn.lock().await.take();
        if let Some(mut c) = conn {
            c.frames.shutdown().await;
        }
        let reason = match *self.state.borrow() {
            SessionState::Stopped(r) => r,
            _ => reason,
        };
        lock(&self.pending).release(None, || Reply::Stopped(reason));
    }

    async fn adopt_salt(&self, salt: ServerSalt, generation: u64) {
        *lock(&self.salt) = salt;
        if let Some(c) = self.conn.lock().await.as_mut() {
            if c.generation == generation {
                c.session.set_salt(salt.salt);
            }
        }
    }

    async fn wait_running(&self, deadline: Instant) -> Result<(), InvocationError> {
        let mut rx = self.state.subscribe();
        let state = timeout_at(
            deadline,
            rx.wait_for(|s| matches!(s, SessionState::Running | SessionState::Stopped(_))),
        )
        .await
        .map_err(|_| InvocationError::Timeout)?
        .map(|s| *s)
        .map_err(|_| InvocationError::Dropped)?;
        match state {
            SessionState::Stopped(r) => Err(r.to_error()),
            _ => Ok(()),
        }
    }
}

// ─── Requests ─────────────────────────────────────────────────────────────────

impl Shared {
    /// Send `body` once, resending internally only for salt and msg_id
    /// corrections, and wait for the answer.
    async fn request(&self, body: &[u8], limit: Duration, gate: Gate) -> Result<Vec<u8>, Failure> {
        let deadline = Instant::now() + limit;
        let mut corrections = 0;
        let mut written = false;

        loop {
            let state = *self.state.borrow();
            if let SessionState::Stopped(r) = state {
                return Err(Failure { error: r.to_error(), written });
            }

            let (tx, rx) = oneshot::channel();
            let sent_on = {
                let mut guard = self.conn.lock().await;
                let packed = match guard.as_mut() {
                    Some(c) => {
                        // Checked under the pending lock so a concurrent
                        // `connection_lost` either sees this waiter or stops it.
                        let mut pending = lock(&self.pending);
                        let state = *self.state.borrow();
                        let open = match gate {
                            Gate::Caller    => c.ready && state == SessionState::Running,
                            Gate::Handshake => state == SessionState::Handshaking,
                        };
                        if open {
                            let packed = c.session.pack(body);
                            pending.insert(&packed, Waiter { tx, generation: c.generation });
                            Some((packed, c.generation))
                        } else {
                            None
                        }
                    }
                    None => None,
                };
                match (packed, guard.as_mut()) {
                    (Some((packed, generation)), Some(c)) => {
                        written = true;
                        if let Err(e) = c.frames.send(&packed.payload).await {
                            lock(&self.pending).take(packed.msg_id);
                            self.connection_lost(generation, &e);
                            return Err(Failure::sent(e.into()));
                        }
                        Some((packed.msg_id, generation))
                    }
                    _ => None,
                }
            };

            let Some((msg_id, generation)) = sent_on else {
                if gate == Gate::Handshake {
                    return Err(Failure { error: TransportError::Closed.into(), written });
                }
                self.wait_running(deadline).await.map_err(|e| Failure { error: e, written })?;
                continue;
            };
            tracing::trace!("[tgcore] sent {msg_id} on connection {generation}");

            let reply = match timeout_at(deadline, rx).await {
                Ok(Ok(reply)) => reply,
                Ok(Err(_)) => return Err(Failure::sent(InvocationError::Dropped)),
                Err(_) => {
                    lock(&self.pending).take(msg_id);
                    return Err(Failure::sent(InvocationError::Timeout));
                }
            };

            match reply {
                Reply::Answer(bytes) => return Ok(bytes),
                Reply::Rpc(e) => {
                    return Err(Failure::sent(InvocationError::Rpc(RpcError::from_telegram(
                        e.error_code,
                        &e.error_message,
                    ))));
                }
                Reply::BadServerSalt if corrections < MAX_CORRECTIONS => {
                    corrections += 1;
                    tracing::debug!("[tgcore] resending {msg_id} with the new salt");
                }
                Reply::BadServerSalt => {
                    return Err(Failure::sent(InvocationError::BadMsgNotification(48)));
                }
                Reply::BadMsg(code) => {
                    let resendable = BadMsgCode::from_code(code).is_some_and(BadMsgCode::is_resendable);
                    if !resendable || corrections >= MAX_CORRECTIONS {
                        return Err(Failure::sent(InvocationError::BadMsgNotification(code)));
                    }
                    corrections += 1;
                    tracing::debug!("[tgcore] resending {msg_id} after bad_msg_notification {code}");
                }
                Reply::Reconnected => {
                    return Err(Failure::sent(TransportError::Closed.into()));
                }
                Reply::Stopped(r) => return Err(Failure::sent(r.to_error())),
            }
        }
    }

    /// Send a message nobody waits for (pings).
    async fn send_unanswered(&self, body: &[u8], generation: u64) -> Result<(), TransportError> {
        let mut guard = self.conn.lock().await;
        match guard.as_mut() {
            Some(c) if c.generation == generation => {
                let packed = c.session.pack(body);
                c.frames.send(&packed.payload).await
            }
            _ => Err(TransportError::Closed),
        }
    }

    async fn send_acks(&self, acks: &[i64], generation: u64) -> Result<(), TransportError> {
        let mut guard = self.conn.lock().await;
        let Some(c) = guard.as_mut().filter(|c| c.generation == generation) else {
            return Ok(());
        };
        for id in acks {
            c.session.ack(*id);
        }
        if !c.session.should_flush_acks() {
            return Ok(());
        }
        match c.session.pack_acks() {
            Some(packed) => c.frames.send(&packed.payload).await,
            None => Ok(()),
        }
    }

    fn resolve(&self, id: i64, reply: Reply) {
        match lock(&self.pending).take(id) {
            Some(w) => {
                let _ = w.tx.send(reply);
            }
            None => tracing::trace!("[tgcore] no one waiting for {id}: {reply:?}"),
        }
    }
}

// ─── Tasks ────────────────────────────────────────────────────────────────────

async fn recv_pump(
    mut reader: FrameReader,
    tx:         mpsc::Sender<Result<Frame, TransportError>>,
    cancel:     CancellationToken,
) {
    loop {
        let frame = tokio::select! {
            _ = cancel.cancelled() => return,
            f = reader.recv() => f,
        };
        let last = !matches!(frame, Ok(Frame::Payload(_)));
        if tx.send(frame).await.is_err() || last {
            return;
        }
    }
}

/// Net-worker state that lives as long as one connection.
#[derive(Default)]
struct Inbox {
    seen:      SeenMsgIds,
    acks:      Vec<i64>,
    unique_id: Option<i64>,
}

impl Shared {
    async fn net_worker(
        self:       Arc<Self>,
        mut frames: mpsc::Receiver<Result<Frame, TransportError>>,
        envelope:   EncryptedSession,
        cancel:     CancellationToken,
        generation: u64,
    ) {
        let mut inbox = Inbox::default();
        loop {
            let frame = tokio::select! {
                _ = cancel.cancelled() => return,
                f = frames.recv() => f,
            };
            let mut payload = match frame {
                Some(Ok(Frame::Payload(p))) => p,
                Some(Ok(Frame::ServerCode(code))) => {
                    tracing::error!("[tgcore] DC{}: server sent code {code}", self.dc.dc_id);
                    self.stop(StopReason::ServerCode(code)).await;
                    return;
                }
                Some(Ok(Frame::Closed)) | None => {
                    self.connection_lost(generation, &"closed by server");
                    return;
                }
                Some(Err(e)) => {
                    self.connection_lost(generation, &e);
                    return;
                }
            };

            let message = match envelope.decrypt(&mut payload) {
                Ok(m) => m,
                Err(e) => {
                    self.connection_lost(generation, &InvocationError::SecurityCheckMismatch(e.to_string()));
                    return;
                }
            };
            let mut inbound = Vec::new();
            if let Err(e) = service::decode(message.msg_id, message.seq_no, &message.body, &mut inbound) {
                self.connection_lost(generation, &e);
                return;
            }

            for m in inbound {
                if m.requires_ack() {
                    inbox.acks.push(m.msg_id);
                }
                if !inbox.seen.insert(m.msg_id) {
                    tracing::trace!("[tgcore] dropping repeated message {}", m.msg_id);
                    continue;
                }
                if self.route(m, generation, &mut inbox).await.is_break() {
                    return;
                }
            }

            if !inbox.acks.is_empty() {
                let acks = std::mem::take(&mut inbox.acks);
                if let Err(e) = self.send_acks(&acks, generation).await {
                    self.connection_lost(generation, &e);
                    return;
                }
            }
        }
    }

    async fn route(&self, m: Inbound, generation: u64, inbox: &mut Inbox) -> ControlFlow<()> {
        match m.message {
            ServiceMessage::RpcResult { req_msg_id, answer } => match answer {
                RpcAnswer::Ok(body) => self.resolve(req_msg_id, Reply::Answer(body)),
                RpcAnswer::Err(e) if e.error_code == 406 && e.error_message == "AUTH_KEY_DUPLICATED" => {
                    tracing::error!("[tgcore] DC{}: auth key used by another connection", self.dc.dc_id);
                    self.stop(StopReason::AuthKeyDuplicated).await;
                    return ControlFlow::Break(());
                }
                RpcAnswer::Err(e) => self.resolve(req_msg_id, Reply::Rpc(e)),
            },
            ServiceMessage::BadServerSalt(b) => {
                tracing::debug!("[tgcore] bad_server_salt for {}", b.bad_msg_id);
                self.adopt_salt(ServerSalt::untimed(b.new_server_salt), generation).await;
                self.resolve(b.bad_msg_id, Reply::BadServerSalt);
            }
            ServiceMessage::BadMsgNotification(b) => {
                tracing::warn!(
                    "[tgcore] bad_msg_notification for {}: {}",
                    b.bad_msg_id,
                    tgcore_mtproto::bad_msg::describe(b.error_code)
                );
                match BadMsgCode::from_code(b.error_code) {
                    Some(code) if code.needs_clock_sync() => msg_id::correct_clock(m.msg_id),
                    Some(BadMsgCode::SeqNoTooLow | BadMsgCode::SeqNoTooHigh) => {
                        if let Some(c) = self.conn.lock().await.as_mut() {
                            if c.generation == generation {
                                c.session.correct_seq_no(b.error_code);
                            }
                        }
                    }
                    _ => {}
                }
                self.resolve(b.bad_msg_id, Reply::BadMsg(b.error_code));
            }
            ServiceMessage::FutureSalts(f) => {
                let req_msg_id = f.req_msg_id;
                self.resolve(req_msg_id, Reply::Answer(enums::FutureSalts::FutureSalts(f).to_bytes()));
            }
            ServiceMessage::Pong(p) => {
                let msg_id = p.msg_id;
                self.resolve(msg_id, Reply::Answer(enums::Pong::Pong(p).to_bytes()));
            }
            ServiceMessage::NewSessionCreated(n) => {
                tracing::info!("[tgcore] DC{}: new session created", self.dc.dc_id);
                if inbox.unique_id.is_some_and(|u| u != n.unique_id) {
                    if let Some(c) = self.conn.lock().await.as_mut() {
                        if c.generation == generation {
                            c.session.reset_seq_no();
                        }
                    }
                }
                inbox.unique_id = Some(n.unique_id);
                self.adopt_salt(ServerSalt::untimed(n.server_salt), generation).await;
            }
            ServiceMessage::DetailedInfo { answer_msg_id } => inbox.acks.push(answer_msg_id),
            ServiceMessage::MsgsAck(ids) => tracing::trace!("[tgcore] server acked {ids:?}"),
            ServiceMessage::Ignored { constructor_id } => {
                tracing::trace!("[tgcore] ignoring service message {constructor_id:#010x}");
            }
            ServiceMessage::Update(body) => {
                if let Err(e) = self.updates.try_send(RawUpdate { body }) {
                    match e {
                        mpsc::error::TrySendError::Full(_) => {
                            tracing::warn!("[tgcore] update queue full, dropping update");
                        }
                        mpsc::error::TrySendError::Closed(_) => {
                            tracing::trace!("[tgcore] nobody listens for updates");
                        }
                    }
                }
            }
        }
        ControlFlow::Continue(())
    }

    async fn pinger(self: Arc<Self>, cancel: CancellationToken, generation: u64) {
        let disconnect_delay = (self.config.wait_timeout + Duration::from_secs(10)).as_secs() as i32;
        let ping = functions::PingDelayDisconnect { ping_id: 0, disconnect_delay }.to_bytes();
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = sleep(self.config.ping_interval) => {}
            }
            if let Err(e) = self.send_unanswered(&ping, generation).await {
                self.connection_lost(generation, &e);
                return;
            }
        }
    }

    async fn salt_refresher(self: Arc<Self>, cancel: CancellationToken, generation: u64) {
        let request = functions::GetFutureSalts { num: 1 }.to_bytes();
        loop {
            let wait = self.salt().refresh_in(msg_id::server_now());
            tracing::debug!("[tgcore] next salt refresh in {} s", wait.as_secs());
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = sleep(wait) => {}
            }
            let answer = tokio::select! {
                _ = cancel.cancelled() => return,
                a = self.request(&request, self.config.wait_timeout, Gate::Caller) => a,
            };
            let salts = match answer {
                Ok(body) => enums::FutureSalts::from_bytes(&body),
                Err(f) if matches!(f.error, InvocationError::Transport(_) | InvocationError::Timeout) => {
                    self.connection_lost(generation, &f.error);
                    return;
                }
                Err(f) => {
                    tracing::warn!("[tgcore] get_future_salts failed: {}", f.error);
                    continue;
                }
            };
            match salts {
                Ok(salts) => {
                    if let Some(salt) = ServerSalt::pick(&salts.into_inner()) {
                        self.adopt_salt(salt, generation).await;
                    }
                }
                Err(e) => tracing::warn!("[tgcore] malformed future_salts: {e}"),
            }
        }
    }
}
