//! Per-user session state.
//!
//! A [`Session`] is the authoritative runtime record of one signed-on
//! client: identity, presence, capabilities, rate-limit state, and a
//! bounded mailbox of SNAC messages queued for delivery. Exactly one
//! front-end task owns the consumer side of the mailbox; any number of
//! peer sessions enqueue into it through [`Session::relay_message`].
//!
//! ## Locking
//!
//! Mutable state sits behind one `parking_lot` read-write lock; every
//! getter and setter is a short critical section. The mailbox is never
//! touched under that lock — enqueue is a lock-free `try_send` guarded by
//! an atomic closed flag, so a relay can never deadlock with a consumer
//! that calls back into the session.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Duration, Utc};
use oscar_proto::caps;
use oscar_proto::snac::{FOOD_GROUP_MAX, SnacMessage};
use oscar_proto::tlv::{Tlv, TlvBlock};
use oscar_proto::user_info::{flags, tags};
use oscar_proto::{DisplayScreenName, IdentScreenName, TlvUserInfo};
use parking_lot::RwLock;
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::warn;
use uuid::Uuid;

use crate::metrics;
use crate::security::rate_limit::{self, RateClass, RateClassState, RateLimitStatus};

/// Default mailbox capacity; overridable through `LimitsConfig`.
pub const DEFAULT_MAILBOX_CAPACITY: usize = 1000;

/// Warning levels are tenths of a percent, capped at 100.0%.
pub const MAX_WARNING_LEVEL: u16 = 1000;

/// Scaled rate thresholds converge on `max_level` minus this buffer, which
/// keeps heavily-warned clients connectable.
const WARNING_SCALE_HEADROOM: i64 = 150;

/// Outcome of a non-blocking mailbox enqueue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayStatus {
    /// Message enqueued; the consumer will see it in FIFO order.
    Sent,
    /// The session was closed; the message was dropped.
    Closed,
    /// The mailbox is at capacity; the recipient is presumed dead.
    QueueFull,
}

/// Per-session rate-limit bookkeeping, one slot per class id 1..=5.
struct RateLimits {
    current: [RateClassState; 5],
    /// Snapshot from the previous `observe_rate_changes` (or
    /// `set_rate_classes`), used for delta reporting.
    last_observed: [RateClassState; 5],
    /// Unscaled class parameters, the fixed reference for warning scaling.
    originals: [RateClass; 5],
}

fn class_index(class_id: u16) -> Option<usize> {
    let idx = (class_id as usize).checked_sub(1)?;
    (idx < 5).then_some(idx)
}

struct SessionInner {
    display_screen_name: DisplayScreenName,
    uin: u32,
    client_id: String,
    away_message: String,
    idle: bool,
    idle_since: DateTime<Utc>,
    user_info_bitmask: u16,
    user_status_bitmask: u32,
    warning_level: u16,
    remote_addr: Option<SocketAddr>,
    signon_time: DateTime<Utc>,
    signon_complete: bool,
    capabilities: Vec<Uuid>,
    food_group_versions: [u16; FOOD_GROUP_MAX],
    chat_room_cookie: String,
    typing_events_enabled: bool,
    multi_conn_flag: u8,
    rate: Option<RateLimits>,
}

/// Runtime state for one signed-on client.
pub struct Session {
    /// Normalized identity; fixed for the life of the session.
    ident: IdentScreenName,
    mailbox_tx: mpsc::Sender<SnacMessage>,
    /// Single-consumer endpoint; the owning front-end is the only caller.
    mailbox_rx: Mutex<mpsc::Receiver<SnacMessage>>,
    closed: AtomicBool,
    close_signal: CancellationToken,
    warning_tx: mpsc::Sender<u16>,
    warning_rx: Mutex<mpsc::Receiver<u16>>,
    inner: RwLock<SessionInner>,
}

impl Session {
    pub fn new(display_screen_name: DisplayScreenName) -> Self {
        Self::with_capacity(display_screen_name, DEFAULT_MAILBOX_CAPACITY)
    }

    pub fn with_capacity(display_screen_name: DisplayScreenName, capacity: usize) -> Self {
        let (mailbox_tx, mailbox_rx) = mpsc::channel(capacity);
        let (warning_tx, warning_rx) = mpsc::channel(1);
        Self {
            ident: display_screen_name.ident(),
            mailbox_tx,
            mailbox_rx: Mutex::new(mailbox_rx),
            closed: AtomicBool::new(false),
            close_signal: CancellationToken::new(),
            warning_tx,
            warning_rx: Mutex::new(warning_rx),
            inner: RwLock::new(SessionInner {
                display_screen_name,
                uin: 0,
                client_id: String::new(),
                away_message: String::new(),
                idle: false,
                idle_since: Utc::now(),
                user_info_bitmask: flags::FREE,
                user_status_bitmask: 0,
                warning_level: 0,
                remote_addr: None,
                signon_time: Utc::now(),
                signon_complete: false,
                capabilities: Vec::new(),
                food_group_versions: [1; FOOD_GROUP_MAX],
                chat_room_cookie: String::new(),
                typing_events_enabled: false,
                multi_conn_flag: 0,
                rate: None,
            }),
        }
    }

    // ========================================================================
    // Mailbox and close lifecycle
    // ========================================================================

    /// Enqueue a message for delivery to this session's client.
    ///
    /// Never blocks. `Closed` and `QueueFull` leave the message undelivered;
    /// the caller decides the policy (managers log the former and close the
    /// session on the latter).
    pub fn relay_message(&self, msg: SnacMessage) -> RelayStatus {
        if self.closed.load(Ordering::Acquire) {
            return RelayStatus::Closed;
        }
        match self.mailbox_tx.try_send(msg) {
            Ok(()) => RelayStatus::Sent,
            Err(mpsc::error::TrySendError::Full(_)) => RelayStatus::QueueFull,
            Err(mpsc::error::TrySendError::Closed(_)) => RelayStatus::Closed,
        }
    }

    /// Receive the next queued message. Single consumer only.
    ///
    /// Already-enqueued messages remain readable after [`Session::close`];
    /// consumers multiplex this against [`Session::closed`] and treat the
    /// close signal as authoritative.
    pub async fn recv_message(&self) -> Option<SnacMessage> {
        self.mailbox_rx.lock().await.recv().await
    }

    /// Non-blocking receive; `None` when the mailbox is currently empty.
    /// Single consumer only.
    pub fn try_recv_message(&self) -> Option<SnacMessage> {
        self.mailbox_rx.try_lock().ok()?.try_recv().ok()
    }

    /// Close the session. Idempotent; the first call fires
    /// [`Session::closed`] and makes every later `relay_message` return
    /// [`RelayStatus::Closed`].
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            self.close_signal.cancel();
        }
    }

    /// Completes when the session has been closed. Fires exactly once;
    /// awaiting after close resolves immediately.
    pub async fn closed(&self) {
        self.close_signal.cancelled().await;
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    // ========================================================================
    // Identity
    // ========================================================================

    pub fn ident_screen_name(&self) -> &IdentScreenName {
        &self.ident
    }

    pub fn display_screen_name(&self) -> DisplayScreenName {
        self.inner.read().display_screen_name.clone()
    }

    /// Update the display form, e.g. after the user re-formats their own
    /// screen name. The normalized identity cannot change.
    pub fn set_display_screen_name(&self, name: DisplayScreenName) {
        debug_assert_eq!(name.ident(), self.ident);
        self.inner.write().display_screen_name = name;
    }

    pub fn uin(&self) -> u32 {
        self.inner.read().uin
    }

    pub fn set_uin(&self, uin: u32) {
        self.inner.write().uin = uin;
    }

    pub fn client_id(&self) -> String {
        self.inner.read().client_id.clone()
    }

    pub fn set_client_id(&self, client_id: impl Into<String>) {
        self.inner.write().client_id = client_id.into();
    }

    // ========================================================================
    // Presence
    // ========================================================================

    pub fn away_message(&self) -> String {
        self.inner.read().away_message.clone()
    }

    pub fn set_away_message(&self, message: impl Into<String>) {
        self.inner.write().away_message = message.into();
    }

    pub fn idle(&self) -> bool {
        self.inner.read().idle
    }

    /// Mark idle as of `duration` ago.
    pub fn set_idle(&self, duration: Duration) {
        let mut g = self.inner.write();
        g.idle = true;
        g.idle_since = Utc::now() - duration;
    }

    /// Clear the idle flag. The recorded idle timestamp is unspecified
    /// afterward; callers must consult [`Session::idle`] first.
    pub fn unset_idle(&self) {
        self.inner.write().idle = false;
    }

    /// Instant the idle period began. Meaningful only while
    /// [`Session::idle`] is true.
    pub fn idle_time(&self) -> DateTime<Utc> {
        self.inner.read().idle_since
    }

    pub fn user_info_bitmask(&self) -> u16 {
        self.inner.read().user_info_bitmask
    }

    pub fn set_user_info_flag(&self, flag: u16) {
        self.inner.write().user_info_bitmask |= flag;
    }

    pub fn clear_user_info_flag(&self, flag: u16) {
        self.inner.write().user_info_bitmask &= !flag;
    }

    pub fn user_status_bitmask(&self) -> u32 {
        self.inner.read().user_status_bitmask
    }

    pub fn set_user_status_bitmask(&self, bitmask: u32) {
        self.inner.write().user_status_bitmask = bitmask;
    }

    pub fn warning_level(&self) -> u16 {
        self.inner.read().warning_level
    }

    // ========================================================================
    // Network
    // ========================================================================

    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.inner.read().remote_addr
    }

    pub fn set_remote_addr(&self, addr: Option<SocketAddr>) {
        self.inner.write().remote_addr = addr;
    }

    pub fn signon_time(&self) -> DateTime<Utc> {
        self.inner.read().signon_time
    }

    pub fn set_signon_time(&self, time: DateTime<Utc>) {
        self.inner.write().signon_time = time;
    }

    pub fn signon_complete(&self) -> bool {
        self.inner.read().signon_complete
    }

    pub fn set_signon_complete(&self) {
        self.inner.write().signon_complete = true;
    }

    // ========================================================================
    // Capabilities and food groups
    // ========================================================================

    pub fn capabilities(&self) -> Vec<Uuid> {
        self.inner.read().capabilities.clone()
    }

    /// Replace the advertised capability list. Order is preserved for echo
    /// back to clients.
    pub fn set_capabilities(&self, capabilities: Vec<Uuid>) {
        self.inner.write().capabilities = capabilities;
    }

    /// Negotiated version for a food group, or `None` for an unknown group
    /// id. Every known group starts at version 1.
    pub fn food_group_version(&self, food_group: u16) -> Option<u16> {
        self.inner
            .read()
            .food_group_versions
            .get(food_group as usize)
            .copied()
    }

    pub fn set_food_group_version(&self, food_group: u16, version: u16) {
        if let Some(slot) = self
            .inner
            .write()
            .food_group_versions
            .get_mut(food_group as usize)
        {
            *slot = version;
        }
    }

    // ========================================================================
    // Chat and misc
    // ========================================================================

    /// Cookie of the room this session sits in; empty when not in a room.
    pub fn chat_room_cookie(&self) -> String {
        self.inner.read().chat_room_cookie.clone()
    }

    pub fn set_chat_room_cookie(&self, cookie: impl Into<String>) {
        self.inner.write().chat_room_cookie = cookie.into();
    }

    pub fn typing_events_enabled(&self) -> bool {
        self.inner.read().typing_events_enabled
    }

    pub fn set_typing_events_enabled(&self, enabled: bool) {
        self.inner.write().typing_events_enabled = enabled;
    }

    pub fn multi_conn_flag(&self) -> u8 {
        self.inner.read().multi_conn_flag
    }

    pub fn set_multi_conn_flag(&self, flag: u8) {
        self.inner.write().multi_conn_flag = flag;
    }

    /// Receive the next warning-level change emitted by
    /// [`Session::scale_warning_and_rate_limit`]. Single consumer only.
    pub async fn recv_warning_update(&self) -> Option<u16> {
        self.warning_rx.lock().await.recv().await
    }

    // ========================================================================
    // User info
    // ========================================================================

    /// Assemble the user-info block from current state under one read
    /// lock, so peers never observe a torn snapshot.
    pub fn tlv_user_info(&self) -> TlvUserInfo {
        let now = Utc::now();
        let g = self.inner.read();

        let mut user_flags = g.user_info_bitmask;
        if !g.away_message.is_empty() {
            user_flags |= flags::UNAVAILABLE;
        }

        let mut block = TlvBlock::new();
        block.push(Tlv::u16(tags::USER_FLAGS, user_flags));
        block.push(Tlv::u32(tags::SIGNON_TOD, g.signon_time.timestamp() as u32));
        block.push(Tlv::u32(tags::USER_STATUS, g.user_status_bitmask));
        if g.idle {
            // The wire wants whole minutes.
            let minutes = ((now - g.idle_since).num_seconds() / 60).clamp(0, u16::MAX as i64);
            block.push(Tlv::u16(tags::IDLE_TIME, minutes as u16));
        }
        if user_flags & flags::ICQ != 0 {
            block.push(Tlv::empty(tags::ICQ_DC_INFO));
        }
        if !g.capabilities.is_empty() {
            block.push(Tlv::new(tags::CAPABILITIES, caps::encode(&g.capabilities)));
        }
        block.push(Tlv::u16(tags::MY_SUBSCRIPTIONS, 0));

        TlvUserInfo {
            screen_name: g.display_screen_name.as_str().to_string(),
            warning_level: g.warning_level,
            tlv_block: block,
        }
    }

    // ========================================================================
    // Rate limiting
    // ========================================================================

    /// Install the five class configurations.
    ///
    /// The first call seeds the delta baseline with the fresh states;
    /// later calls snapshot the pre-replacement states instead, so the
    /// next [`Session::observe_rate_changes`] reports the configuration
    /// change. Subscriptions survive replacement; levels and statuses
    /// reset to clear-at-max.
    pub fn set_rate_classes(&self, now: DateTime<Utc>, classes: [RateClass; 5]) {
        let mut g = self.inner.write();
        match g.rate.as_mut() {
            None => {
                let states = classes.map(|c| RateClassState::new(c, now));
                g.rate = Some(RateLimits {
                    current: states,
                    last_observed: states,
                    originals: classes,
                });
            }
            Some(rate) => {
                rate.last_observed = rate.current;
                for (slot, class) in rate.current.iter_mut().zip(classes) {
                    let subscribed = slot.subscribed;
                    *slot = RateClassState::new(class, now);
                    slot.subscribed = subscribed;
                }
                rate.originals = classes;
            }
        }
    }

    /// Mark classes the client wants change notifications for. Only
    /// subscribed classes are reported by
    /// [`Session::observe_rate_changes`].
    pub fn subscribe_rate_limits(&self, class_ids: &[u16]) {
        let mut g = self.inner.write();
        if let Some(rate) = g.rate.as_mut() {
            for id in class_ids {
                if let Some(idx) = class_index(*id) {
                    rate.current[idx].subscribed = true;
                }
            }
        }
    }

    /// Fold one outbound action into a class and report where the level
    /// landed.
    ///
    /// Bot-flagged sessions are exempt and always read clear. A
    /// `Disconnect` result closes the session before returning.
    pub fn evaluate_rate_limit(&self, now: DateTime<Utc>, class_id: u16) -> RateLimitStatus {
        let status = {
            let mut g = self.inner.write();
            if g.user_info_bitmask & flags::BOT != 0 {
                return RateLimitStatus::Clear;
            }
            let Some(rate) = g.rate.as_mut() else {
                return RateLimitStatus::Clear;
            };
            let Some(idx) = class_index(class_id) else {
                return RateLimitStatus::Clear;
            };

            let state = &mut rate.current[idx];
            let (status, level) = rate_limit::evaluate(
                &state.class,
                state.last_time,
                now,
                state.current_level,
                state.limited_now,
            );
            state.current_level = level;
            state.current_status = status;
            state.last_time = now;
            state.limited_now = status == RateLimitStatus::Limited;
            status
        };

        if status == RateLimitStatus::Disconnect {
            warn!(screen_name = %self.ident, class_id, "rate limit exceeded, disconnecting");
            metrics::RATE_LIMIT_DISCONNECTS.inc();
            self.close();
        }
        status
    }

    /// Report rate state drift since the last observation.
    ///
    /// Re-runs the engine for each subscribed class without advancing
    /// `last_time`; a class that recovered past its clear threshold while
    /// the client stayed quiet sheds its limited state here. Returns the
    /// classes whose configuration changed and the states whose status
    /// changed, then saves the current states as the new baseline.
    pub fn observe_rate_changes(
        &self,
        now: DateTime<Utc>,
    ) -> (Vec<RateClass>, Vec<RateClassState>) {
        let mut class_delta = Vec::new();
        let mut state_delta = Vec::new();

        let mut g = self.inner.write();
        let Some(rate) = g.rate.as_mut() else {
            return (class_delta, state_delta);
        };

        for idx in 0..rate.current.len() {
            let state = &mut rate.current[idx];
            if !state.subscribed {
                continue;
            }

            let (status, level) = rate_limit::evaluate(
                &state.class,
                state.last_time,
                now,
                state.current_level,
                state.limited_now,
            );
            if state.limited_now && status == RateLimitStatus::Clear {
                state.limited_now = false;
                state.current_level = level;
                state.current_status = RateLimitStatus::Clear;
            }

            let observed = &rate.last_observed[idx];
            if state.class != observed.class {
                class_delta.push(state.class);
            }
            if state.current_status != observed.current_status {
                state_delta.push(*state);
            }
            rate.last_observed[idx] = *state;
        }

        (class_delta, state_delta)
    }

    /// Apply a warning increment and rescale one class's thresholds.
    ///
    /// A warning that would exceed 100.0% is refused outright. Negative
    /// totals clamp to zero. Thresholds move toward the class ceiling
    /// (less [`WARNING_SCALE_HEADROOM`]) in proportion to the increment,
    /// never dropping below their unscaled originals. The new warning
    /// level is offered to the notification channel without blocking.
    pub fn scale_warning_and_rate_limit(&self, incr: i16, class_id: u16) -> (bool, u16) {
        let new_warning = {
            let mut g = self.inner.write();

            let total = i32::from(g.warning_level) + i32::from(incr);
            if total > i32::from(MAX_WARNING_LEVEL) {
                return (false, 0);
            }
            let new_warning = total.max(0) as u16;
            g.warning_level = new_warning;

            if let Some(rate) = g.rate.as_mut()
                && let Some(idx) = class_index(class_id)
            {
                let original = rate.originals[idx];
                let pct = f64::from(incr) / f64::from(MAX_WARNING_LEVEL);
                let ceiling = original.max_level - WARNING_SCALE_HEADROOM;
                let class = &mut rate.current[idx].class;

                class.limit_level =
                    scale_level(class.limit_level, original.limit_level, ceiling, pct)
                        .clamp(original.limit_level, original.max_level);
                class.clear_level =
                    scale_level(class.clear_level, original.clear_level, ceiling, pct)
                        .clamp(original.clear_level, original.max_level);
                class.alert_level =
                    scale_level(class.alert_level, original.alert_level, ceiling, pct)
                        .clamp(original.alert_level, original.max_level);
            }
            new_warning
        };

        // Dropped when the consumer is behind; only the latest level
        // matters.
        let _ = self.warning_tx.try_send(new_warning);
        (true, new_warning)
    }
}

fn scale_level(current: i64, original: i64, ceiling: i64, pct: f64) -> i64 {
    current + ((ceiling - original) as f64 * pct) as i64
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("ident", &self.ident)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}
