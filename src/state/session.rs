//! Per-process board session: mirrors the shared tree, runs the daily reset protocol and
//! performs join/leave writes.
//!
//! A session owns two live subscriptions (`matches` and `lastResetDate`) and a countdown timer.
//! All three run as tasks owned by the [`SessionHandle`] and are aborted together when the
//! handle is dropped. The reset check runs on every marker delivery and again whenever the
//! timer sees the local date change.

use std::{ops::Deref, sync::Arc, time::Duration};

use futures::StreamExt;
use indexmap::IndexMap;
use serde_json::Value;
use thiserror::Error;
use tokio::{
    sync::{RwLock, broadcast},
    task::JoinHandle,
    time::{interval, sleep},
};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
    dao::{
        models::{MATCHES_PATH, PlayerEntity, RESET_MARKER_PATH},
        storage::StorageError,
        tree_store::{TreePath, TreeStore},
    },
    dto::{board::JoinRequest, validation::validation_message},
    state::{
        board::{Match, MatchSlot, Player, TeamKey, matches_from_snapshot},
        clock::{Clock, date_key},
        countdown::Countdown,
        notifications::{Notification, NotificationKind, NotificationQueue},
        reset::{ResetGuard, fresh_document, reset_due},
    },
};

const EVENT_CAPACITY: usize = 64;
const INITIAL_RESUBSCRIBE_DELAY: Duration = Duration::from_millis(1_000);
const MAX_RESUBSCRIBE_DELAY: Duration = Duration::from_secs(10);

/// Loading state of a session. `Ready` is never left once reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadPhase {
    /// No `matches` delivery or read failure seen yet.
    Loading,
    /// The first delivery (or failure) has been handled.
    Ready,
}

/// Tunables for a [`BoardSession`].
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Matches recreated by every reset.
    pub slots: Vec<MatchSlot>,
    /// Which marker deliveries may trigger a reset.
    pub reset_guard: ResetGuard,
    /// Period of the countdown refresh.
    pub countdown_interval: Duration,
    /// Maximum number of pending notifications.
    pub notification_capacity: usize,
}

/// Read-only copy of the session view.
#[derive(Debug, Clone, PartialEq)]
pub struct BoardSnapshot {
    /// Whether the first load has completed.
    pub phase: LoadPhase,
    /// Matches in store key order.
    pub matches: Vec<Match>,
    /// Last delivered reset marker, empty when none is stored.
    pub last_reset_date: String,
    /// Match joined most recently through this session.
    pub expanded_match: Option<String>,
}

/// Change emitted by a session to its listeners.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// The board view changed.
    Board(BoardSnapshot),
    /// A notification was queued.
    Notification(Notification),
    /// The countdown was refreshed.
    Countdown(Countdown),
}

/// Errors returned by session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The sign-up form was rejected before anything was written.
    #[error("{0}")]
    InvalidInput(String),
    /// No match with this key is on the board.
    #[error("match `{0}` not found")]
    MatchNotFound(String),
    /// The document could not be serialized for writing.
    #[error("failed to encode document: {0}")]
    Encode(#[from] serde_json::Error),
    /// The store failed the write.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

struct BoardView {
    phase: LoadPhase,
    matches: Vec<Match>,
    last_reset_date: String,
    expanded_match: Option<String>,
    marker_deliveries: u64,
}

impl BoardView {
    fn new() -> Self {
        Self {
            phase: LoadPhase::Loading,
            matches: Vec::new(),
            last_reset_date: String::new(),
            expanded_match: None,
            marker_deliveries: 0,
        }
    }

    fn snapshot(&self) -> BoardSnapshot {
        BoardSnapshot {
            phase: self.phase,
            matches: self.matches.clone(),
            last_reset_date: self.last_reset_date.clone(),
            expanded_match: self.expanded_match.clone(),
        }
    }

    fn roster(&self, match_id: &str, team: TeamKey) -> Option<Vec<Player>> {
        self.matches
            .iter()
            .find(|game| game.id == match_id)
            .map(|game| game.roster(team).to_vec())
    }
}

#[derive(Debug, Clone, Copy)]
enum Watched {
    Matches,
    ResetMarker,
}

impl Watched {
    fn path(self) -> TreePath {
        match self {
            Watched::Matches => TreePath::parse(MATCHES_PATH),
            Watched::ResetMarker => TreePath::parse(RESET_MARKER_PATH),
        }
    }
}

/// Disposable cache of the shared board plus the operations that write to it.
pub struct BoardSession {
    store: Arc<dyn TreeStore>,
    clock: Arc<dyn Clock>,
    settings: SessionSettings,
    view: RwLock<BoardView>,
    countdown: RwLock<Countdown>,
    notifications: NotificationQueue,
    events: broadcast::Sender<SessionEvent>,
}

/// Owner of a running session. Dropping it cancels both subscriptions and the timer.
pub struct SessionHandle {
    session: Arc<BoardSession>,
    tasks: Vec<JoinHandle<()>>,
}

impl SessionHandle {
    /// Shared reference to the running session.
    pub fn session(&self) -> &Arc<BoardSession> {
        &self.session
    }
}

impl Deref for SessionHandle {
    type Target = BoardSession;

    fn deref(&self) -> &Self::Target {
        &self.session
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
        debug!("board session torn down");
    }
}

impl BoardSession {
    /// Start a session: open both subscriptions and the countdown timer.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(
        store: Arc<dyn TreeStore>,
        clock: Arc<dyn Clock>,
        settings: SessionSettings,
    ) -> SessionHandle {
        let (events, _rx) = broadcast::channel(EVENT_CAPACITY);
        let countdown = Countdown::until_midnight(clock.now());
        let session = Arc::new(Self {
            notifications: NotificationQueue::new(settings.notification_capacity),
            store,
            clock,
            settings,
            view: RwLock::new(BoardView::new()),
            countdown: RwLock::new(countdown),
            events,
        });

        let tasks = vec![
            tokio::spawn(session.clone().run_subscription(Watched::Matches)),
            tokio::spawn(session.clone().run_subscription(Watched::ResetMarker)),
            tokio::spawn(session.clone().run_countdown()),
        ];
        info!(guard = ?session.settings.reset_guard, "board session started");

        SessionHandle { session, tasks }
    }

    /// Receive every subsequent board, notification and countdown change.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Copy of the current board view.
    pub async fn snapshot(&self) -> BoardSnapshot {
        self.view.read().await.snapshot()
    }

    /// Countdown computed at the last timer tick.
    pub async fn countdown(&self) -> Countdown {
        *self.countdown.read().await
    }

    /// Pending notifications, oldest first.
    pub async fn notifications(&self) -> Vec<Notification> {
        self.notifications.list().await
    }

    /// Dismiss a pending notification, returning whether it existed.
    pub async fn dismiss_notification(&self, id: Uuid) -> bool {
        self.notifications.dismiss(id).await
    }

    /// Store backing this session.
    pub fn store(&self) -> &Arc<dyn TreeStore> {
        &self.store
    }

    /// Sign a player up for one team of a match.
    ///
    /// The roster is read from the local view, extended, and written back whole. Two clients
    /// joining the same roster at once can overwrite each other; the last write wins.
    pub async fn add_player(
        &self,
        match_id: &str,
        request: &JoinRequest,
    ) -> Result<Player, SessionError> {
        let form = request.to_form().map_err(|err| {
            let message = validation_message(&err);
            debug!(match_id, %message, "sign-up form rejected");
            SessionError::InvalidInput(message)
        })?;

        let mut roster = self
            .view
            .read()
            .await
            .roster(match_id, form.team)
            .ok_or_else(|| SessionError::MatchNotFound(match_id.to_string()))?;

        let player = Player::new(form.name, form.phone);
        roster.push(player.clone());

        match self.write_roster(match_id, form.team, &roster).await {
            Ok(()) => {
                info!(match_id, team = %form.team, player_id = %player.id, "player signed up");
                self.view.write().await.expanded_match = Some(match_id.to_string());
                self.notify(NotificationKind::Success, "You are signed up!")
                    .await;
                self.broadcast_board().await;
                Ok(player)
            }
            Err(err) => {
                warn!(match_id, team = %form.team, error = %err, "sign-up write failed");
                self.notify(NotificationKind::Error, format!("Sign-up failed: {err}"))
                    .await;
                Err(err)
            }
        }
    }

    /// Remove a player from a roster. Unknown matches are ignored.
    ///
    /// Same whole-list write as [`BoardSession::add_player`], with the same last-write-wins
    /// behaviour.
    pub async fn remove_player(
        &self,
        match_id: &str,
        team: TeamKey,
        player_id: &str,
    ) -> Result<(), SessionError> {
        let Some(roster) = self.view.read().await.roster(match_id, team) else {
            debug!(match_id, "removal for unknown match ignored");
            return Ok(());
        };

        let roster: Vec<Player> = roster
            .into_iter()
            .filter(|player| player.id != player_id)
            .collect();

        match self.write_roster(match_id, team, &roster).await {
            Ok(()) => {
                info!(match_id, %team, player_id, "player removed");
                self.notify(NotificationKind::Success, "Entry removed!").await;
                Ok(())
            }
            Err(err) => {
                warn!(match_id, %team, error = %err, "removal write failed");
                self.notify(NotificationKind::Error, format!("Removal failed: {err}"))
                    .await;
                Err(err)
            }
        }
    }

    /// Overwrite the whole tree with fresh, empty matches stamped with `today`.
    pub async fn reset(&self, today: &str) -> Result<(), SessionError> {
        let document = serde_json::to_value(fresh_document(&self.settings.slots, today))?;

        match self.store.set_whole_tree(&TreePath::root(), document).await {
            Ok(()) => {
                info!(today, "board reset for the new day");
                self.notify(NotificationKind::Success, "Board reset for the new day!")
                    .await;
                Ok(())
            }
            Err(err) => {
                error!(today, error = %err, "board reset failed");
                self.notify(NotificationKind::Error, format!("Reset failed: {err}"))
                    .await;
                Err(err.into())
            }
        }
    }

    async fn write_roster(
        &self,
        match_id: &str,
        team: TeamKey,
        roster: &[Player],
    ) -> Result<(), SessionError> {
        let entities: Vec<PlayerEntity> = roster.iter().map(PlayerEntity::from).collect();
        let path = TreePath::parse(MATCHES_PATH)
            .child(match_id)
            .child(team.as_str());

        let mut updates = IndexMap::new();
        updates.insert(path, serde_json::to_value(entities)?);
        self.store.merge_update(updates).await?;
        Ok(())
    }

    async fn run_subscription(self: Arc<Self>, watched: Watched) {
        let path = watched.path();
        let mut delay = INITIAL_RESUBSCRIBE_DELAY;

        loop {
            let mut stream = self.store.subscribe(&path);
            while let Some(delivery) = stream.next().await {
                match delivery {
                    Ok(value) => {
                        delay = INITIAL_RESUBSCRIBE_DELAY;
                        match watched {
                            Watched::Matches => self.apply_matches(value).await,
                            Watched::ResetMarker => self.apply_reset_marker(value).await,
                        }
                    }
                    Err(err) => {
                        self.record_read_failure(&path, &err).await;
                        break;
                    }
                }
            }

            debug!(%path, ?delay, "subscription ended; resubscribing after delay");
            sleep(delay).await;
            delay = (delay * 2).min(MAX_RESUBSCRIBE_DELAY);
        }
    }

    async fn apply_matches(&self, value: Option<Value>) {
        let matches = matches_from_snapshot(value);
        {
            let mut view = self.view.write().await;
            debug!(count = matches.len(), "matches snapshot received");
            view.matches = matches;
            view.phase = LoadPhase::Ready;
        }
        self.broadcast_board().await;
    }

    async fn apply_reset_marker(&self, value: Option<Value>) {
        let marker = match value {
            Some(Value::String(marker)) => marker,
            Some(other) => other.to_string(),
            None => String::new(),
        };

        let evaluate = {
            let mut view = self.view.write().await;
            view.last_reset_date = marker.clone();
            view.marker_deliveries += 1;
            self.settings.reset_guard.evaluates(view.marker_deliveries)
        };
        self.broadcast_board().await;

        if !evaluate {
            debug!(%marker, "first marker delivery recorded without reset check");
            return;
        }

        self.evaluate_reset(&marker).await;
    }

    /// Re-check the last delivered marker once the local date has moved on.
    ///
    /// The marker itself does not change at midnight, so no delivery would trigger the check.
    async fn apply_date_rollover(&self, today: &str) {
        let marker = {
            let view = self.view.read().await;
            if view.marker_deliveries == 0 {
                // The first delivery will run the check itself.
                return;
            }
            view.last_reset_date.clone()
        };

        debug!(%marker, today, "local date rolled over");
        self.evaluate_reset(&marker).await;
    }

    async fn evaluate_reset(&self, marker: &str) {
        let today = date_key(self.clock.now());
        if reset_due(marker, &today) {
            info!(marker, %today, "reset marker is stale");
            // Failure is already surfaced as a notification; the next delivery retries.
            let _ = self.reset(&today).await;
        }
    }

    async fn record_read_failure(&self, path: &TreePath, err: &StorageError) {
        warn!(%path, error = %err, "store subscription failed");
        self.view.write().await.phase = LoadPhase::Ready;
        self.notify(
            NotificationKind::Error,
            format!("Failed to load data: {err}"),
        )
        .await;
        self.broadcast_board().await;
    }

    async fn run_countdown(self: Arc<Self>) {
        let mut ticker = interval(self.settings.countdown_interval);
        let mut last_day = date_key(self.clock.now());
        loop {
            ticker.tick().await;
            let now = self.clock.now();
            let countdown = Countdown::until_midnight(now);
            *self.countdown.write().await = countdown;
            let _ = self.events.send(SessionEvent::Countdown(countdown));

            let today = date_key(now);
            if today != last_day {
                self.apply_date_rollover(&today).await;
                last_day = today;
            }
        }
    }

    async fn notify(&self, kind: NotificationKind, message: impl Into<String>) {
        let notification = self.notifications.push(kind, message).await;
        let _ = self.events.send(SessionEvent::Notification(notification));
    }

    async fn broadcast_board(&self) {
        let snapshot = self.snapshot().await;
        let _ = self.events.send(SessionEvent::Board(snapshot));
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use chrono::{NaiveDate, NaiveDateTime};
    use futures::{future::BoxFuture, stream};
    use serde_json::json;
    use tokio::time::{Instant, timeout};

    use super::*;
    use crate::{dao::tree_store::memory::MemoryTreeStore, state::clock::FixedClock};

    const WAIT: Duration = Duration::from_secs(2);
    const POLL: Duration = Duration::from_millis(10);

    fn noon(year: i32, month: u32, day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(year, month, day)
            .and_then(|d| d.and_hms_opt(12, 0, 0))
            .unwrap()
    }

    fn settings(reset_guard: ResetGuard) -> SessionSettings {
        SessionSettings {
            slots: vec![
                MatchSlot::new("match1", "NTPA-13:00"),
                MatchSlot::new("match2", "VTPA-15:00"),
                MatchSlot::new("match3", "VTPa-19:00"),
            ],
            reset_guard,
            countdown_interval: Duration::from_secs(60),
            notification_capacity: 16,
        }
    }

    fn start(store: &MemoryTreeStore, today: NaiveDateTime, guard: ResetGuard) -> SessionHandle {
        BoardSession::start(
            Arc::new(store.clone()),
            Arc::new(FixedClock::new(today)),
            settings(guard),
        )
    }

    fn at(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(year, month, day)
            .and_then(|d| d.and_hms_opt(hour, minute, 0))
            .unwrap()
    }

    fn start_ticking(
        store: &MemoryTreeStore,
        clock: &Arc<FixedClock>,
        guard: ResetGuard,
    ) -> SessionHandle {
        let mut settings = settings(guard);
        settings.countdown_interval = Duration::from_millis(20);
        BoardSession::start(Arc::new(store.clone()), clock.clone(), settings)
    }

    fn current_board() -> Value {
        json!({
            "matches": {
                "match1": {"time": "NTPA-13:00", "team1": [], "team2": []},
                "match2": {"time": "VTPA-15:00", "team1": [], "team2": []}
            },
            "lastResetDate": "2024-01-02"
        })
    }

    fn join(name: &str, phone: &str, team: Option<TeamKey>) -> JoinRequest {
        JoinRequest {
            name: name.into(),
            phone: phone.into(),
            team,
        }
    }

    async fn wait_for_marker(store: &MemoryTreeStore, marker: &str) {
        let deadline = Instant::now() + WAIT;
        while store.document()["lastResetDate"] != json!(marker) {
            assert!(Instant::now() < deadline, "marker never became {marker}");
            sleep(POLL).await;
        }
    }

    async fn wait_for_snapshot(
        session: &BoardSession,
        predicate: impl Fn(&BoardSnapshot) -> bool,
    ) -> BoardSnapshot {
        let deadline = Instant::now() + WAIT;
        loop {
            let snapshot = session.snapshot().await;
            if predicate(&snapshot) {
                return snapshot;
            }
            assert!(Instant::now() < deadline, "board never reached expected state");
            sleep(POLL).await;
        }
    }

    async fn wait_for_roster(session: &BoardSession, match_id: &str, team: TeamKey, len: usize) {
        wait_for_snapshot(session, |snapshot| {
            snapshot
                .matches
                .iter()
                .any(|game| game.id == match_id && game.roster(team).len() == len)
        })
        .await;
    }

    async fn wait_for_notification(
        session: &BoardSession,
        predicate: impl Fn(&Notification) -> bool,
    ) -> Notification {
        let deadline = Instant::now() + WAIT;
        loop {
            if let Some(found) = session.notifications().await.into_iter().find(|n| predicate(n)) {
                return found;
            }
            assert!(Instant::now() < deadline, "notification never queued");
            sleep(POLL).await;
        }
    }

    /// Memory store whose first `matches` subscription fails immediately.
    struct FlakyStore {
        inner: MemoryTreeStore,
        failed: AtomicBool,
    }

    impl TreeStore for FlakyStore {
        fn subscribe(&self, path: &TreePath) -> crate::dao::tree_store::TreeStream {
            if *path == TreePath::parse(MATCHES_PATH) && !self.failed.swap(true, Ordering::SeqCst)
            {
                let err = StorageError::SubscriptionClosed {
                    path: path.to_string(),
                    reason: "permission_denied".into(),
                };
                return stream::iter(vec![Err(err)]).boxed();
            }
            self.inner.subscribe(path)
        }

        fn set_whole_tree(
            &self,
            path: &TreePath,
            value: Value,
        ) -> BoxFuture<'static, crate::dao::storage::StorageResult<()>> {
            self.inner.set_whole_tree(path, value)
        }

        fn merge_update(
            &self,
            updates: IndexMap<TreePath, Value>,
        ) -> BoxFuture<'static, crate::dao::storage::StorageResult<()>> {
            self.inner.merge_update(updates)
        }

        fn health_check(&self) -> BoxFuture<'static, crate::dao::storage::StorageResult<()>> {
            self.inner.health_check()
        }
    }

    #[tokio::test]
    async fn read_failure_is_reported_then_resubscribed() {
        let store = FlakyStore {
            inner: MemoryTreeStore::with_document(current_board()),
            failed: AtomicBool::new(false),
        };
        let handle = BoardSession::start(
            Arc::new(store),
            Arc::new(FixedClock::new(noon(2024, 1, 2))),
            settings(ResetGuard::EveryDelivery),
        );

        let notification = wait_for_notification(&handle, |n| {
            n.message.starts_with("Failed to load data")
        })
        .await;
        assert_eq!(notification.kind, NotificationKind::Error);
        assert!(notification.message.contains("permission_denied"));
        assert_eq!(handle.snapshot().await.phase, LoadPhase::Ready);

        // The retry happens after the initial one second backoff.
        wait_for_snapshot(&handle, |snapshot| snapshot.matches.len() == 2).await;
    }

    #[tokio::test]
    async fn board_resets_once_the_local_date_rolls_over() {
        let mut board = current_board();
        board["matches"]["match1"]["team1"] = json!([{"id": "a", "name": "Ann", "phone": "1"}]);
        let store = MemoryTreeStore::with_document(board);
        let clock = Arc::new(FixedClock::new(at(2024, 1, 2, 23, 59)));
        let handle = start_ticking(&store, &clock, ResetGuard::EveryDelivery);
        wait_for_roster(&handle, "match1", TeamKey::Team1, 1).await;
        wait_for_snapshot(&handle, |snapshot| snapshot.last_reset_date == "2024-01-02").await;
        sleep(Duration::from_millis(60)).await;
        assert_eq!(store.write_count(), 0);

        clock.set(at(2024, 1, 3, 0, 5));

        wait_for_marker(&store, "2024-01-03").await;
        assert_eq!(store.document()["matches"]["match1"]["team1"], json!([]));
        wait_for_roster(&handle, "match1", TeamKey::Team1, 0).await;
        wait_for_notification(&handle, |n| n.message == "Board reset for the new day!").await;

        // Later ticks on the same day see a current marker.
        sleep(Duration::from_millis(100)).await;
        assert_eq!(store.write_count(), 1);
    }

    #[tokio::test]
    async fn rollover_is_checked_even_when_first_delivery_was_skipped() {
        let store = MemoryTreeStore::with_document(current_board());
        let clock = Arc::new(FixedClock::new(at(2024, 1, 2, 23, 59)));
        let handle = start_ticking(&store, &clock, ResetGuard::SkipFirstDelivery);
        wait_for_snapshot(&handle, |snapshot| snapshot.last_reset_date == "2024-01-02").await;

        clock.set(at(2024, 1, 3, 0, 1));

        wait_for_marker(&store, "2024-01-03").await;
    }

    #[tokio::test]
    async fn countdown_follows_the_clock() {
        let store = MemoryTreeStore::with_document(current_board());
        let clock = Arc::new(FixedClock::new(at(2024, 1, 2, 23, 31)));
        let handle = start_ticking(&store, &clock, ResetGuard::EveryDelivery);
        assert_eq!(handle.countdown().await.to_string(), "0ч 29м");

        clock.set(at(2024, 1, 2, 23, 50));

        let deadline = Instant::now() + WAIT;
        while handle.countdown().await != (Countdown { hours: 0, minutes: 10 }) {
            assert!(Instant::now() < deadline, "countdown never refreshed");
            sleep(POLL).await;
        }
        assert_eq!(handle.countdown().await.to_string(), "0ч 10м");
    }

    #[tokio::test]
    async fn stale_marker_resets_the_whole_tree() {
        let store = MemoryTreeStore::with_document(json!({
            "matches": null,
            "lastResetDate": "2024-01-01",
            "leftover": {"keep": false}
        }));
        let handle = start(&store, noon(2024, 1, 2), ResetGuard::EveryDelivery);

        wait_for_marker(&store, "2024-01-02").await;
        assert_eq!(
            store.document(),
            json!({
                "matches": {
                    "match1": {"time": "NTPA-13:00", "team1": [], "team2": []},
                    "match2": {"time": "VTPA-15:00", "team1": [], "team2": []},
                    "match3": {"time": "VTPa-19:00", "team1": [], "team2": []}
                },
                "lastResetDate": "2024-01-02"
            })
        );

        wait_for_snapshot(&handle, |snapshot| snapshot.matches.len() == 3).await;
        wait_for_notification(&handle, |n| {
            n.kind == NotificationKind::Success && n.message.contains("reset")
        })
        .await;
    }

    #[tokio::test]
    async fn reset_wipes_existing_rosters() {
        let store = MemoryTreeStore::with_document(json!({
            "matches": {
                "match1": {"time": "old", "team1": [{"id": "a", "name": "Ann", "phone": "1"}]},
                "match9": {"time": "gone"}
            },
            "lastResetDate": "2023-12-31"
        }));
        let handle = start(&store, noon(2024, 1, 2), ResetGuard::EveryDelivery);

        let snapshot = wait_for_snapshot(&handle, |snapshot| {
            snapshot.last_reset_date == "2024-01-02"
                && snapshot.matches.len() == 3
                && snapshot.matches.iter().all(|m| m.id != "match9")
        })
        .await;

        let ids: Vec<_> = snapshot.matches.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["match1", "match2", "match3"]);
        assert!(snapshot.matches.iter().all(|m| m.player_count() == 0));
        assert_eq!(snapshot.matches[0].time, "NTPA-13:00");
    }

    #[tokio::test]
    async fn current_marker_does_not_reset() {
        let store = MemoryTreeStore::with_document(current_board());
        let handle = start(&store, noon(2024, 1, 2), ResetGuard::EveryDelivery);

        wait_for_snapshot(&handle, |snapshot| snapshot.last_reset_date == "2024-01-02").await;
        sleep(Duration::from_millis(50)).await;
        assert_eq!(store.write_count(), 0);
        assert_eq!(store.document(), current_board());
    }

    #[tokio::test]
    async fn missing_marker_counts_as_stale() {
        let store = MemoryTreeStore::new();
        let _handle = start(&store, noon(2024, 1, 2), ResetGuard::EveryDelivery);

        wait_for_marker(&store, "2024-01-02").await;
        assert_eq!(store.write_count(), 1);
    }

    #[tokio::test]
    async fn skip_first_delivery_waits_for_a_later_change() {
        let store = MemoryTreeStore::with_document(json!({"lastResetDate": "2024-01-01"}));
        let handle = start(&store, noon(2024, 1, 2), ResetGuard::SkipFirstDelivery);

        wait_for_snapshot(&handle, |snapshot| snapshot.last_reset_date == "2024-01-01").await;
        sleep(Duration::from_millis(50)).await;
        assert_eq!(store.write_count(), 0);

        // Another client rewrites the marker with a value that is still stale.
        store
            .set_whole_tree(&TreePath::parse(RESET_MARKER_PATH), json!("2023-12-31"))
            .await
            .unwrap();

        wait_for_marker(&store, "2024-01-02").await;
        assert_eq!(
            store.document()["matches"].as_object().map(|m| m.len()),
            Some(3)
        );
    }

    #[tokio::test]
    async fn failed_reset_is_reported_and_retried_on_next_delivery() {
        let store = MemoryTreeStore::with_document(json!({"lastResetDate": "2024-01-01"}));
        store.fail_writes(Some("permission denied"));
        let handle = start(&store, noon(2024, 1, 2), ResetGuard::EveryDelivery);

        wait_for_notification(&handle, |n| {
            n.kind == NotificationKind::Error && n.message.contains("permission denied")
        })
        .await;
        assert_eq!(store.document(), json!({"lastResetDate": "2024-01-01"}));

        store.fail_writes(None);
        let mut updates = IndexMap::new();
        updates.insert(TreePath::parse(RESET_MARKER_PATH), json!("2023-12-31"));
        store.merge_update(updates).await.unwrap();

        wait_for_marker(&store, "2024-01-02").await;
    }

    #[tokio::test]
    async fn session_becomes_ready_on_empty_matches() {
        let store = MemoryTreeStore::with_document(json!({"lastResetDate": "2024-01-02"}));
        let handle = start(&store, noon(2024, 1, 2), ResetGuard::EveryDelivery);

        let snapshot =
            wait_for_snapshot(&handle, |snapshot| snapshot.phase == LoadPhase::Ready).await;
        assert!(snapshot.matches.is_empty());
    }

    #[tokio::test]
    async fn blank_name_never_reaches_the_store() {
        let store = MemoryTreeStore::with_document(current_board());
        let handle = start(&store, noon(2024, 1, 2), ResetGuard::EveryDelivery);
        wait_for_roster(&handle, "match1", TeamKey::Team1, 0).await;

        let err = handle
            .add_player("match1", &join("   ", "+7 900", Some(TeamKey::Team1)))
            .await
            .unwrap_err();

        assert!(matches!(err, SessionError::InvalidInput(ref message) if message == "enter name"));
        assert_eq!(store.write_count(), 0);
        assert!(handle.notifications().await.is_empty());
    }

    #[tokio::test]
    async fn unknown_match_is_not_found() {
        let store = MemoryTreeStore::with_document(current_board());
        let handle = start(&store, noon(2024, 1, 2), ResetGuard::EveryDelivery);
        wait_for_roster(&handle, "match1", TeamKey::Team1, 0).await;

        let err = handle
            .add_player("match7", &join("Ann", "1", Some(TeamKey::Team1)))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::MatchNotFound(ref id) if id == "match7"));
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn sequential_joins_keep_both_players() {
        let store = MemoryTreeStore::with_document(current_board());
        let handle = start(&store, noon(2024, 1, 2), ResetGuard::EveryDelivery);
        wait_for_roster(&handle, "match1", TeamKey::Team2, 0).await;

        let first = handle
            .add_player("match1", &join(" Ann ", " 111 ", Some(TeamKey::Team2)))
            .await
            .unwrap();
        wait_for_roster(&handle, "match1", TeamKey::Team2, 1).await;
        let second = handle
            .add_player("match1", &join("Bob", "222", Some(TeamKey::Team2)))
            .await
            .unwrap();
        let snapshot = wait_for_snapshot(&handle, |snapshot| {
            snapshot.matches[0].roster(TeamKey::Team2).len() == 2
        })
        .await;

        assert_ne!(first.id, second.id);
        assert_eq!(first.name, "Ann");
        assert_eq!(first.phone, "111");
        assert_eq!(snapshot.matches[0].roster(TeamKey::Team2), &[first, second][..]);
        assert!(snapshot.matches[0].roster(TeamKey::Team1).is_empty());
        assert_eq!(snapshot.expanded_match.as_deref(), Some("match1"));
    }

    #[tokio::test]
    async fn join_then_leave_restores_the_roster() {
        let mut board = current_board();
        board["matches"]["match2"]["team1"] = json!([{"id": "seed", "name": "Sam", "phone": "0"}]);
        let store = MemoryTreeStore::with_document(board.clone());
        let handle = start(&store, noon(2024, 1, 2), ResetGuard::EveryDelivery);
        wait_for_roster(&handle, "match2", TeamKey::Team1, 1).await;

        let player = handle
            .add_player("match2", &join("Ann", "111", Some(TeamKey::Team1)))
            .await
            .unwrap();
        wait_for_roster(&handle, "match2", TeamKey::Team1, 2).await;

        handle
            .remove_player("match2", TeamKey::Team1, &player.id)
            .await
            .unwrap();
        wait_for_roster(&handle, "match2", TeamKey::Team1, 1).await;

        assert_eq!(store.document(), board);
    }

    #[tokio::test]
    async fn removal_from_unknown_match_is_a_no_op() {
        let store = MemoryTreeStore::with_document(current_board());
        let handle = start(&store, noon(2024, 1, 2), ResetGuard::EveryDelivery);
        wait_for_roster(&handle, "match1", TeamKey::Team1, 0).await;

        handle
            .remove_player("nope", TeamKey::Team1, "abc")
            .await
            .unwrap();
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn failed_join_write_is_reported() {
        let store = MemoryTreeStore::with_document(current_board());
        let handle = start(&store, noon(2024, 1, 2), ResetGuard::EveryDelivery);
        wait_for_roster(&handle, "match1", TeamKey::Team1, 0).await;
        store.fail_writes(Some("network down"));

        let err = handle
            .add_player("match1", &join("Ann", "111", Some(TeamKey::Team1)))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Storage(_)));

        let notifications = handle.notifications().await;
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].kind, NotificationKind::Error);
        assert!(notifications[0].message.contains("network down"));
        assert_eq!(handle.snapshot().await.expanded_match, None);
    }

    #[tokio::test]
    async fn events_are_broadcast_to_subscribers() {
        let store = MemoryTreeStore::with_document(current_board());
        let handle = start(&store, noon(2024, 1, 2), ResetGuard::EveryDelivery);
        wait_for_roster(&handle, "match1", TeamKey::Team1, 0).await;
        let mut events = handle.subscribe();

        handle
            .add_player("match1", &join("Ann", "111", Some(TeamKey::Team1)))
            .await
            .unwrap();

        let notification = timeout(WAIT, async {
            loop {
                if let Ok(SessionEvent::Notification(notification)) = events.recv().await {
                    break notification;
                }
            }
        })
        .await
        .expect("notification event");
        assert_eq!(notification.kind, NotificationKind::Success);
    }

    #[tokio::test]
    async fn dropping_the_handle_stops_the_session() {
        let store = MemoryTreeStore::with_document(current_board());
        let handle = start(&store, noon(2024, 1, 2), ResetGuard::EveryDelivery);
        let session = handle.session().clone();
        wait_for_roster(&session, "match1", TeamKey::Team1, 0).await;

        drop(handle);
        let deadline = Instant::now() + WAIT;
        while Arc::strong_count(&session) > 1 {
            assert!(Instant::now() < deadline, "session tasks still running");
            sleep(POLL).await;
        }

        store
            .set_whole_tree(&TreePath::parse(MATCHES_PATH), Value::Null)
            .await
            .unwrap();
        sleep(Duration::from_millis(50)).await;
        assert_eq!(session.snapshot().await.matches.len(), 2);
    }
}
