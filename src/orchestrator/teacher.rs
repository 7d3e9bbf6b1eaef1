//! Teacher console: token display, countdown and live roster.

use super::{AttendanceToken, ConsoleError};
use crate::backend::{AttendanceBackend, RosterEntry, SessionId};
use crate::clock::{format_remaining, ClockEvent, TokenClock};
use crate::metrics::MetricsRegistry;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

/// What the token panel currently shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenDisplay {
    /// Nothing issued yet.
    Idle,
    /// A request is in flight; the previous token is already cleared.
    Requesting,
    Live {
        token: AttendanceToken,
        remaining_secs: u64,
    },
    /// The countdown ran out and the code was cleared.
    Expired,
}

/// Something the teacher console reacted to in [`TeacherConsole::next_event`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeacherEvent {
    Countdown { remaining_secs: u64 },
    TokenExpired,
    /// The roster was reloaded, or the reload failed and the last one is kept.
    RosterRefreshed { refreshed: bool },
}

/// State and commands behind the teacher dashboard.
///
/// Owns the token clock. The clock is stopped and the display cleared
/// before every issue request, so a superseded token never keeps counting.
pub struct TeacherConsole {
    backend: Arc<dyn AttendanceBackend>,
    clock: TokenClock,
    display: TokenDisplay,
    watched: Option<SessionId>,
    roster: Vec<RosterEntry>,
    refresh_every: Duration,
    refresh: Option<Interval>,
    metrics: Option<MetricsRegistry>,
}

/// Shortest roster refresh period.
const MIN_REFRESH: Duration = Duration::from_secs(1);

impl TeacherConsole {
    /// `refresh_every` is raised to one second if shorter.
    pub fn new(backend: Arc<dyn AttendanceBackend>, refresh_every: Duration) -> Self {
        Self {
            backend,
            clock: TokenClock::new(),
            display: TokenDisplay::Idle,
            watched: None,
            roster: Vec::new(),
            refresh_every: refresh_every.max(MIN_REFRESH),
            refresh: None,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: MetricsRegistry) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn display(&self) -> &TokenDisplay {
        &self.display
    }

    /// The token on screen, if any.
    pub fn token(&self) -> Option<&AttendanceToken> {
        match &self.display {
            TokenDisplay::Live { token, .. } => Some(token),
            _ => None,
        }
    }

    /// Text of the expiry label.
    pub fn expiry_label(&self) -> Option<String> {
        match &self.display {
            TokenDisplay::Live { remaining_secs, .. } => {
                Some(format!("Expires in: {}", format_remaining(*remaining_secs)))
            }
            TokenDisplay::Expired => Some("Expired".to_string()),
            _ => None,
        }
    }

    /// Generation is offered whenever no request is in flight.
    pub fn can_generate(&self) -> bool {
        self.display != TokenDisplay::Requesting
    }

    /// Session whose roster is being refreshed.
    pub fn watched_session(&self) -> Option<SessionId> {
        self.watched
    }

    /// Last roster loaded for the watched session.
    pub fn roster(&self) -> &[RosterEntry] {
        &self.roster
    }

    /// Requests a new token for `session_id` and puts it on screen.
    ///
    /// On failure the panel is left empty and generation stays available.
    pub async fn generate_token(
        &mut self,
        session_id: SessionId,
        subject: Option<&str>,
    ) -> Result<AttendanceToken, ConsoleError> {
        self.clock.stop();
        self.display = TokenDisplay::Requesting;

        let issued = match self.backend.issue_token(session_id, subject).await {
            Ok(issued) => issued,
            Err(e) => {
                tracing::warn!(session = %session_id, error = %e, "token request failed");
                self.display = TokenDisplay::Idle;
                return Err(e.into());
            }
        };

        let token = AttendanceToken::from_issued(issued, session_id, Utc::now());
        tracing::info!(
            session = %session_id,
            ttl_secs = token.ttl_secs,
            has_manual_code = token.manual_code.is_some(),
            "attendance token issued"
        );
        if let Some(metrics) = &self.metrics {
            metrics.record_token_issued();
        }

        self.clock.start(token.ttl_secs);
        self.watch(session_id);
        let remaining_secs = token.ttl_secs;
        self.display = TokenDisplay::Live {
            token: token.clone(),
            remaining_secs,
        };
        Ok(token)
    }

    /// Starts periodic roster refreshes for `session_id`.
    ///
    /// Watching the same session again keeps the running schedule.
    pub fn watch(&mut self, session_id: SessionId) {
        if self.watched == Some(session_id) && self.refresh.is_some() {
            return;
        }
        let mut refresh = interval_at(Instant::now() + self.refresh_every, self.refresh_every);
        refresh.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.refresh = Some(refresh);
        if self.watched != Some(session_id) {
            self.roster.clear();
        }
        self.watched = Some(session_id);
    }

    /// Reloads the roster of the watched session.
    pub async fn refresh_roster(&mut self) -> Result<&[RosterEntry], ConsoleError> {
        let session_id = self.watched.ok_or(ConsoleError::NoSessionSelected)?;
        self.roster = self.backend.session_roster(session_id).await?;
        tracing::debug!(session = %session_id, entries = self.roster.len(), "roster refreshed");
        Ok(&self.roster)
    }

    /// Waits for the next countdown tick, expiry or roster refresh and
    /// applies it.
    ///
    /// Returns `None` when there is nothing left to wait for.
    pub async fn next_event(&mut self) -> Option<TeacherEvent> {
        if !self.clock.is_running() && self.refresh.is_none() {
            return None;
        }

        tokio::select! {
            Some(event) = self.clock.next_event() => Some(self.apply(event)),
            () = refresh_tick(&mut self.refresh) => {
                let refreshed = match self.refresh_roster().await {
                    Ok(_) => true,
                    Err(e) => {
                        tracing::warn!(error = %e, "roster refresh failed, keeping last roster");
                        if let Some(metrics) = &self.metrics {
                            metrics.record_refresh_failure();
                        }
                        false
                    }
                };
                Some(TeacherEvent::RosterRefreshed { refreshed })
            }
        }
    }

    fn apply(&mut self, event: ClockEvent) -> TeacherEvent {
        match event {
            ClockEvent::Tick { remaining_secs } => {
                if let TokenDisplay::Live {
                    remaining_secs: shown,
                    ..
                } = &mut self.display
                {
                    *shown = remaining_secs;
                }
                TeacherEvent::Countdown { remaining_secs }
            }
            ClockEvent::Expired => {
                if let Some(token) = self.token() {
                    tracing::info!(session = %token.session_id, "attendance token expired");
                }
                self.display = TokenDisplay::Expired;
                if let Some(metrics) = &self.metrics {
                    metrics.record_token_expired();
                }
                TeacherEvent::TokenExpired
            }
        }
    }

    /// Clears the display and stops the countdown and roster refreshes.
    pub fn close(&mut self) {
        self.clock.stop();
        self.refresh = None;
        self.display = TokenDisplay::Idle;
    }
}

async fn refresh_tick(refresh: &mut Option<Interval>) {
    match refresh {
        Some(refresh) => {
            refresh.tick().await;
        }
        None => std::future::pending().await,
    }
}

impl std::fmt::Debug for TeacherConsole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TeacherConsole")
            .field("display", &self.display)
            .field("watched", &self.watched)
            .field("roster", &self.roster.len())
            .finish()
    }
}
