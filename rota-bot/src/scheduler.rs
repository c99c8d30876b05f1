//! The weekly rotation cycle.
//!
//! One [`Scheduler`] owns the rotation state for a channel. A cycle runs
//! reconcile → roster → assign → announce → persist; the in-memory state
//! only moves forward once the new state is on disk. Triggers that arrive
//! while a cycle is running are dropped.

use std::sync::Arc;

use chrono::{FixedOffset, Utc};
use parking_lot::{Mutex, RwLock};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{RngCore, SeedableRng};
use rota_sdk::{Gateway, MessageRef};
use serde::Serialize;

use crate::announce;
use crate::groups::{Group, GroupTable};
use crate::locations::LocationPool;
use crate::reconcile;
use crate::roster::Membership;
use crate::rotation::{self, RotationState};
use crate::store::{StateStore, StoreError};
use crate::timer::{self, WeeklySchedule};

/// Where the scheduler currently is within a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Reconciling,
    RosterBuilding,
    Assigning,
    Announcing,
    Persisting,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Idle => write!(f, "idle"),
            Phase::Reconciling => write!(f, "reconciling"),
            Phase::RosterBuilding => write!(f, "roster_building"),
            Phase::Assigning => write!(f, "assigning"),
            Phase::Announcing => write!(f, "announcing"),
            Phase::Persisting => write!(f, "persisting"),
        }
    }
}

/// A cycle that stopped before committing. State is unchanged.
#[derive(Debug, thiserror::Error)]
pub enum CycleError {
    #[error("failed to build roster: {0}")]
    Roster(#[source] rota_sdk::Error),
    #[error("failed to post announcement: {0}")]
    Announce(#[source] rota_sdk::Error),
    /// The announcement was posted but the new state could not be saved.
    #[error("failed to persist rotation state after posting {announcement}: {source}")]
    Persist {
        announcement: MessageRef,
        #[source]
        source: StoreError,
    },
}

/// What a committed cycle did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub group: Group,
    pub assigned: usize,
    /// Unfinished tasks carried over from the previous week.
    pub incomplete: usize,
    pub streak: u32,
    pub announcement: MessageRef,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    Completed(CycleReport),
    /// Another cycle held the run lock; this trigger was dropped.
    AlreadyRunning,
}

/// Point-in-time view for health reporting.
#[derive(Debug, Clone, Serialize)]
pub struct Status {
    pub phase: Phase,
    pub period_counter: i64,
    pub streak: u32,
    pub pending_tasks: usize,
}

pub struct Scheduler {
    gateway: Arc<dyn Gateway>,
    membership: Membership,
    pool: LocationPool,
    thanks: Vec<String>,
    channel: String,
    /// Offset the month filter reads the calendar in.
    utc_offset: FixedOffset,
    store: StateStore,
    /// Last committed state.
    state: RwLock<RotationState>,
    /// Held for the whole cycle; guards the rng used for thanks and shuffle.
    run: tokio::sync::Mutex<Box<dyn RngCore + Send>>,
    phase: Mutex<Phase>,
}

impl Scheduler {
    /// Load the committed state from `store` and set up a scheduler for
    /// `channel`.
    pub fn open(
        gateway: Arc<dyn Gateway>,
        table: GroupTable,
        pool: LocationPool,
        store: StateStore,
        channel: impl Into<String>,
    ) -> Result<Self, StoreError> {
        let state = store.load()?;
        let channel = channel.into();
        tracing::info!(
            channel = %channel,
            period_counter = state.period_counter,
            streak = state.streak,
            tasks = state.tasks.len(),
            "Loaded rotation state"
        );
        Ok(Self {
            membership: Membership::new(gateway.clone(), table),
            gateway,
            pool,
            thanks: announce::default_thanks(),
            channel,
            utc_offset: WeeklySchedule::default().utc_offset,
            store,
            state: RwLock::new(state),
            run: tokio::sync::Mutex::new(Box::new(StdRng::from_entropy())),
            phase: Mutex::new(Phase::Idle),
        })
    }

    /// Replace the thank-you catalog. An empty list keeps the built-in one.
    pub fn with_thanks(mut self, thanks: Vec<String>) -> Self {
        if !thanks.is_empty() {
            self.thanks = thanks;
        }
        self
    }

    /// Read the calendar for the month filter at this offset, normally the
    /// one the weekly schedule is expressed in.
    pub fn with_utc_offset(mut self, utc_offset: FixedOffset) -> Self {
        self.utc_offset = utc_offset;
        self
    }

    pub fn with_rng(mut self, rng: impl RngCore + Send + 'static) -> Self {
        self.run = tokio::sync::Mutex::new(Box::new(rng));
        self
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn gateway(&self) -> &Arc<dyn Gateway> {
        &self.gateway
    }

    pub fn membership(&self) -> &Membership {
        &self.membership
    }

    pub fn phase(&self) -> Phase {
        *self.phase.lock()
    }

    /// A copy of the last committed state.
    pub fn state(&self) -> RotationState {
        self.state.read().clone()
    }

    pub fn status(&self) -> Status {
        let state = self.state.read();
        Status {
            phase: self.phase(),
            period_counter: state.period_counter,
            streak: state.streak,
            pending_tasks: state.tasks.len(),
        }
    }

    fn set_phase(&self, phase: Phase) {
        tracing::debug!(%phase, "Cycle phase");
        *self.phase.lock() = phase;
    }

    /// Run one cycle unless one is already in flight.
    pub async fn run_cycle(&self) -> Result<CycleOutcome, CycleError> {
        let Ok(mut rng) = self.run.try_lock() else {
            return Ok(CycleOutcome::AlreadyRunning);
        };
        let result = self.cycle(&mut **rng).await;
        self.set_phase(Phase::Idle);
        result.map(CycleOutcome::Completed)
    }

    /// Run a cycle and log how it went. `source` names the trigger.
    pub async fn trigger(&self, source: &str) {
        match self.run_cycle().await {
            Ok(CycleOutcome::Completed(report)) => tracing::info!(
                source,
                group = %report.group,
                assigned = report.assigned,
                incomplete = report.incomplete,
                streak = report.streak,
                announcement = %report.announcement,
                "Rotation cycle complete"
            ),
            Ok(CycleOutcome::AlreadyRunning) => {
                tracing::info!(source, "Rotation cycle already running, trigger skipped")
            }
            Err(e) => {
                tracing::error!(source, error = %e, "Rotation cycle aborted, state unchanged")
            }
        }
    }

    async fn cycle(&self, rng: &mut (dyn RngCore + Send)) -> Result<CycleReport, CycleError> {
        let previous = self.state();

        self.set_phase(Phase::Reconciling);
        let remaining = reconcile::reconcile(
            self.gateway.as_ref(),
            &self.channel,
            previous.tasks.clone(),
            previous.last_announcement.as_ref(),
        )
        .await;
        let incomplete = rotation::incomplete(&remaining);
        let streak = rotation::next_streak(previous.streak, incomplete.len());
        let thanks = self
            .thanks
            .choose(&mut *rng)
            .map(String::as_str)
            .unwrap_or(announce::DEFAULT_THANKS[0]);
        let notice = announce::notice(&incomplete, streak, thanks);

        self.set_phase(Phase::RosterBuilding);
        let roster = self
            .membership
            .refresh(&self.channel)
            .await
            .map_err(CycleError::Roster)?;

        self.set_phase(Phase::Assigning);
        let (group, period_counter) = rotation::advance(previous.period_counter);
        let today = timer::local_date(Utc::now(), self.utc_offset);
        let mut locations = self.pool.locations(today);
        rotation::shuffle(&mut locations, &mut *rng);
        let members = roster.group(group);
        let tasks = rotation::assign(&members, &locations);
        if members.len() > locations.len() {
            tracing::info!(
                %group,
                members = members.len(),
                locations = locations.len(),
                "More members than locations, some members get no task this week"
            );
        }

        self.set_phase(Phase::Announcing);
        let text = announce::announcement(&notice, &announce::assignment(group, &tasks));
        let announcement = self
            .gateway
            .post_message(&self.channel, &text)
            .await
            .map_err(CycleError::Announce)?;

        self.set_phase(Phase::Persisting);
        let next = RotationState {
            period_counter,
            tasks,
            streak,
            last_announcement: Some(announcement.clone()),
        };
        if let Err(source) = self.store.save(&next) {
            tracing::error!(
                channel = %self.channel,
                announcement = %announcement,
                error = %source,
                "Announcement posted but state not saved, delete it before the next cycle"
            );
            return Err(CycleError::Persist {
                announcement,
                source,
            });
        }

        let report = CycleReport {
            group,
            assigned: next.tasks.len(),
            incomplete: incomplete.len(),
            streak,
            announcement,
        };
        *self.state.write() = next;
        Ok(report)
    }
}
