//! Global block session: start, stop, extend and lazy expiry

use chrono::{DateTime, Local};
use focusguard_api::{BlockSession, BlockState, Remaining};
use focusguard_config::BlockingMode;
use focusguard_store::Store;
use focusguard_util::{
    add_minutes, whole_minutes_between, FocusError, Result, MAX_DURATION_MINUTES,
};
use std::sync::Arc;
use tracing::{debug, info};

use crate::alarms::{Alarms, STOP_BLOCKING_ALARM};

/// Accept a block length of 1 to 1440 minutes
pub fn validate_block_duration(minutes: i64) -> Result<u32> {
    match u32::try_from(minutes) {
        Ok(m) if (1..=MAX_DURATION_MINUTES).contains(&m) => Ok(m),
        _ => Err(FocusError::invalid_duration(format!(
            "{} is not between 1 and {} minutes",
            minutes, MAX_DURATION_MINUTES
        ))),
    }
}

/// Interpret a stored session without looking at the clock
pub fn classify(session: &BlockSession) -> BlockState {
    match (session.is_blocking, session.block_until) {
        (false, _) => BlockState::Inactive,
        (true, None) => BlockState::ActiveIndefinite,
        (true, Some(until)) => BlockState::ActiveTimed { until },
    }
}

/// A block state read, and whether reading it ended an overdue timed block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockReading {
    pub state: BlockState,
    pub expired: bool,
}

#[derive(Clone)]
pub struct BlockController {
    store: Arc<dyn Store>,
    alarms: Arc<dyn Alarms>,
    mode: BlockingMode,
}

impl BlockController {
    pub fn new(store: Arc<dyn Store>, alarms: Arc<dyn Alarms>, mode: BlockingMode) -> Self {
        Self {
            store,
            alarms,
            mode,
        }
    }

    pub fn mode(&self) -> BlockingMode {
        self.mode
    }

    /// Where stop and expiry land
    fn resting_session(&self) -> BlockSession {
        match self.mode {
            BlockingMode::Toggle => BlockSession::inactive(),
            BlockingMode::AlwaysOn => BlockSession::indefinite(),
        }
    }

    fn persist(&self, session: &BlockSession) -> Result<BlockState> {
        self.store.set_block_session(session)?;
        Ok(classify(session))
    }

    /// Read the block state, ending a timed block whose end has passed
    pub fn observe(&self, now: DateTime<Local>) -> Result<BlockReading> {
        let session = self.store.get_block_session()?;

        match classify(&session) {
            BlockState::ActiveTimed { until } if until <= now => {
                let state = self.persist(&self.resting_session())?;
                self.alarms.cancel(STOP_BLOCKING_ALARM);
                info!(until = %until, "Timed block expired");
                Ok(BlockReading {
                    state,
                    expired: true,
                })
            }
            state => Ok(BlockReading {
                state,
                expired: false,
            }),
        }
    }

    pub fn state(&self, now: DateTime<Local>) -> Result<BlockState> {
        Ok(self.observe(now)?.state)
    }

    /// Block for `minutes` from now, replacing whatever was running
    pub fn start(&self, minutes: i64, now: DateTime<Local>) -> Result<BlockState> {
        let minutes = validate_block_duration(minutes)?;
        let until = add_minutes(now, minutes);

        let state = self.persist(&BlockSession::until(until))?;
        self.alarms.schedule(STOP_BLOCKING_ALARM, until);

        info!(minutes, until = %until, "Blocking started");
        Ok(state)
    }

    pub fn stop(&self, _now: DateTime<Local>) -> Result<BlockState> {
        let state = self.persist(&self.resting_session())?;
        self.alarms.cancel(STOP_BLOCKING_ALARM);

        info!(state = ?state, "Blocking stopped");
        Ok(state)
    }

    /// Push a timed block further out. Starts one if nothing is running;
    /// an indefinite block is left alone.
    pub fn extend(&self, minutes: i64, now: DateTime<Local>) -> Result<BlockState> {
        let valid = validate_block_duration(minutes)?;

        match self.state(now)? {
            BlockState::Inactive => self.start(minutes, now),
            BlockState::ActiveIndefinite => {
                debug!("Extend ignored for indefinite block");
                Ok(BlockState::ActiveIndefinite)
            }
            BlockState::ActiveTimed { until } => {
                let new_until = add_minutes(until, valid);
                let state = self.persist(&BlockSession::until(new_until))?;
                self.alarms.schedule(STOP_BLOCKING_ALARM, new_until);

                info!(minutes = valid, until = %new_until, "Blocking extended");
                Ok(state)
            }
        }
    }

    /// The scheduled wake-up fired
    pub fn on_alarm(&self, now: DateTime<Local>) -> Result<BlockReading> {
        self.observe(now)
    }

    /// Apply the blocking mode and re-arm the wake-up for a pending timed block
    pub fn on_startup(&self, now: DateTime<Local>) -> Result<BlockState> {
        if self.mode == BlockingMode::AlwaysOn {
            let session = self.store.get_block_session()?;
            // A timed block still running is kept; it falls back to indefinite on expiry
            let keep = matches!(classify(&session), BlockState::ActiveTimed { until } if until > now);
            if !keep {
                let state = self.persist(&BlockSession::indefinite())?;
                info!("Always-on blocking enforced");
                return Ok(state);
            }
        }

        let state = self.state(now)?;
        if let BlockState::ActiveTimed { until } = state {
            self.alarms.schedule(STOP_BLOCKING_ALARM, until);
            debug!(until = %until, "Re-armed stop-blocking wake-up");
        }
        Ok(state)
    }

    pub fn remaining_minutes(&self, now: DateTime<Local>) -> Result<Remaining> {
        Ok(match self.state(now)? {
            BlockState::Inactive => Remaining::Minutes(0),
            BlockState::ActiveIndefinite => Remaining::Unlimited,
            BlockState::ActiveTimed { until } => {
                Remaining::Minutes(whole_minutes_between(now, until))
            }
        })
    }
}
