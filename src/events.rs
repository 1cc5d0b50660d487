// Market events: every state change is logged through tracing and kept in a
// bounded in-process log for the audit/query layer.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Amount, MarketId, Side, StakeId, Timestamp};

/// Number of events kept before the oldest are dropped
pub const EVENT_LOG_CAPACITY: usize = 1000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MarketEvent {
    MarketCreated {
        market_id: MarketId,
        creator: String,
        question: String,
        deadline: Timestamp,
    },
    StakePlaced {
        market_id: MarketId,
        stake_id: StakeId,
        staker: String,
        side: Side,
        amount: Amount,
        timestamp_guess: Timestamp,
    },
    BountyClaimVerified {
        market_id: MarketId,
        claimant: String,
        actual_timestamp: Timestamp,
    },
    MarketResolved {
        market_id: MarketId,
        correct_answer: Side,
        actual_timestamp: Timestamp,
    },
    WinningsPaid {
        market_id: MarketId,
        stake_id: StakeId,
        staker: String,
        amount: Amount,
    },
    BountyPaid {
        market_id: MarketId,
        claimant: String,
        amount: Amount,
    },
    AdminChanged {
        previous: String,
        new: String,
    },
}

impl MarketEvent {
    pub fn market_id(&self) -> Option<MarketId> {
        match self {
            MarketEvent::MarketCreated { market_id, .. }
            | MarketEvent::StakePlaced { market_id, .. }
            | MarketEvent::BountyClaimVerified { market_id, .. }
            | MarketEvent::MarketResolved { market_id, .. }
            | MarketEvent::WinningsPaid { market_id, .. }
            | MarketEvent::BountyPaid { market_id, .. } => Some(*market_id),
            MarketEvent::AdminChanged { .. } => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            MarketEvent::MarketCreated { .. } => "MarketCreated",
            MarketEvent::StakePlaced { .. } => "StakePlaced",
            MarketEvent::BountyClaimVerified { .. } => "BountyClaimVerified",
            MarketEvent::MarketResolved { .. } => "MarketResolved",
            MarketEvent::WinningsPaid { .. } => "WinningsPaid",
            MarketEvent::BountyPaid { .. } => "BountyPaid",
            MarketEvent::AdminChanged { .. } => "AdminChanged",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordedEvent {
    pub id: String,
    pub recorded_at: Timestamp,
    #[serde(flatten)]
    pub event: MarketEvent,
}

#[derive(Debug)]
pub struct EventLog {
    entries: Mutex<VecDeque<RecordedEvent>>,
    capacity: usize,
}

impl Default for EventLog {
    fn default() -> Self {
        Self::with_capacity(EVENT_LOG_CAPACITY)
    }
}

impl EventLog {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity.min(EVENT_LOG_CAPACITY))),
            capacity: capacity.max(1),
        }
    }

    pub fn record(&self, event: MarketEvent, now: Timestamp) {
        tracing::info!(event = event.name(), market_id = ?event.market_id(), "{:?}", event);

        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(RecordedEvent {
            id: Uuid::new_v4().to_string(),
            recorded_at: now,
            event,
        });
    }

    /// Most recent `limit` events, oldest first
    pub fn recent(&self, limit: usize) -> Vec<RecordedEvent> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let skip = entries.len().saturating_sub(limit);
        entries.iter().skip(skip).cloned().collect()
    }

    pub fn for_market(&self, market_id: MarketId) -> Vec<MarketEvent> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries
            .iter()
            .filter(|e| e.event.market_id() == Some(market_id))
            .map(|e| e.event.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
