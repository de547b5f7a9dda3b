//! Staff user record and its typed partial updates.

use serde::{Deserialize, Serialize};

use crate::models::reputation::ReputationLogEntry;

/// Current layout version of [`UserRecord`].
pub const USER_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct LoaStatus {
    pub is_active: bool,
    /// Epoch milliseconds the leave started.
    pub since: Option<i64>,
    pub reason: Option<String>,
}

impl LoaStatus {
    pub fn active(since: i64, reason: impl Into<String>) -> Self {
        Self {
            is_active: true,
            since: Some(since),
            reason: Some(reason.into()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub user_id: String,
    pub schema_version: u32,
    pub positive_rep: u32,
    pub negative_rep: u32,
    /// Chronological, append-only.
    pub reputation_history: Vec<ReputationLogEntry>,
    pub loa_status: LoaStatus,
}

impl UserRecord {
    /// A fully defaulted record for a user seen for the first time.
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            schema_version: USER_SCHEMA_VERSION,
            positive_rep: 0,
            negative_rep: 0,
            reputation_history: Vec::new(),
            loa_status: LoaStatus::default(),
        }
    }

    /// Merge a partial update. Only fields set on `update` change.
    pub fn apply(&mut self, update: UserUpdate) {
        if let Some(positive_rep) = update.positive_rep {
            self.positive_rep = positive_rep;
        }
        if let Some(negative_rep) = update.negative_rep {
            self.negative_rep = negative_rep;
        }
        if let Some(history) = update.reputation_history {
            self.reputation_history = history;
        }
        if let Some(loa_status) = update.loa_status {
            self.loa_status = loa_status;
        }
    }

    /// Apply signed deltas to both counters, saturating at zero.
    pub fn adjust_counters(&mut self, delta: CounterDelta) {
        self.positive_rep = saturating_add(self.positive_rep, delta.positive);
        self.negative_rep = saturating_add(self.negative_rep, delta.negative);
    }

    pub fn apply_mutation(&mut self, mutation: UserMutation) {
        match mutation {
            UserMutation::Update(update) => self.apply(update),
            UserMutation::AdjustCounters(delta) => self.adjust_counters(delta),
            UserMutation::AppendLog(entry) => self.reputation_history.push(entry),
        }
    }

    /// History view with the most recent entry first.
    pub fn history_newest_first(&self) -> impl Iterator<Item = &ReputationLogEntry> {
        self.reputation_history.iter().rev()
    }
}

fn saturating_add(current: u32, delta: i64) -> u32 {
    (i64::from(current).saturating_add(delta)).clamp(0, i64::from(u32::MAX)) as u32
}

/// Typed partial update. `None` means "leave unchanged".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserUpdate {
    pub positive_rep: Option<u32>,
    pub negative_rep: Option<u32>,
    pub reputation_history: Option<Vec<ReputationLogEntry>>,
    pub loa_status: Option<LoaStatus>,
}

impl UserUpdate {
    pub fn reset_counters() -> Self {
        Self {
            positive_rep: Some(0),
            negative_rep: Some(0),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterDelta {
    pub positive: i64,
    pub negative: i64,
}

/// One step of a store transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserMutation {
    Update(UserUpdate),
    AdjustCounters(CounterDelta),
    AppendLog(ReputationLogEntry),
}

/// Numeric fields a leaderboard can be ranked by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaderboardField {
    PositiveRep,
    NegativeRep,
}

impl LeaderboardField {
    /// Accepts both the camelCase field names used by the command layer
    /// and the snake_case column names. Anything else is not numeric.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "positiveRep" | "positive_rep" => Some(LeaderboardField::PositiveRep),
            "negativeRep" | "negative_rep" => Some(LeaderboardField::NegativeRep),
            _ => None,
        }
    }

    pub fn column(&self) -> &'static str {
        match self {
            LeaderboardField::PositiveRep => "positive_rep",
            LeaderboardField::NegativeRep => "negative_rep",
        }
    }

    pub fn value(&self, record: &UserRecord) -> u32 {
        match self {
            LeaderboardField::PositiveRep => record.positive_rep,
            LeaderboardField::NegativeRep => record.negative_rep,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::reputation::ReputationAction;

    fn entry(action: ReputationAction) -> ReputationLogEntry {
        ReputationLogEntry {
            timestamp: 1,
            moderator_id: "mod".into(),
            action,
            amount: 1,
            reason: "r".into(),
        }
    }

    #[test]
    fn new_record_is_fully_defaulted() {
        let record = UserRecord::new("123");
        assert_eq!(record.user_id, "123");
        assert_eq!(record.schema_version, USER_SCHEMA_VERSION);
        assert_eq!(record.positive_rep, 0);
        assert_eq!(record.negative_rep, 0);
        assert!(record.reputation_history.is_empty());
        assert!(!record.loa_status.is_active);
    }

    #[test]
    fn apply_only_touches_set_fields() {
        let mut record = UserRecord::new("1");
        record.negative_rep = 4;
        record.apply(UserUpdate {
            positive_rep: Some(7),
            ..Default::default()
        });
        assert_eq!(record.positive_rep, 7);
        assert_eq!(record.negative_rep, 4);
    }

    #[test]
    fn counters_saturate_at_zero() {
        let mut record = UserRecord::new("1");
        record.positive_rep = 3;
        record.adjust_counters(CounterDelta {
            positive: -10,
            negative: i64::MIN,
        });
        assert_eq!(record.positive_rep, 0);
        assert_eq!(record.negative_rep, 0);

        record.adjust_counters(CounterDelta {
            positive: i64::MAX,
            negative: 2,
        });
        assert_eq!(record.positive_rep, u32::MAX);
        assert_eq!(record.negative_rep, 2);
    }

    #[test]
    fn newest_first_reverses_history() {
        let mut record = UserRecord::new("1");
        record.apply_mutation(UserMutation::AppendLog(entry(ReputationAction::AddPos)));
        record.apply_mutation(UserMutation::AppendLog(entry(ReputationAction::Promote)));
        let actions: Vec<_> = record.history_newest_first().map(|e| e.action).collect();
        assert_eq!(actions, vec![ReputationAction::Promote, ReputationAction::AddPos]);
    }

    #[test]
    fn leaderboard_field_parsing() {
        assert_eq!(
            LeaderboardField::parse("positiveRep"),
            Some(LeaderboardField::PositiveRep)
        );
        assert_eq!(
            LeaderboardField::parse("negative_rep"),
            Some(LeaderboardField::NegativeRep)
        );
        assert_eq!(LeaderboardField::parse("userId"), None);
        assert_eq!(LeaderboardField::parse("loaStatus"), None);
    }

    #[test]
    fn json_layout_uses_camel_case() {
        let record = UserRecord::new("9");
        let value = serde_json::to_value(&record).unwrap();
        assert!(value.get("positiveRep").is_some());
        assert!(value.get("loaStatus").unwrap().get("isActive").is_some());
    }
}
