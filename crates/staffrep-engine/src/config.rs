//! Staff workflow configuration.
//!
//! Loaded once from JSON and shared read-only by every component.

use std::path::Path;

use serde::{Deserialize, Serialize};
use staffrep_core::error::{StaffError, StaffResult};
use staffrep_core::models::hierarchy::Hierarchy;
use staffrep_core::models::member::Member;

/// Positive points that trigger a promotion request.
pub const PROMOTION_THRESHOLD: u32 = 10;
/// Negative points that trigger a demotion request.
pub const DEMOTION_THRESHOLD: u32 = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffConfig {
    /// Users authorized for every staff action regardless of roles.
    #[serde(default)]
    pub developer_ids: Vec<String>,
    pub roles: RoleConfig,
    pub channels: ChannelConfig,
    #[serde(default)]
    pub thresholds: Thresholds,
    #[serde(default)]
    pub role_change: RoleChangePolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleConfig {
    /// Role whose holders may resolve staff requests.
    pub manager: String,
    pub staff_hierarchy: Hierarchy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelConfig {
    /// Where approval prompts are posted.
    pub management: String,
    /// Where completed rank changes are announced.
    pub log: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct Thresholds {
    pub promotion: u32,
    pub demotion: u32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            promotion: PROMOTION_THRESHOLD,
            demotion: DEMOTION_THRESHOLD,
        }
    }
}

/// Retry behaviour for the grant half of a role swap.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct RoleChangePolicy {
    /// Extra grant attempts after the first one fails.
    pub grant_retries: u32,
    /// Delay before retry `n` is `n * retry_backoff_ms`.
    pub retry_backoff_ms: u64,
}

impl Default for RoleChangePolicy {
    fn default() -> Self {
        Self {
            grant_retries: 3,
            retry_backoff_ms: 250,
        }
    }
}

impl StaffConfig {
    pub fn from_json_str(json: &str) -> StaffResult<Self> {
        let config: StaffConfig =
            serde_json::from_str(json).map_err(|e| StaffError::Config(e.to_string()))?;
        if config.roles.staff_hierarchy.is_empty() {
            return Err(StaffError::Config("staff hierarchy is empty".into()));
        }
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> StaffResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| StaffError::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_json_str(&json)
    }

    pub fn hierarchy(&self) -> &Hierarchy {
        &self.roles.staff_hierarchy
    }

    /// Developers and holders of the manager role may resolve requests.
    pub fn is_authorized(&self, member: &Member) -> bool {
        self.developer_ids.iter().any(|id| *id == member.id) || member.has_role(&self.roles.manager)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "developerIds": ["1"],
        "roles": {
            "manager": "mgr",
            "staffHierarchy": [
                { "id": "admin", "name": "Admin", "rank": 2 },
                { "id": "trainee", "name": "Trainee", "rank": 0 },
                { "id": "mod", "name": "Mod", "rank": 1 }
            ]
        },
        "channels": { "management": "c-mgmt", "log": "c-log" }
    }"#;

    fn member(id: &str, roles: &[&str]) -> Member {
        Member {
            id: id.into(),
            display_name: id.into(),
            role_ids: roles.iter().map(|r| r.to_string()).collect(),
        }
    }

    #[test]
    fn parses_original_layout_with_defaults() {
        let config = StaffConfig::from_json_str(SAMPLE).unwrap();
        assert_eq!(config.thresholds, Thresholds::default());
        assert_eq!(config.role_change.grant_retries, 3);
        assert_eq!(config.hierarchy().get(0).unwrap().name, "Trainee");
        assert_eq!(config.channels.management, "c-mgmt");
    }

    #[test]
    fn rejects_hierarchy_ties() {
        let tied = SAMPLE.replace("\"rank\": 2", "\"rank\": 1");
        assert!(matches!(
            StaffConfig::from_json_str(&tied),
            Err(StaffError::Config(_))
        ));
    }

    #[test]
    fn thresholds_can_be_overridden() {
        let json = SAMPLE.replacen(
            "\"developerIds\"",
            "\"thresholds\": { \"promotion\": 5 }, \"developerIds\"",
            1,
        );
        let config = StaffConfig::from_json_str(&json).unwrap();
        assert_eq!(config.thresholds.promotion, 5);
        assert_eq!(config.thresholds.demotion, DEMOTION_THRESHOLD);
    }

    #[test]
    fn authorization_by_developer_id_or_manager_role() {
        let config = StaffConfig::from_json_str(SAMPLE).unwrap();
        assert!(config.is_authorized(&member("1", &[])));
        assert!(config.is_authorized(&member("2", &["mgr"])));
        assert!(!config.is_authorized(&member("3", &["admin"])));
    }
}
