//! Threshold evaluation and approval prompt rendering.

use std::collections::HashSet;

use staffrep_core::error::StaffResult;
use staffrep_core::models::action::ActionDescriptor;
use staffrep_core::models::hierarchy::Hierarchy;
use staffrep_core::models::request::{ApprovalPrompt, Decision, PendingRankRequest, RankDirection};
use staffrep_core::models::user::{LeaderboardField, UserRecord};
use staffrep_core::ports::MemberDirectory;
use staffrep_core::repository::UserRepository;
use tracing::{debug, warn};

use crate::config::Thresholds;

pub const PROMOTION_COLOR: u32 = 0x00ff00;
pub const DEMOTION_COLOR: u32 = 0xff0000;
pub const ELIGIBLE_LIST_COLOR: u32 = 0x0099ff;

/// Snapshot of a user's counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Standing {
    pub positive_rep: u32,
    pub negative_rep: u32,
}

impl From<&UserRecord> for Standing {
    fn from(record: &UserRecord) -> Self {
        Self {
            positive_rep: record.positive_rep,
            negative_rep: record.negative_rep,
        }
    }
}

/// A staff member whose counters have crossed a threshold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EligibleStaff {
    pub user_id: String,
    pub standing: Standing,
    pub direction: RankDirection,
    /// Name of the rank currently held.
    pub rank: String,
}

#[derive(Debug, Clone, Copy)]
pub struct ThresholdEvaluator {
    thresholds: Thresholds,
}

impl Default for ThresholdEvaluator {
    fn default() -> Self {
        Self::new(Thresholds::default())
    }
}

impl ThresholdEvaluator {
    pub fn new(thresholds: Thresholds) -> Self {
        Self { thresholds }
    }

    /// Promotion is checked first, so a user over both thresholds gets a
    /// promotion request.
    pub fn evaluate(&self, standing: Standing) -> Decision {
        if standing.positive_rep >= self.thresholds.promotion {
            Decision::RequestPromotion
        } else if standing.negative_rep >= self.thresholds.demotion {
            Decision::RequestDemotion
        } else {
            Decision::None
        }
    }

    pub fn render_request(&self, request: &PendingRankRequest, standing: Standing) -> ApprovalPrompt {
        let (title, color, trigger) = match request.direction {
            RankDirection::Promote => (
                "Promotion Request",
                PROMOTION_COLOR,
                format!("{} Positive Points", standing.positive_rep),
            ),
            RankDirection::Demote => (
                "Demotion Request",
                DEMOTION_COLOR,
                format!("{} Negative Points", standing.negative_rep),
            ),
        };
        let body = format!(
            "**User:** <@{user}> ({user})\n**Status:** ✅ {pos} | ❌ {neg}\n**Trigger:** Reached {trigger}\n**Last Reason:** {reason}",
            user = request.target_user_id,
            pos = standing.positive_rep,
            neg = standing.negative_rep,
            reason = request.trigger_reason,
        );
        ApprovalPrompt {
            title: title.to_string(),
            body,
            color,
            approve: ActionDescriptor::ApproveRank {
                request_id: request.id,
                target_id: request.target_user_id.clone(),
                direction: request.direction,
            },
            deny: ActionDescriptor::DenyRank {
                request_id: request.id,
                target_id: request.target_user_id.clone(),
            },
        }
    }

    /// Users over a threshold who still hold a hierarchy role.
    ///
    /// Scans the top `scan_limit` of both leaderboards so that users who
    /// only crossed the demotion threshold are not missed. A member whose
    /// lookup fails is skipped rather than failing the whole scan.
    pub async fn eligible<R, D>(
        &self,
        repo: &R,
        directory: &D,
        hierarchy: &Hierarchy,
        scan_limit: usize,
    ) -> StaffResult<Vec<EligibleStaff>>
    where
        R: UserRepository,
        D: MemberDirectory,
    {
        let mut candidates = repo
            .leaderboard(LeaderboardField::PositiveRep, scan_limit)
            .await?;
        candidates.extend(
            repo.leaderboard(LeaderboardField::NegativeRep, scan_limit)
                .await?,
        );

        let mut seen = HashSet::new();
        let mut eligible = Vec::new();
        for record in candidates {
            if !seen.insert(record.user_id.clone()) {
                continue;
            }
            let standing = Standing::from(&record);
            let Some(direction) = self.evaluate(standing).direction() else {
                continue;
            };
            let member = match directory.fetch_member(&record.user_id).await {
                Ok(Some(member)) => member,
                Ok(None) => {
                    debug!(user_id = %record.user_id, "skipping departed member");
                    continue;
                }
                Err(e) => {
                    warn!(user_id = %record.user_id, error = %e, "member lookup failed, skipping");
                    continue;
                }
            };
            let Some(rank) = hierarchy
                .current_index(member.role_ids.as_slice())
                .and_then(|i| hierarchy.get(i))
            else {
                continue;
            };
            eligible.push(EligibleStaff {
                user_id: record.user_id,
                standing,
                direction,
                rank: rank.name.clone(),
            });
        }
        Ok(eligible)
    }
}

/// Management overview of everyone waiting for a rank change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EligibleListing {
    pub title: String,
    pub body: String,
    pub color: u32,
    pub footer: Option<String>,
    /// Absent when nobody is eligible.
    pub process_all: Option<ActionDescriptor>,
}

pub fn render_eligible(eligible: &[EligibleStaff]) -> EligibleListing {
    if eligible.is_empty() {
        return EligibleListing {
            title: "Eligible Staff".to_string(),
            body: "No active staff members are currently waiting for rank changes.".to_string(),
            color: ELIGIBLE_LIST_COLOR,
            footer: None,
            process_all: None,
        };
    }
    let body = eligible
        .iter()
        .map(|staff| {
            let tag = match staff.direction {
                RankDirection::Promote => "PROMO",
                RankDirection::Demote => "DEMO",
            };
            format!(
                "• <@{}>: ✅ {} | ❌ {} ({tag})",
                staff.user_id, staff.standing.positive_rep, staff.standing.negative_rep
            )
        })
        .collect::<Vec<_>>()
        .join("\n");
    EligibleListing {
        title: "Eligible Staff".to_string(),
        body,
        color: ELIGIBLE_LIST_COLOR,
        footer: Some(format!("{} staff waiting", eligible.len())),
        process_all: Some(ActionDescriptor::MassProcess),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn standing(positive_rep: u32, negative_rep: u32) -> Standing {
        Standing {
            positive_rep,
            negative_rep,
        }
    }

    #[test]
    fn below_both_thresholds_is_none() {
        let eval = ThresholdEvaluator::default();
        assert_eq!(eval.evaluate(standing(9, 9)), Decision::None);
        assert_eq!(eval.evaluate(standing(0, 0)), Decision::None);
    }

    #[test]
    fn thresholds_are_inclusive() {
        let eval = ThresholdEvaluator::default();
        assert_eq!(eval.evaluate(standing(10, 0)), Decision::RequestPromotion);
        assert_eq!(eval.evaluate(standing(0, 10)), Decision::RequestDemotion);
    }

    #[test]
    fn promotion_wins_when_both_are_crossed() {
        let eval = ThresholdEvaluator::default();
        assert_eq!(eval.evaluate(standing(10, 15)), Decision::RequestPromotion);
    }

    #[test]
    fn custom_thresholds() {
        let eval = ThresholdEvaluator::new(Thresholds {
            promotion: 3,
            demotion: 5,
        });
        assert_eq!(eval.evaluate(standing(3, 0)), Decision::RequestPromotion);
        assert_eq!(eval.evaluate(standing(2, 4)), Decision::None);
    }

    #[test]
    fn renders_demotion_prompt_with_both_actions() {
        let eval = ThresholdEvaluator::default();
        let request = PendingRankRequest::new("77", RankDirection::Demote, "spam in chat");
        let prompt = eval.render_request(&request, standing(2, 11));

        assert_eq!(prompt.title, "Demotion Request");
        assert_eq!(prompt.color, DEMOTION_COLOR);
        assert!(prompt.body.contains("<@77>"));
        assert!(prompt.body.contains("Reached 11 Negative Points"));
        assert!(prompt.body.contains("spam in chat"));
        assert_eq!(
            prompt.approve,
            ActionDescriptor::ApproveRank {
                request_id: request.id,
                target_id: "77".into(),
                direction: RankDirection::Demote,
            }
        );
        assert_eq!(
            prompt.deny.to_string(),
            format!("rank_deny:{}:77", request.id)
        );
    }

    #[test]
    fn eligible_listing_offers_process_all() {
        let eligible = vec![
            EligibleStaff {
                user_id: "5".into(),
                standing: standing(12, 1),
                direction: RankDirection::Promote,
                rank: "Mod".into(),
            },
            EligibleStaff {
                user_id: "6".into(),
                standing: standing(0, 10),
                direction: RankDirection::Demote,
                rank: "Trainee".into(),
            },
        ];
        let listing = render_eligible(&eligible);
        assert_eq!(
            listing.body,
            "• <@5>: ✅ 12 | ❌ 1 (PROMO)\n• <@6>: ✅ 0 | ❌ 10 (DEMO)"
        );
        assert_eq!(listing.color, ELIGIBLE_LIST_COLOR);
        assert_eq!(listing.process_all, Some(ActionDescriptor::MassProcess));
    }

    #[test]
    fn empty_listing_has_no_button() {
        let listing = render_eligible(&[]);
        assert!(listing.body.starts_with("No active staff members"));
        assert_eq!(listing.process_all, None);
        assert_eq!(listing.footer, None);
    }
}
