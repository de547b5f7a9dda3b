//! Shared fixtures: in-memory store and chat platform doubles.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use staffrep_core::error::{StaffError, StaffResult};
use staffrep_core::models::member::Member;
use staffrep_core::models::request::ApprovalPrompt;
use staffrep_core::models::user::{LeaderboardField, UserMutation, UserRecord, UserUpdate};
use staffrep_core::ports::{MemberDirectory, Notifier};
use staffrep_core::repository::UserRepository;
use staffrep_db::repository::SurrealUserRepository;
use staffrep_engine::StaffConfig;
use staffrep_engine::StaffService;
use staffrep_engine::tracker::MemoryErrorTracker;
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};

pub const TRAINEE: &str = "role-trainee";
pub const MOD: &str = "role-mod";
pub const ADMIN: &str = "role-admin";
pub const MANAGER: &str = "role-manager";
pub const MGMT_CHANNEL: &str = "chan-mgmt";
pub const LOG_CHANNEL: &str = "chan-log";

pub type Repo = FlakyStore;
pub type Service = StaffService<Repo, FakeDirectory, RecordingNotifier>;

pub fn config() -> StaffConfig {
    StaffConfig::from_json_str(&format!(
        r#"{{
            "developerIds": ["dev-1"],
            "roles": {{
                "manager": "{MANAGER}",
                "staffHierarchy": [
                    {{ "id": "{ADMIN}", "name": "Admin", "rank": 2 }},
                    {{ "id": "{TRAINEE}", "name": "Trainee", "rank": 0 }},
                    {{ "id": "{MOD}", "name": "Mod", "rank": 1 }}
                ]
            }},
            "channels": {{ "management": "{MGMT_CHANNEL}", "log": "{LOG_CHANNEL}" }},
            "roleChange": {{ "grantRetries": 2, "retryBackoffMs": 0 }}
        }}"#
    ))
    .unwrap()
}

pub fn member(id: &str, roles: &[&str]) -> Member {
    Member {
        id: id.into(),
        display_name: format!("user{id}"),
        role_ids: roles.iter().map(|r| r.to_string()).collect(),
    }
}

pub fn manager() -> Member {
    member("mgr-1", &[MANAGER])
}

pub async fn repo() -> Repo {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    staffrep_db::run_migrations(&db).await.unwrap();
    FlakyStore {
        inner: SurrealUserRepository::new(db),
        failing_transactions: Arc::new(AtomicU32::new(0)),
    }
}

/// In-memory store whose transactions can be made to fail on demand.
#[derive(Clone)]
pub struct FlakyStore {
    inner: SurrealUserRepository<Db>,
    failing_transactions: Arc<AtomicU32>,
}

impl FlakyStore {
    /// Fail the next `times` transactions.
    pub fn fail_transactions(&self, times: u32) {
        self.failing_transactions.store(times, Ordering::SeqCst);
    }
}

impl UserRepository for FlakyStore {
    async fn get_user(&self, user_id: &str) -> StaffResult<UserRecord> {
        self.inner.get_user(user_id).await
    }

    async fn get_or_create_user(&self, user_id: &str) -> StaffResult<UserRecord> {
        self.inner.get_or_create_user(user_id).await
    }

    async fn update_user(&self, user_id: &str, update: UserUpdate) -> StaffResult<UserRecord> {
        self.inner.update_user(user_id, update).await
    }

    async fn leaderboard(
        &self,
        field: LeaderboardField,
        limit: usize,
    ) -> StaffResult<Vec<UserRecord>> {
        self.inner.leaderboard(field, limit).await
    }

    async fn transaction(
        &self,
        user_id: &str,
        mutations: Vec<UserMutation>,
    ) -> StaffResult<UserRecord> {
        let failing = self
            .failing_transactions
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(StaffError::StoreUnavailable("write conflict".into()));
        }
        self.inner.transaction(user_id, mutations).await
    }
}

pub struct Harness {
    pub service: Service,
    pub repo: Repo,
    pub directory: Arc<FakeDirectory>,
    pub notifier: Arc<RecordingNotifier>,
    pub tracker: Arc<MemoryErrorTracker>,
}

pub async fn harness() -> Harness {
    let repo = repo().await;
    let directory = Arc::new(FakeDirectory::default());
    let notifier = Arc::new(RecordingNotifier::default());
    let tracker = Arc::new(MemoryErrorTracker::new());
    let service = StaffService::new(
        repo.clone(),
        Arc::clone(&directory),
        Arc::clone(&notifier),
        config(),
        tracker.clone(),
    );
    Harness {
        service,
        repo,
        directory,
        notifier,
        tracker,
    }
}

impl Harness {
    /// Register a member and give them a starting standing.
    pub async fn staff(&self, id: &str, roles: &[&str], positive: u32, negative: u32) {
        self.directory.add(member(id, roles));
        self.repo
            .update_user(
                id,
                UserUpdate {
                    positive_rep: Some(positive),
                    negative_rep: Some(negative),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
    }
}

// -----------------------------------------------------------------------
// Chat platform doubles
// -----------------------------------------------------------------------

#[derive(Default)]
pub struct FakeDirectory {
    members: Mutex<HashMap<String, Member>>,
    /// Remaining failures per role id for grant calls.
    grant_failures: Mutex<HashMap<String, u32>>,
    grant_calls: Mutex<Vec<(String, String)>>,
    fail_revoke: AtomicBool,
    fail_fetch: AtomicBool,
    fail_fetch_ids: Mutex<HashSet<String>>,
    grant_delay: Mutex<Option<Duration>>,
}

impl FakeDirectory {
    pub fn add(&self, member: Member) {
        self.members.lock().unwrap().insert(member.id.clone(), member);
    }

    pub fn roles_of(&self, user_id: &str) -> Vec<String> {
        self.members
            .lock()
            .unwrap()
            .get(user_id)
            .map(|m| m.role_ids.clone())
            .unwrap_or_default()
    }

    pub fn fail_grants(&self, role_id: &str, times: u32) {
        self.grant_failures
            .lock()
            .unwrap()
            .insert(role_id.to_string(), times);
    }

    pub fn fail_revokes(&self) {
        self.fail_revoke.store(true, Ordering::SeqCst);
    }

    pub fn fail_fetches(&self) {
        self.fail_fetch.store(true, Ordering::SeqCst);
    }

    /// Make lookups of one member fail.
    pub fn fail_fetch_for(&self, user_id: &str) {
        self.fail_fetch_ids.lock().unwrap().insert(user_id.to_string());
    }

    pub fn delay_grants(&self, delay: Duration) {
        *self.grant_delay.lock().unwrap() = Some(delay);
    }

    pub fn grant_calls(&self) -> Vec<(String, String)> {
        self.grant_calls.lock().unwrap().clone()
    }
}

impl MemberDirectory for FakeDirectory {
    async fn fetch_member(&self, user_id: &str) -> StaffResult<Option<Member>> {
        if self.fail_fetch.load(Ordering::SeqCst)
            || self.fail_fetch_ids.lock().unwrap().contains(user_id)
        {
            return Err(StaffError::Platform("gateway timeout".into()));
        }
        Ok(self.members.lock().unwrap().get(user_id).cloned())
    }

    async fn grant_role(&self, user_id: &str, role_id: &str) -> StaffResult<()> {
        let delay = *self.grant_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.grant_calls
            .lock()
            .unwrap()
            .push((user_id.to_string(), role_id.to_string()));
        {
            let mut failures = self.grant_failures.lock().unwrap();
            if let Some(remaining) = failures.get_mut(role_id) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(StaffError::Platform("missing permissions".into()));
                }
            }
        }
        let mut members = self.members.lock().unwrap();
        let member = members
            .get_mut(user_id)
            .ok_or_else(|| StaffError::Platform("unknown member".into()))?;
        if !member.has_role(role_id) {
            member.role_ids.push(role_id.to_string());
        }
        Ok(())
    }

    async fn revoke_role(&self, user_id: &str, role_id: &str) -> StaffResult<()> {
        if self.fail_revoke.load(Ordering::SeqCst) {
            return Err(StaffError::Platform("missing permissions".into()));
        }
        let mut members = self.members.lock().unwrap();
        if let Some(member) = members.get_mut(user_id) {
            member.role_ids.retain(|r| r != role_id);
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub direct: Mutex<Vec<(String, String)>>,
    pub channel: Mutex<Vec<(String, String)>>,
    pub prompts: Mutex<Vec<(String, ApprovalPrompt)>>,
    fail_direct: AtomicBool,
}

impl RecordingNotifier {
    pub fn close_dms(&self) {
        self.fail_direct.store(true, Ordering::SeqCst);
    }

    pub fn direct_to(&self, user_id: &str) -> Vec<String> {
        self.direct
            .lock()
            .unwrap()
            .iter()
            .filter(|(to, _)| to == user_id)
            .map(|(_, msg)| msg.clone())
            .collect()
    }

    pub fn channel_messages(&self, channel_id: &str) -> Vec<String> {
        self.channel
            .lock()
            .unwrap()
            .iter()
            .filter(|(to, _)| to == channel_id)
            .map(|(_, msg)| msg.clone())
            .collect()
    }

    pub fn prompts(&self) -> Vec<ApprovalPrompt> {
        self.prompts
            .lock()
            .unwrap()
            .iter()
            .map(|(_, p)| p.clone())
            .collect()
    }
}

impl Notifier for RecordingNotifier {
    async fn send_direct(&self, user_id: &str, message: &str) -> StaffResult<()> {
        if self.fail_direct.load(Ordering::SeqCst) {
            return Err(StaffError::Platform("cannot send messages to this user".into()));
        }
        self.direct
            .lock()
            .unwrap()
            .push((user_id.to_string(), message.to_string()));
        Ok(())
    }

    async fn send_channel(&self, channel_id: &str, message: &str) -> StaffResult<()> {
        self.channel
            .lock()
            .unwrap()
            .push((channel_id.to_string(), message.to_string()));
        Ok(())
    }

    async fn post_prompt(&self, channel_id: &str, prompt: &ApprovalPrompt) -> StaffResult<()> {
        self.prompts
            .lock()
            .unwrap()
            .push((channel_id.to_string(), prompt.clone()));
        Ok(())
    }
}
