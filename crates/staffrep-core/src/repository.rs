//! User record store contract.
//!
//! Every backend stores exactly one record per user id and must round
//! trip [`UserRecord`] losslessly. All operations are async.

use crate::error::StaffResult;
use crate::models::user::{LeaderboardField, UserMutation, UserRecord, UserUpdate};

pub trait UserRepository: Send + Sync {
    /// Fetch an existing record. Unknown ids fail with `NotFound`.
    fn get_user(&self, user_id: &str) -> impl Future<Output = StaffResult<UserRecord>> + Send;

    /// Fetch a record, creating a fully defaulted one on first sight.
    fn get_or_create_user(
        &self,
        user_id: &str,
    ) -> impl Future<Output = StaffResult<UserRecord>> + Send;

    /// Merge a partial update into the record (creating it if needed)
    /// and return the merged result.
    fn update_user(
        &self,
        user_id: &str,
        update: UserUpdate,
    ) -> impl Future<Output = StaffResult<UserRecord>> + Send;

    /// Records ordered descending by `field`, at most `limit` of them.
    fn leaderboard(
        &self,
        field: LeaderboardField,
        limit: usize,
    ) -> impl Future<Output = StaffResult<Vec<UserRecord>>> + Send;

    /// Apply `mutations` in order to one record as a single atomic unit
    /// and return the committed record. Either every mutation is stored
    /// or none is.
    fn transaction(
        &self,
        user_id: &str,
        mutations: Vec<UserMutation>,
    ) -> impl Future<Output = StaffResult<UserRecord>> + Send;
}
