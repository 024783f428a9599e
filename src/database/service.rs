//! Database service layer
//! 
//! This module bundles the repositories that sit outside the admission path

use crate::config::AdmissionConfig;
use crate::database::{DatabasePool, UserRepository, EventRepository};
use crate::models::User;
use crate::utils::errors::SeatwiseError;

#[derive(Debug, Clone)]
pub struct DatabaseService {
    pub users: UserRepository,
    pub events: EventRepository,
}

impl DatabaseService {
    pub fn new(pool: DatabasePool, defaults: AdmissionConfig) -> Self {
        Self {
            users: UserRepository::new(pool.clone()),
            events: EventRepository::new(pool, defaults),
        }
    }

    /// Block a user from further registrations
    pub async fn block_user(&self, user_id: i64) -> Result<User, SeatwiseError> {
        let user = self.users.set_blocked(user_id, true).await?;
        tracing::warn!(user_id = user_id, "User blocked from registering");
        Ok(user)
    }

    /// Lift a block
    pub async fn unblock_user(&self, user_id: i64) -> Result<User, SeatwiseError> {
        let user = self.users.set_blocked(user_id, false).await?;
        tracing::info!(user_id = user_id, "User unblocked");
        Ok(user)
    }
}
