//! Database layer (Firestore, with an in-memory stand-in).

pub mod firestore;
pub mod memory;

pub use self::firestore::FirestoreDb;
pub use memory::MemoryDb;

use crate::error::AppError;
use crate::models::{Order, Subscription, Topic, User};
use async_trait::async_trait;

/// Collection names as constants.
pub mod collections {
    pub const USERS: &str = "users";
    pub const ORDERS: &str = "orders";
    pub const TOPICS: &str = "topics";
}

/// Document operations the handlers need.
///
/// There is no optimistic concurrency anywhere: every write replaces what it
/// targets and the last writer wins.
#[async_trait]
pub trait Store: Send + Sync {
    async fn get_user(&self, uid: &str) -> Result<Option<User>, AppError>;

    /// Create a user record or overwrite its profile fields.
    ///
    /// `user.subscription` is never written here; only `set_subscription`
    /// touches that field, so a profile save cannot undo a payment.
    async fn upsert_user(&self, user: &User) -> Result<(), AppError>;

    /// Replace the `subscription` field of `users/{uid}` as a single value,
    /// creating the document if needed. Other fields are left untouched.
    async fn set_subscription(
        &self,
        uid: &str,
        subscription: &Subscription,
    ) -> Result<(), AppError>;

    async fn create_order(&self, order: &Order) -> Result<(), AppError>;

    async fn get_order(&self, order_id: &str) -> Result<Option<Order>, AppError>;

    async fn create_topic(&self, topic: &Topic) -> Result<(), AppError>;

    async fn get_topic(&self, id: &str) -> Result<Option<Topic>, AppError>;

    /// Topics owned by a user, newest first.
    async fn list_topics(&self, uid: &str) -> Result<Vec<Topic>, AppError>;

    /// Delete the user record and every topic they own.
    ///
    /// Returns the number of documents deleted. Orders are kept for
    /// payment reconciliation.
    async fn delete_user_data(&self, uid: &str) -> Result<usize, AppError>;
}
