mod config;
mod error;
mod events;
mod store;

pub use config::FirebaseConfig;
pub use error::FirebaseDaoError;
pub use store::FirebaseTreeStore;

use crate::dao::storage::StorageError;

impl From<FirebaseDaoError> for StorageError {
    fn from(err: FirebaseDaoError) -> Self {
        match err {
            FirebaseDaoError::SubscriptionCancelled { path, reason } => {
                StorageError::SubscriptionClosed { path, reason }
            }
            other => StorageError::unavailable(other.to_string(), other),
        }
    }
}
