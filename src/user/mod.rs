// Public API
pub use handlers::register_user;
pub use models::{NotificationRecipient, SubscriptionStatus, User, UserTier};
pub use service::UserService;

// Internal modules
pub mod generators;
mod handlers;
mod models;
mod service;
