//! Resilient HTTP layer for the to-do backend.
//!
//! The API layer is split into cohesive modules:
//! - `transport`: the HTTP seam and its `reqwest` implementation
//! - `retry`, `scheduler`, `cache`, `refresh`: pipeline building blocks
//! - `pipeline`: authenticated request execution (`ApiClient`)
//! - `tasks`, `auth`, `user`: domain façades
//! - `todo_client`: composition root wiring everything together

mod auth;
mod cache;
mod facade;
pub mod keys;
mod pipeline;
mod refresh;
mod retry;
mod scheduler;
mod tasks;
mod todo_client;
mod transport;
mod types;
mod user;

pub use auth::AuthApi;
pub use cache::{Invalidation, ResponseCache, TtlClass};
pub use pipeline::{ApiClient, ApiRequest};
pub use refresh::AuthRefreshCoordinator;
pub use retry::{parse_retry_after, RetryDecision, RetryPolicy, NO_RETRY_ENDPOINTS};
pub use scheduler::{Priority, RequestScheduler, SchedulerStats};
pub use tasks::TaskApi;
pub use todo_client::TodoClient;
pub use transport::{HttpRequest, HttpResponse, Method, ReqwestTransport, Transport};
pub use types::{
    Ack, AuthResponse, BulkResult, Credentials, NewTask, ProfileUpdate, Registration, SortOrder,
    Task, TaskFilter, TaskPage, TaskPriority, TaskStats, TaskStatus, TaskUpdate, UserProfile,
};
pub use user::UserApi;
