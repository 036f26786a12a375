//! todo-client: a resilient HTTP client for the to-do backend.
//!
//! The crate wraps the backend's REST API with token storage, silent token
//! refresh, retry with backoff, priority-aware rate limiting and a
//! deduplicating response cache. Front ends talk to [`api::TodoClient`],
//! which exposes task, auth and user façades over one shared pipeline.
//!
//! # Quick start
//!
//! ```no_run
//! use todo_client::api::{Credentials, TaskFilter, TodoClient};
//! use todo_client::config::load_config;
//!
//! # async fn example() {
//! let config = load_config(None).unwrap();
//! let client = TodoClient::from_config(&config).unwrap();
//! client
//!     .auth()
//!     .login(&Credentials {
//!         email: "ada@example.com".into(),
//!         password: "hunter22".into(),
//!     })
//!     .await
//!     .unwrap();
//! let page = client.tasks().get_tasks(&TaskFilter::default()).await.unwrap();
//! println!("{} tasks", page.total);
//! # }
//! ```

pub mod api;
pub mod auth;
pub mod build_info;
pub mod config;
pub mod error;
pub mod render;
#[cfg(test)]
pub mod testsupport;
