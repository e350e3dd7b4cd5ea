//! HTTP route handlers grouped by resource.
//!
//! Handlers are annotated with `#[openapi]` so `rocket_okapi` can derive an
//! OpenAPI document automatically. They take the [`MessageStore`] from
//! managed state, which keeps them mountable in tests with any pool.
//!
//! [`MessageStore`]: crate::store::MessageStore

pub mod health;
pub mod messages;
pub mod params;
pub mod threads;
