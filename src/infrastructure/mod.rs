//! Adapters for the collaborator interfaces in [`crate::ports`].
pub mod memory;
pub mod nats;
pub mod postgres;

pub use memory::{InMemorySessionStore, InMemoryStore, NoopPublisher, RecordingPublisher};
pub use nats::NatsEventPublisher;
pub use postgres::{PgOrderRepository, PgProductCatalog, PgSessionStore};
