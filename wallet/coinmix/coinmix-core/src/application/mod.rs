//! Application layer: session orchestration, relay registry, payment ledger and node maintenance.

pub mod driver;
pub mod lifecycle;
pub mod maintenance;
pub mod payments;
pub mod queue;
pub mod registry;
pub mod session;

pub use driver::{AutoMixDriver, MixOutcome};
pub use lifecycle::{CompositeObserver, NoopObserver, RecordingObserver, SessionEvent, SessionObserver};
pub use maintenance::{run_maintenance_loop, MixingNode, RelayIdentity};
pub use payments::PaymentWinnerLedger;
pub use queue::MixingQueueBroadcaster;
pub use registry::RelayNodeRegistry;
pub use session::{CoordinatorPeer, MixingSession, SessionConfig, SessionContext};
