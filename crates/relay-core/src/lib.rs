pub mod dispatcher;
pub use dispatcher::{DispatchConfig, Dispatcher, EventHook, HookRef};
pub mod error;
pub use error::DispatchError;
pub mod metrics;
pub use metrics::{DispatchOutcome, MetricsBackend, MetricsHandle, NoOpMetrics, noop_metrics};
pub mod registry;
pub use registry::{CorrelationRegistry, DeliverySlot};
pub mod sink;
pub use sink::ResultSink;
pub mod sweeper;
pub use sweeper::{Sweeper, SweeperConfig, SweeperHandle};
