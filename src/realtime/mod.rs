pub mod backend;
pub mod binder;
pub mod change;
pub mod manager;
pub mod memory;

pub use backend::{
    BackendChannel, BackendChannelId, ChannelSignal, ChannelStatus, RealtimeBackend, TableBinding,
};
pub use binder::{BindingOptions, Handlers, TableSubscription};
pub use change::{ChangeEvent, ChangeKind, EventKinds, RawChange};
pub use manager::{
    ChannelInfo, ChannelPhase, ConnectionManager, ConnectionState, EventSink, ManagerOptions,
    SubscriptionRequest, Teardown,
};
pub use memory::MemoryBackend;

// Real-time layer: the connection manager owns every backend channel, the
// binder turns a channel into typed callbacks, and the memory backend stands
// in for the change-stream service in tests and simulations.
