pub mod clock;
mod event_bus;

pub use clock::{Clock, ManualClock, SystemClock};
pub use event_bus::{EventBus, EventBusStats, EventEnvelope, EventSink, SinkError, SubscriberId};
