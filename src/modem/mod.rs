//! The modem side of the connection manager: shared context, AT command plumbing, the
//! command sequences of each lifecycle step and the URC monitor.

mod command;
mod context;
pub mod flow;
mod metrics;
mod monitor;
mod request;
mod state;

pub use command::{CommandRunner, AT_DEFAULT_TIMEOUT};
pub use context::{EventChannel, LteContext, EVENT_QUEUE_LEN, MAX_OBSERVERS};
pub use flow::{Flow, FplmnStatus};
pub use metrics::{Metrics, MetricsStore};
pub use monitor::{Monitor, UrcPump};
pub use request::{Payload, RequestSlot, SendRecvRequest, SEND_RECV_MAX};
pub use state::StateStore;
