//! Broadcast data distribution
//!
//! The handler owns a set of channels and fans every pushed buffer out to one
//! private queue per consumer, so consumers running at different rates each
//! see the full stream in push order.
//!
//! # Architecture
//!
//! ```text
//!                          Arc<Handler<C>>
//!                     ┌──────────────────────────┐
//!                     │ channels: HashMap<C,     │
//!                     │   Channel {              │
//!                     │     queues: key → FIFO,  │
//!                     │     eof,                 │
//!                     │   }                      │
//!                     │ >                        │
//!                     └────────────┬─────────────┘
//!                                  │
//!          ┌───────────────────────┼───────────────────────┐
//!          │                       │                       │
//!          ▼                       ▼                       ▼
//!     [Producer]              [Consumer A]            [Consumer B]
//!     push(us, bytes)         pop(us)                 pop_chunk(us, n)
//!          │
//!          └──► fan-out ──► data_pushed() hook ──► driving loop wakeup()
//! ```
//!
//! # Zero-Copy Design
//!
//! A push wraps the payload in one `bytes::Bytes`. Each queue stores a clone,
//! which only bumps a reference count. The payload is freed when the last
//! queue lets go of it.
//!
//! # Backpressure
//!
//! Queues are bounded by the channel capacity. A full queue drops the new
//! element with a warning; the producer is never blocked and the other
//! consumers are unaffected.

pub mod buffer;
pub mod channel;
pub mod config;
pub mod consumer;
pub mod error;
pub mod handler;
pub mod hooks;
pub mod producer;
pub mod queue;
pub mod stats;

pub use buffer::{Buffer, ConsumerKey, DataType};
pub use config::{ChannelConfig, HandlerConfig, DEFAULT_QUEUE_CAPACITY};
pub use consumer::Consumer;
pub use error::DataError;
pub use handler::{ChannelId, ChunkStatus, Handler};
pub use hooks::{DataHooks, NoHooks};
pub use producer::Producer;
pub use stats::{ChannelStats, QueueStats};
