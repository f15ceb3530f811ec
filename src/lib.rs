//! Concurrency backbone of a sensor acquisition pipeline
//!
//! Two independent pieces:
//!
//! - [`data`]: a broadcast distribution layer. Producers push byte buffers
//!   into named channels; every registered consumer receives every buffer in
//!   its own bounded queue and reads at its own pace.
//! - [`statemachine`]: a transition-table scheduler advanced by explicit
//!   wakeups, used to model device lifecycles (connect, acquire, reconnect).
//!
//! They meet through [`data::DataHooks`]: a push notifies the driving loop,
//! whose next wakeup evaluates transitions that may drain consumer queues.
//!
//! ```
//! use std::sync::Arc;
//! use acquire_rs::data::{ChannelConfig, Consumer, DataType, Handler, Producer};
//!
//! let handler = Arc::new(Handler::new());
//! handler.add_channel(DataType::Tocography, ChannelConfig::fixed(4)).unwrap();
//!
//! let consumer = Consumer::new(handler.clone());
//! consumer.subscribe(&DataType::Tocography).unwrap();
//!
//! let producer = Producer::new(handler);
//! producer.push(&DataType::Tocography, vec![0u8, 1, 2, 3]).unwrap();
//!
//! let sample = consumer.pop(&DataType::Tocography).unwrap();
//! assert_eq!(&sample[..], &[0, 1, 2, 3]);
//! ```

pub mod data;
pub mod error;
pub mod statemachine;

pub use data::{Buffer, ChannelConfig, Consumer, DataType, Handler, Producer};
pub use error::{Error, Result};
pub use statemachine::{MachineConfig, State, Statemachine, Transition, TransitionStatus};
