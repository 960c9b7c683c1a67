pub mod controller;
pub mod dispatch;
pub mod error;
pub mod guard;
pub mod locks;
pub mod state;

pub use controller::AlarmEngine;
pub use dispatch::{AppEventEmitter, ChannelEmitter, Dispatcher, LogDispatcher};
pub use error::EngineError;
pub use state::{transition, LifecycleInput};
