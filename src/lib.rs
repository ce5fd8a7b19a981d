pub mod dispatch;
pub mod draw;
pub mod logging;
pub mod matchup;
pub mod phase;
pub mod poll;
pub mod protocol;
pub mod schedule;
pub mod settings;
pub mod storage;
pub mod view;

pub use dispatch::{
    ChannelTransport, DispatchOutcome, Dispatcher, IgnoreReason, Notice, ReadyState, Transport,
};
pub use settings::ClientSettings;
pub use view::ViewProjection;
