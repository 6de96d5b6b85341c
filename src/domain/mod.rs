//! Chain-agnostic domain types: events, positions, orders and market state.

pub mod event;
pub mod id;
pub mod market;
pub mod money;
pub mod order;
pub mod position;
pub mod volume;

pub use event::{Event, EventArgs, EventKind};
pub use id::{Account, MarketKey};
pub use market::MarketContext;
pub use money::{from_wei, Price, Size, UNIT_DECIMALS};
pub use order::DelayedOrder;
pub use position::Position;
pub use volume::VolumeTracker;
