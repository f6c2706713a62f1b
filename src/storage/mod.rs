//! Plain-text persistence of group schedules.

mod store;

pub use store::GroupStore;
