//! Room management for ARCHIVE.
//!
//! A room is a named membership group with a shared property bag and
//! broadcast semantics: frames sent into a room fan out verbatim to
//! every member except an optional excluded sender. Rooms are created
//! by the first CREATE, live as long as they have members, and are
//! destroyed when the last member leaves or disconnects.
//!
//! The [`RoomManager`] owns all rooms plus the reverse index from
//! connection to room; the server holds it behind one lock and calls
//! into it from the dispatch layer.

mod error;
mod manager;
mod room;

pub use error::RoomError;
pub use manager::RoomManager;
pub use room::{Member, Room};
