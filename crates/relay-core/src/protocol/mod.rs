//! Protocol module containing the frame codec, message vocabulary, and
//! async frame I/O helpers.

pub mod frame;
pub mod messages;
pub mod stream;

pub use frame::{Frame, ProtocolError, FRAME_SIZE, MAX_PAYLOAD};
pub use messages::*;
pub use stream::{read_frame, write_frame, FrameReader};
