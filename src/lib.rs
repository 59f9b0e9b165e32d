pub mod archive;
pub mod block;
pub mod checksum;
pub mod error;
pub mod frame;
pub mod header;
pub mod ordered_map;
pub mod patch;
pub mod summary;
pub mod time;

pub use archive::{Archive, Record};
pub use checksum::crc64;
pub use error::{ArchiveError, Result};
pub use frame::FrameMode;
pub use header::Header;
pub use patch::{PatchOptions, PatchOutcome};
pub use summary::Summary;
pub use time::Ticks;
