//! Real-time playback pipeline
//!
//! - `cursor`: render state run inside the output callback
//! - `queue`: lock-free block queue from the callback to the analysis thread
//! - `driver`: output thread owning the sink
//! - `session`: lifecycle controller tying playback and analysis together

pub mod cursor;
pub mod driver;
pub mod queue;
pub mod session;
pub mod state;

pub use cursor::{BlockCursor, CursorFlags};
pub use driver::{DeviceInfo, PlaybackDriver};
pub use queue::{frame_queue, Block, FrameConsumer, FrameProducer};
pub use session::{Session, SessionOptions, SessionStats};
pub use state::{PipelineCounters, PipelineStats, StopSignal, TailPolicy};
