pub mod phase;
pub mod section_timer;
pub mod sequence_controller;

pub use phase::Phase;
pub use section_timer::{SectionTimer, TimerEvent};
pub use sequence_controller::{SequenceController, SessionSnapshot};
