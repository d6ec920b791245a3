// Sequencer - Transport, note scheduling and clock publishing

pub mod active_notes;
pub mod clock;
pub mod schedule;
pub mod transport;

pub use active_notes::ActiveNoteSet;
pub use clock::{ClockPublisher, ClockReader};
pub use schedule::{END_GRACE_SECONDS, PlannedCue, SchedulePlan, plan_schedule};
pub use transport::{
    DEFAULT_SPEED, MAX_SPEED, MIN_SPEED, PlayOutcome, ScheduledEvent, Transport, TransportError,
    TransportFrame, TransportStatus,
};
