pub mod records;

pub use records::{
    Chore, ChoreStatus, Event, EventAttendee, House, Mood, Player, Row, WellnessLog,
};
pub(crate) use records::deserialize_id;
