mod attendance;
mod common;
mod missing_notes;
