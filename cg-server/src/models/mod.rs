//! Data models for cg-server
//!
//! Row types derive `sqlx::FromRow`; request bodies use the lenient
//! deserializers in [`de`].

pub mod de;
pub mod ebay;
pub mod log;
pub mod paypal;
pub mod record;
pub mod reference;
pub mod segment;
pub mod session;
pub mod settings;

pub use log::{LogLevel, SessionLog};
pub use record::{CardRecord, ParseRun, ParseRunStatus, RecordRow, RecordUpdate};
pub use segment::{RecordingStatus, Segment, SegmentSummary, SegmentText, TranscriptionStatus};
pub use session::{AcquisitionMode, Session, SessionConfig, SessionListItem, SessionStatus};
pub use settings::TranscriptionSettings;
