//! Domain services for cg-server
//!
//! Parsing engine (reference index, name matching, attribute extraction,
//! confidence), session runtime (recorder, transcriber, worker, manager,
//! scheduler) and PayPal allocation rules.

pub mod allocation;
pub mod attribute_extractor;
pub mod confidence;
pub mod env_check;
pub mod name_matcher;
pub mod recorder;
pub mod reference_index;
pub mod scheduler;
pub mod session_events;
pub mod session_manager;
pub mod session_parser;
pub mod session_paths;
pub mod transcriber;
pub mod transcript_parser;
pub mod transcription_worker;

pub use session_manager::{RuntimeError, SessionRegistry, SessionRuntime};
pub use session_parser::{parse_session, ParseError, ParseSummary};
