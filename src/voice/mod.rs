//! Voice request processing: the session, the processor and the voice thread.

pub mod processor;
pub mod report;
pub mod request;
pub mod session;
pub mod worker;

pub use processor::{ProcessorState, ProcessorStats, VoiceProcessor};
pub use report::{CollectingReporter, ErrorReporter, LogReporter};
pub use request::VoiceRequest;
pub use session::Session;
pub use worker::{RequestSender, VoiceHandle, VoiceWorker};
