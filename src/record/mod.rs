// Per-test step and attachment recording

pub mod attachment;
pub mod recorder;
pub mod types;

pub use attachment::{AttachmentInput, Body, csv_table};
pub use recorder::{Download, Recorder, StepOptions};
pub use types::{
    Attachment, Entry, ExceptionInfo, Media, PageSource, RecordState, SourceFile, Status,
    Step, TestOutcome, TestRecord,
};
