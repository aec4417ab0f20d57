//! Mutation submission channel: typed requests, the transport seam, and the
//! retrying client with commit-await semantics.

pub mod core;
pub mod transport;

pub use core::{
    OperationKind, PendingSubmission, SubmitClient, SubmitError, SubmitLog, SubmitMetrics,
    SubmitOptions, SubmitRequest, SubmitResponse, SubmitSpan, SubmitStatus, SubmitTelemetry,
    SubmitTransport, TransportError,
};
pub use transport::{HttpSubmitTransport, LoopbackState, LoopbackTransport};
