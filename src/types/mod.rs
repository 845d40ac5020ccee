// Type modules
pub mod chat_wait_request;
pub mod chat_wait_response;
pub mod health_status;
pub mod message;
pub mod session;
pub mod stream_event;
pub mod stream_params;

// Re-exports
pub use chat_wait_request::ChatWaitRequest;
pub use chat_wait_response::ChatWaitResponse;
pub use health_status::HealthStatus;
pub use message::{Message, MessageId, MessageSender, MessageStatus};
pub use session::Session;
pub use stream_event::{StreamEndEvent, StreamErrorEvent, StreamEvent, StreamTokenEvent};
pub use stream_params::StreamParams;
