pub mod digest;
pub mod error;
pub mod lock;
pub mod log;
pub mod mailer;
pub mod markdown;
pub mod model;
pub mod pipeline;
pub mod prompt;
pub mod scheduler;
pub mod store;
pub mod types;
pub mod workspace;
