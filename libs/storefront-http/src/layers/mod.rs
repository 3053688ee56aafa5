//! Tower layers applied inside the HTTP client stack.

mod user_agent;

pub use user_agent::{UserAgentLayer, UserAgentService};
