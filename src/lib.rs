//! Hello-world supervisor/sub-agent collaboration on Amazon Bedrock Agents.

pub mod scenario;

pub use scenario::{run, HelloWorldOptions, Outcome};
