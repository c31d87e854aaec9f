//! Gateway Tests
//!
//! Drive the session layer end to end over in-memory storage.

mod attachment_tests;
mod http_tests;
mod message_tests;
mod pipeline_tests;
mod registry_tests;
