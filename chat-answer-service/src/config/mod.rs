//! Chat configuration: request/HTTP options, user-facing texts and the
//! environment loader that assembles them.

pub mod chat_config;
pub mod messages;
pub mod request_options;
