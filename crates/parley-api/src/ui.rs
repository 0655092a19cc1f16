//! Embedded single-page chat client.
//!
//! Served from `/ui`. The page talks to the JSON API on the same origin and
//! keeps the session id in `localStorage`.

pub const CHAT_HTML: &str = include_str!("../assets/chat.html");
