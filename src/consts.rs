/// Cookie keeping the id of the caller session.
pub const SESSION_COOKIE: &str = "session_id";

/// Directory the metadata of fetched contracts is placed into, inside a session.
pub const FETCHED_METADATA_DIR: &str = "metadata";
