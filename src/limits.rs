/// Steps held by one scheduling session.
pub const MAX_STEPS_PER_SESSION: usize = 100_000;

/// Longest accepted free-text or identifier field, in bytes.
pub const MAX_NAME_LEN: usize = 256;

/// Drafts per batch create.
pub const MAX_BATCH_SIZE: usize = 500;

/// Default cap on one command line of the session protocol.
pub const MAX_LINE_LEN: usize = 1 << 20;

/// Channels one session may listen on at a time.
pub const MAX_LISTEN_CHANNELS: usize = 64;
