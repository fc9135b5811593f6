/// Close code reported when the peer's close frame carried no status.
pub const CLOSE_NO_STATUS: u16 = 1005;
/// Close code reported when the connection dropped without a close frame.
pub const CLOSE_ABNORMAL: u16 = 1006;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseInfo {
    pub was_clean: bool,
    pub code: u16,
    pub reason: String,
}

impl CloseInfo {
    pub fn clean(code: u16, reason: impl Into<String>) -> Self {
        Self {
            was_clean: true,
            code,
            reason: reason.into(),
        }
    }

    pub fn unclean() -> Self {
        Self {
            was_clean: false,
            code: CLOSE_ABNORMAL,
            reason: String::new(),
        }
    }
}

/// Everything the stream session reacts to, in the order it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The duplex connection acknowledged the open.
    Open,
    /// One inbound frame, already decoded to text.
    Message(String),
    Close(CloseInfo),
    Error(String),
    /// Raw bytes typed into the terminal surface.
    Input(Vec<u8>),
    Resize(u16, u16),
    /// The viewer asked to leave (detach key or Ctrl-C in plain mode).
    Detach,
}
