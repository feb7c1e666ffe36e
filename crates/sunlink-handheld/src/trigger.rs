use sunlink_channel::MessageEvent;
use sunlink_weather::LATEST_DATA_PATH;

/// Something that may cause the agent to publish a fresh snapshot.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncTrigger {
    /// One-shot message received from a paired device.
    PeerMessage(MessageEvent),
    /// The local forecast store was updated.
    ForecastChanged,
    /// Explicit push request; `false` means "nothing to send".
    PushNow { send_data: bool },
}

impl SyncTrigger {
    /// True if this trigger should result in a publish.
    pub fn requests_sync(&self) -> bool {
        match self {
            SyncTrigger::PeerMessage(message) => message.path == LATEST_DATA_PATH,
            SyncTrigger::ForecastChanged => true,
            SyncTrigger::PushNow { send_data } => *send_data,
        }
    }

    /// Peer messages only arrive over a live connection; everything else
    /// may need to bring one up first.
    pub fn needs_connection(&self) -> bool {
        !matches!(self, SyncTrigger::PeerMessage(_))
    }
}
