use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// External job boards and listing surfaces a job can be published to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ChannelName {
    #[serde(rename = "LINKEDIN")]
    LinkedIn,
    #[serde(rename = "INDEED")]
    Indeed,
    #[serde(rename = "INTERNAL")]
    Internal,
}

impl ChannelName {
    pub const ALL: [ChannelName; 3] = [
        ChannelName::LinkedIn,
        ChannelName::Indeed,
        ChannelName::Internal,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            ChannelName::LinkedIn => "LINKEDIN",
            ChannelName::Indeed => "INDEED",
            ChannelName::Internal => "INTERNAL",
        }
    }
}

impl fmt::Display for ChannelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown publish channel '{0}'")]
pub struct UnknownChannel(pub String);

impl FromStr for ChannelName {
    type Err = UnknownChannel;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "LINKEDIN" => Ok(ChannelName::LinkedIn),
            "INDEED" => Ok(ChannelName::Indeed),
            "INTERNAL" => Ok(ChannelName::Internal),
            _ => Err(UnknownChannel(value.to_string())),
        }
    }
}
