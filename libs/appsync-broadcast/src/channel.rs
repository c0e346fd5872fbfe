//! Channel name parsing.
//!
//! A fully-qualified channel looks like `{namespace}/{prefix-}{name}` where the
//! prefix is `private-`, `presence-` or absent.

const PRIVATE_PREFIX: &str = "private-";
const PRESENCE_PREFIX: &str = "presence-";

/// Access class of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    Public,
    Private,
    Presence,
}

impl ChannelKind {
    pub fn is_guarded(self) -> bool {
        !matches!(self, Self::Public)
    }
}

#[derive(Debug, Clone)]
pub struct ChannelClassifier {
    namespace_prefix: String,
    private_prefix: String,
    presence_prefix: String,
}

impl ChannelClassifier {
    pub fn new(namespace: &str) -> Self {
        let namespace_prefix = format!("{namespace}/");
        Self {
            private_prefix: format!("{namespace_prefix}{PRIVATE_PREFIX}"),
            presence_prefix: format!("{namespace_prefix}{PRESENCE_PREFIX}"),
            namespace_prefix,
        }
    }

    pub fn is_private(&self, channel: &str) -> bool {
        channel.starts_with(&self.private_prefix)
    }

    pub fn is_presence(&self, channel: &str) -> bool {
        channel.starts_with(&self.presence_prefix)
    }

    pub fn is_guarded(&self, channel: &str) -> bool {
        self.is_private(channel) || self.is_presence(channel)
    }

    pub fn classify(&self, channel: &str) -> ChannelKind {
        if self.is_private(channel) {
            ChannelKind::Private
        } else if self.is_presence(channel) {
            ChannelKind::Presence
        } else {
            ChannelKind::Public
        }
    }

    /// Strip the `{namespace}/private-` or `{namespace}/presence-` prefix.
    /// Anything else is returned unchanged.
    pub fn normalize<'a>(&self, channel: &'a str) -> &'a str {
        channel
            .strip_prefix(self.private_prefix.as_str())
            .or_else(|| channel.strip_prefix(self.presence_prefix.as_str()))
            .unwrap_or(channel)
    }

    /// Scope a logical channel name to the namespace.
    pub fn qualify(&self, channel: &str) -> String {
        format!("{}{}", self.namespace_prefix, channel)
    }
}
