//! Maildir message file names
//!
//! A delivered message is named `<unique>:2,<flags>`, where the flags are
//! single uppercase letters kept in ASCII order (`S` marks the message seen).
//! Messages in `new/` usually carry no info part at all.

/// Separates the unique part of a file name from its info part
pub const INFO_SEPARATOR: char = ':';

/// Flag letter marking a message as seen
pub const SEEN_FLAG: char = 'S';

/// A parsed message file name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageName<'a> {
    /// Unique part, used as the key for POP3 UIDL lookups
    pub base: &'a str,
    /// Flag letters, when the info part uses the `2,` layout
    pub flags: Option<&'a str>,
}

impl<'a> MessageName<'a> {
    /// Split a file name into its unique part and flags
    pub fn parse(name: &'a str) -> Self {
        match name.split_once(INFO_SEPARATOR) {
            Some((base, info)) => Self {
                base,
                flags: info.strip_prefix("2,"),
            },
            None => Self {
                base: name,
                flags: None,
            },
        }
    }

    /// Whether the message has been seen by a client
    pub fn is_seen(&self) -> bool {
        self.flags.is_some_and(|flags| flags.contains(SEEN_FLAG))
    }
}

/// Unique part of a message file name (everything before the first `:`)
pub fn base_name(name: &str) -> &str {
    MessageName::parse(name).base
}

/// Whether a message file name carries the seen flag
pub fn is_seen(name: &str) -> bool {
    MessageName::parse(name).is_seen()
}
