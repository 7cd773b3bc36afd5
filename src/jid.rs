/// Messaging identifiers (JIDs)
///
/// A JID has the text form `user[_agent][:device]@server`. Only two servers
/// matter for identity mapping: `lid` for linked identifiers and
/// `s.whatsapp.net` for phone-number identifiers.
use serde::{Serialize, Serializer};
use std::fmt;

/// Server of linked-identifier users
pub const LID_SERVER: &str = "lid";

/// Canonical server of phone-number users
pub const PN_SERVER: &str = "s.whatsapp.net";

/// Addressing namespace of a user identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// Linked identifier
    Lid,
    /// Phone number
    Pn,
}

impl Namespace {
    /// Server suffix used when building identifiers in this namespace
    pub fn server(self) -> &'static str {
        match self {
            Namespace::Lid => LID_SERVER,
            Namespace::Pn => PN_SERVER,
        }
    }

    fn from_server(server: &str) -> Option<Self> {
        match server {
            LID_SERVER => Some(Namespace::Lid),
            PN_SERVER => Some(Namespace::Pn),
            _ => None,
        }
    }
}

/// Decoded identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Jid {
    user: String,
    agent: Option<u8>,
    device: Option<u16>,
    server: String,
}

impl Jid {
    /// Build a device-specific identifier in the given namespace
    pub fn new(user: impl Into<String>, device: Option<u16>, namespace: Namespace) -> Self {
        Self {
            user: user.into(),
            agent: None,
            device,
            server: namespace.server().to_string(),
        }
    }

    /// Build a LID identifier
    pub fn lid(user: impl Into<String>, device: u16) -> Self {
        Self::new(user, Some(device), Namespace::Lid)
    }

    /// Build a phone-number identifier
    pub fn pn(user: impl Into<String>, device: u16) -> Self {
        Self::new(user, Some(device), Namespace::Pn)
    }

    /// Decode an identifier string
    ///
    /// Returns `None` when there is no `@`, the user part is empty, or the
    /// agent/device decorations are not integers.
    pub fn decode(jid: &str) -> Option<Self> {
        let (user_combined, server) = jid.split_once('@')?;

        let (user_agent, device) = match user_combined.split_once(':') {
            Some((user_agent, device)) => (user_agent, Some(device.parse::<u16>().ok()?)),
            None => (user_combined, None),
        };

        let (user, agent) = match user_agent.split_once('_') {
            Some((user, agent)) => (user, Some(agent.parse::<u8>().ok()?)),
            None => (user_agent, None),
        };

        if user.is_empty() {
            return None;
        }

        Some(Self {
            user: user.to_string(),
            agent,
            device,
            server: server.to_string(),
        })
    }

    /// Account portion, independent of device
    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn agent(&self) -> Option<u8> {
        self.agent
    }

    /// Device index, if the identifier carries one
    pub fn device(&self) -> Option<u16> {
        self.device
    }

    /// Device index, treating an absent index as the primary device (0)
    pub fn device_or_primary(&self) -> u16 {
        self.device.unwrap_or(0)
    }

    /// Namespace of this identifier, if it is a LID or PN identifier
    pub fn namespace(&self) -> Option<Namespace> {
        Namespace::from_server(&self.server)
    }
}

impl fmt::Display for Jid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.user)?;
        if let Some(agent) = self.agent {
            write!(f, "_{}", agent)?;
        }
        if let Some(device) = self.device {
            write!(f, ":{}", device)?;
        }
        write!(f, "@{}", self.server)
    }
}

impl Serialize for Jid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Structural check: does this identifier address a user in `namespace`?
///
/// Looks only at the server suffix, without decoding.
pub fn is_user_in_namespace(jid: &str, namespace: Namespace) -> bool {
    jid.strip_suffix(namespace.server())
        .is_some_and(|rest| rest.ends_with('@'))
}

/// Is this a LID user identifier?
pub fn is_lid_user(jid: &str) -> bool {
    is_user_in_namespace(jid, Namespace::Lid)
}

/// Is this a phone-number user identifier?
pub fn is_pn_user(jid: &str) -> bool {
    is_user_in_namespace(jid, Namespace::Pn)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_plain_user() {
        let jid = Jid::decode("554396160286@s.whatsapp.net").unwrap();
        assert_eq!(jid.user(), "554396160286");
        assert_eq!(jid.device(), None);
        assert_eq!(jid.agent(), None);
        assert_eq!(jid.namespace(), Some(Namespace::Pn));
    }

    #[test]
    fn test_decode_device_and_agent() {
        let jid = Jid::decode("102765716062358_1:7@lid").unwrap();
        assert_eq!(jid.user(), "102765716062358");
        assert_eq!(jid.agent(), Some(1));
        assert_eq!(jid.device(), Some(7));
        assert_eq!(jid.namespace(), Some(Namespace::Lid));
        assert_eq!(jid.to_string(), "102765716062358_1:7@lid");
    }

    #[test]
    fn test_decode_rejects_malformed() {
        assert!(Jid::decode("no-server").is_none());
        assert!(Jid::decode("@lid").is_none());
        assert!(Jid::decode("123:abc@lid").is_none());
        assert!(Jid::decode("123_x@s.whatsapp.net").is_none());
    }

    #[test]
    fn test_other_servers_have_no_namespace() {
        let group = Jid::decode("120363025246125244@g.us").unwrap();
        assert_eq!(group.namespace(), None);
    }

    #[test]
    fn test_device_or_primary() {
        assert_eq!(Jid::decode("1@lid").unwrap().device_or_primary(), 0);
        assert_eq!(Jid::decode("1:4@lid").unwrap().device_or_primary(), 4);
    }

    #[test]
    fn test_constructors_render_device() {
        assert_eq!(Jid::lid("99999", 0).to_string(), "99999:0@lid");
        assert_eq!(Jid::pn("123456", 5).to_string(), "123456:5@s.whatsapp.net");
    }

    #[test]
    fn test_namespace_predicates() {
        assert!(is_lid_user("99999:2@lid"));
        assert!(!is_lid_user("99999@hosted.lid"));
        assert!(is_pn_user("123456@s.whatsapp.net"));
        assert!(!is_pn_user("123456@lid"));
        assert!(!is_pn_user("s.whatsapp.net"));
    }

    #[test]
    fn test_serializes_as_string() {
        let json = serde_json::to_string(&Jid::lid("42", 3)).unwrap();
        assert_eq!(json, "\"42:3@lid\"");
    }
}
