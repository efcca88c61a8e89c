//! Directed message protocol
//!
//! Line-oriented text grammar `DIRECTIVE ":" CONTENT`, parsed once into a
//! tagged `Directive` so the dispatcher never indexes into split strings.

use std::fmt;

use crate::error::ParseError;
use crate::types::ClientId;

/// Directive token that requests closing a client
pub const CLOSE_DIRECTIVE: &str = "CLOSE";

/// Field separator between directive and content
const SEPARATOR: char = ':';

/// A parsed inbound message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// `CLOSE:<id>` - close the named client
    Close(ClientId),
    /// `<id>:<content>` - deliver content to the named client
    Deliver { target: ClientId, content: String },
}

impl Directive {
    /// Parse a raw line, splitting at the first colon only
    ///
    /// Content keeps any further colons verbatim. A line with no colon at all
    /// is rejected.
    pub fn parse(raw: &str) -> Result<Self, ParseError> {
        let Some((directive, content)) = raw.split_once(SEPARATOR) else {
            return Err(ParseError::MissingSeparator(raw.to_string()));
        };

        if directive == CLOSE_DIRECTIVE {
            Ok(Directive::Close(ClientId::from(content)))
        } else {
            Ok(Directive::Deliver {
                target: ClientId::from(directive),
                content: content.to_string(),
            })
        }
    }
}

impl std::str::FromStr for Directive {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Renders the wire form, e.g. `CLOSE:abc` or `abc:hello`
impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Directive::Close(id) => write!(f, "{CLOSE_DIRECTIVE}{SEPARATOR}{id}"),
            Directive::Deliver { target, content } => write!(f, "{target}{SEPARATOR}{content}"),
        }
    }
}
