//! Protocol version identification.

use strum_macros::{Display, EnumString};

/// A supported FIX protocol version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
pub enum FixVersion {
    #[strum(serialize = "FIX.4.2")]
    Fix42,
    #[strum(serialize = "FIX.4.4")]
    Fix44,
    #[strum(serialize = "FIX.5.0")]
    Fix50,
    #[strum(serialize = "FIX.5.0SP1")]
    Fix50Sp1,
    #[strum(serialize = "FIX.5.0SP2")]
    Fix50Sp2,
    #[strum(serialize = "FIXT.1.1")]
    Fixt11,
}

impl FixVersion {
    /// The canonical token naming this protocol version.
    #[must_use]
    pub const fn begin_string(self) -> &'static str {
        match self {
            FixVersion::Fix42 => "FIX.4.2",
            FixVersion::Fix44 => "FIX.4.4",
            FixVersion::Fix50 => "FIX.5.0",
            FixVersion::Fix50Sp1 => "FIX.5.0SP1",
            FixVersion::Fix50Sp2 => "FIX.5.0SP2",
            FixVersion::Fixt11 => "FIXT.1.1",
        }
    }

    /// The token that travels in tag 8 on the wire.
    ///
    /// The FIX 5.0 family rides the FIXT 1.1 transport, so its messages
    /// carry `FIXT.1.1` rather than the application version token.
    #[must_use]
    pub const fn transport_begin_string(self) -> &'static str {
        match self {
            FixVersion::Fix50 | FixVersion::Fix50Sp1 | FixVersion::Fix50Sp2 | FixVersion::Fixt11 => {
                "FIXT.1.1"
            }
            other => other.begin_string(),
        }
    }

    /// Resolves the `<fix>` root attributes of a QuickFIX dictionary.
    #[must_use]
    pub(crate) fn from_xml_attrs(
        fix_type: &str,
        major: &str,
        minor: &str,
        servicepack: &str,
    ) -> Option<Self> {
        match (fix_type, major, minor, servicepack) {
            ("FIX", "4", "2", "0") => Some(FixVersion::Fix42),
            ("FIX", "4", "4", "0") => Some(FixVersion::Fix44),
            ("FIX", "5", "0", "0") => Some(FixVersion::Fix50),
            ("FIX", "5", "0", "1") => Some(FixVersion::Fix50Sp1),
            ("FIX", "5", "0", "2") => Some(FixVersion::Fix50Sp2),
            ("FIXT", "1", "1", "0") => Some(FixVersion::Fixt11),
            _ => None,
        }
    }
}
