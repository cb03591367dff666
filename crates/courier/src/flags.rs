//! Directive markers embedded in command and subcommand identifiers.
//!
//! A directive is a marker character followed by `ー` (U+30FC) at the very
//! start of an identifier. Directives stack:
//!
//! | identifier      | flags              | clean name |
//! |-----------------|--------------------|------------|
//! | `echo`          | none               | `echo`     |
//! | `Aーkick`       | `ADMIN_ONLY`       | `kick`     |
//! | `RーGOOS`       | `RAW`              | `GOOS`     |
//! | `AーRーGOOS`    | `ADMIN_ONLY, RAW`  | `GOOS`     |
//! | `Xーfoo`        | none               | `Xーfoo`   |
//!
//! Parsing stops at the first marker it does not recognise and leaves the
//! rest of the identifier untouched.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Separator that turns the preceding character into a directive marker.
pub const DIRECTIVE_SEPARATOR: char = 'ー';

/// Set of directives attached to a command or subcommand.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Flags(u8);

impl Flags {
    /// No directives.
    pub const NONE: Self = Self(0);
    /// Only administrators may invoke the command, or any command of the
    /// subcommand.
    pub const ADMIN_ONLY: Self = Self(1 << 0);
    /// Keep the original casing and match incoming tokens exactly.
    pub const RAW: Self = Self(1 << 1);

    /// Returns `true` if every flag in `other` is set.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns `true` if no flag is set.
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Returns `true` if the admin-only directive is set.
    pub const fn is_admin_only(self) -> bool {
        self.contains(Self::ADMIN_ONLY)
    }

    /// Returns `true` if the raw-casing directive is set.
    pub const fn is_raw(self) -> bool {
        self.contains(Self::RAW)
    }

    fn from_marker(marker: char) -> Option<Self> {
        match marker {
            'A' => Some(Self::ADMIN_ONLY),
            'R' => Some(Self::RAW),
            _ => None,
        }
    }
}

impl BitOr for Flags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for Flags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for Flags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut set = f.debug_set();
        if self.is_admin_only() {
            set.entry(&"ADMIN_ONLY");
        }
        if self.is_raw() {
            set.entry(&"RAW");
        }
        set.finish()
    }
}

/// Splits the leading directives off an identifier.
///
/// Never fails: an identifier without recognised directives is returned
/// unchanged with [`Flags::NONE`].
pub fn parse_flags(identifier: &str) -> (Flags, &str) {
    let mut flags = Flags::NONE;
    let mut rest = identifier;

    loop {
        let mut chars = rest.chars();
        let (Some(marker), Some(DIRECTIVE_SEPARATOR)) = (chars.next(), chars.next()) else {
            break;
        };
        let Some(flag) = Flags::from_marker(marker) else {
            break;
        };

        flags |= flag;
        rest = chars.as_str();
    }

    (flags, rest)
}

/// Parses an identifier into its flags and the name it is matched by.
///
/// The name is lower-cased unless the raw-casing directive is present.
pub fn resolve_name(identifier: &str) -> (Flags, String) {
    let (flags, name) = parse_flags(identifier);
    let name = if flags.is_raw() {
        name.to_owned()
    } else {
        name.to_lowercase()
    };
    (flags, name)
}

/// Returns `true` if `token` selects a target named `name` with `flags`.
pub(crate) fn matches_name(flags: Flags, name: &str, token: &str) -> bool {
    if flags.is_raw() {
        name == token
    } else {
        name == token.to_lowercase()
    }
}

/// Returns `true` if some token would select both targets.
///
/// Two raw-cased names only collide when equal; otherwise the comparison
/// ignores case.
pub(crate) fn names_overlap(a: (Flags, &str), b: (Flags, &str)) -> bool {
    if a.0.is_raw() && b.0.is_raw() {
        a.1 == b.1
    } else {
        a.1.to_lowercase() == b.1.to_lowercase()
    }
}
