//! Override state flags
//!
//! [`OverrideState`] records how a location in a derived document relates to
//! its base: inherited (`BASE`), locally set (`NEW`), or locally set and
//! closed to further propagation (`SEALED`). `NEW` and `SEALED` combine.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::ops::{BitOr, BitOrAssign};

/// Two-flag override state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OverrideState(u8);

impl OverrideState {
    /// Inherited from the base
    pub const BASE: Self = Self(0);
    /// Locally overridden
    pub const NEW: Self = Self(0b01);
    /// Propagation stops here
    pub const SEALED: Self = Self(0b10);

    #[inline]
    #[must_use]
    pub const fn is_base(self) -> bool {
        self.0 == 0
    }

    #[inline]
    #[must_use]
    pub const fn is_new(self) -> bool {
        self.0 & Self::NEW.0 != 0
    }

    #[inline]
    #[must_use]
    pub const fn is_sealed(self) -> bool {
        self.0 & Self::SEALED.0 != 0
    }

    /// New or sealed
    #[inline]
    #[must_use]
    pub const fn is_overridden(self) -> bool {
        self.0 != 0
    }

    /// Both flags of `other` set
    #[inline]
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Persisted marker: `""`, `"*"`, `"!"` or `"*!"`
    #[must_use]
    pub const fn marker(self) -> &'static str {
        match (self.is_new(), self.is_sealed()) {
            (false, false) => "",
            (true, false) => "*",
            (false, true) => "!",
            (true, true) => "*!",
        }
    }

    /// Parse a marker (`!*` accepted as well)
    #[must_use]
    pub fn from_marker(marker: &str) -> Option<Self> {
        match marker {
            "" => Some(Self::BASE),
            "*" => Some(Self::NEW),
            "!" => Some(Self::SEALED),
            "*!" | "!*" => Some(Self::NEW | Self::SEALED),
            _ => None,
        }
    }

    /// Split trailing marker characters off a name
    ///
    /// `"Name*!"` gives `("Name", NEW | SEALED)`.
    #[must_use]
    pub fn split_marker(text: &str) -> (&str, Self) {
        let trimmed = text.trim_end_matches(|c: char| c == '*' || c == '!');
        let marker = &text[trimmed.len()..];
        match Self::from_marker(marker) {
            Some(state) => (trimmed, state),
            None => (text, Self::BASE),
        }
    }
}

impl BitOr for OverrideState {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for OverrideState {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl Display for OverrideState {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match (self.is_new(), self.is_sealed()) {
            (false, false) => "Base",
            (true, false) => "New",
            (false, true) => "Sealed",
            (true, true) => "New|Sealed",
        };
        f.write_str(name)
    }
}
