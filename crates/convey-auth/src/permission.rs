//! The 4-bit capability mask model.
//!
//! An account's `permission_mask` is an integer in `0..=15`; bit *n* set
//! grants the corresponding capability:
//!
//! | Capability | Bit | Mask value |
//! |------------|-----|------------|
//! | item       | 0   | 1          |
//! | user       | 1   | 2          |
//! | activity   | 2   | 4          |
//! | score      | 3   | 8          |
//! | super      | —   | 15 (all bits) |
//!
//! `super` is not a bit of its own: it is the all-ones mask, and a mask that
//! reaches 15 by OR-ing the four individual bits is indistinguishable from
//! it. That collapse is inherited from the source design and preserved here.

/// The all-ones super mask.
pub const SUPER_MASK: u8 = 0b1111;

/// A named permission. Closed set; route handlers declare which of these an
/// operation requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Item,
    User,
    Activity,
    Score,
    Super,
}

impl Capability {
    /// Parse a lowercase capability name. Unknown names are `None`, which
    /// callers treat as "grants nothing", never as an error.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "item" => Some(Self::Item),
            "user" => Some(Self::User),
            "activity" => Some(Self::Activity),
            "score" => Some(Self::Score),
            "super" => Some(Self::Super),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Item => "item",
            Self::User => "user",
            Self::Activity => "activity",
            Self::Score => "score",
            Self::Super => "super",
        }
    }

    /// The mask value of this capability; 15 for `Super`.
    pub fn mask_value(&self) -> u8 {
        match self {
            Self::Item => 1,
            Self::User => 2,
            Self::Activity => 4,
            Self::Score => 8,
            Self::Super => SUPER_MASK,
        }
    }
}

/// True iff `mask` grants `capability`. `Super` is granted only by the exact
/// all-ones mask; every other capability is a plain bit test. Out-of-range
/// masks grant nothing.
pub fn grants(capability: Capability, mask: u8) -> bool {
    if mask > SUPER_MASK {
        return false;
    }
    match capability {
        Capability::Super => mask == SUPER_MASK,
        other => mask & other.mask_value() != 0,
    }
}

/// String-keyed variant of [`grants`]; unknown capability names are never
/// granted.
pub fn grants_named(name: &str, mask: u8) -> bool {
    Capability::parse(name).is_some_and(|cap| grants(cap, mask))
}

/// AND semantics over a required set: every capability must be granted.
/// Vacuously true for the empty set ("any authenticated operator").
pub fn grants_all(capabilities: &[Capability], mask: u8) -> bool {
    capabilities.iter().all(|cap| grants(*cap, mask))
}

/// A mask is valid iff it is in `0..=15` and is either the super mask or has
/// at most three bits set.
///
/// Inherited quirk: 15 is the only 4-bit value in range, so the "at most
/// three bits unless super" rule never actually rejects a reachable mask.
/// Kept as documented behavior rather than redesigned.
pub fn is_valid_mask(mask: u8) -> bool {
    mask <= SUPER_MASK && (mask == SUPER_MASK || mask.count_ones() <= 3)
}
