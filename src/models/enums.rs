use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern.
/// The serde representation is the same string as `as_str`.
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $s)] $variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }
    };
}

str_enum!(RedactionKind {
    Name => "NAME",
    Date => "DATE",
    Id => "ID",
    Location => "LOCATION",
    Contact => "CONTACT",
    Other => "OTHER",
});

str_enum!(DraftMethod {
    RuleBased => "ruleBased",
    External => "external",
});

str_enum!(EmailStatus {
    Created => "created",
    Pending => "email_pending",
    Failed => "email_failed",
    Sent => "email_sent",
});

/// Five-point entrustment scale. Variant order is the ordinal order, so
/// `Intervention < Direction < Support < Autonomy < Excellence`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EntrustmentLevel {
    Intervention,
    Direction,
    Support,
    Autonomy,
    Excellence,
}

impl EntrustmentLevel {
    pub const ALL: [EntrustmentLevel; 5] = [
        Self::Intervention,
        Self::Direction,
        Self::Support,
        Self::Autonomy,
        Self::Excellence,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Intervention => "Intervention",
            Self::Direction => "Direction",
            Self::Support => "Support",
            Self::Autonomy => "Autonomy",
            Self::Excellence => "Excellence",
        }
    }

    /// One-line descriptor used in the external analysis prompt.
    pub fn descriptor(&self) -> &'static str {
        match self {
            Self::Intervention => "attending must step in / take over for safety or completeness",
            Self::Direction => "frequent prompting or close direction needed",
            Self::Support => "needs intermittent support/check-ins but can proceed",
            Self::Autonomy => "can perform independently in routine cases; minimal oversight",
            Self::Excellence => "consistently above expected; could coach others",
        }
    }
}

impl Default for EntrustmentLevel {
    fn default() -> Self {
        Self::Support
    }
}

impl std::fmt::Display for EntrustmentLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EntrustmentLevel {
    type Err = DatabaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|level| level.as_str() == s)
            .ok_or_else(|| DatabaseError::InvalidEnum {
                field: "EntrustmentLevel".into(),
                value: s.into(),
            })
    }
}
