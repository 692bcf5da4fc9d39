use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }

            /// Every variant, in declaration order.
            pub fn all() -> &'static [Self] {
                &[$(Self::$variant),+]
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

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

str_enum!(Participant {
    System => "system",
    User => "user",
    Assistant => "assistant",
});

str_enum!(EnergyState {
    Balanced => "balanced",
    Blocked => "blocked",
    Overactive => "overactive",
    Depleted => "depleted",
    Scattered => "scattered",
});

str_enum!(ChakraType {
    Root => "root",
    Sacral => "sacral",
    SolarPlexus => "solar_plexus",
    Heart => "heart",
    Throat => "throat",
    ThirdEye => "third_eye",
    Crown => "crown",
});

impl EnergyState {
    /// Canonical value for anything the model returns outside the closed set.
    pub const FALLBACK: Self = Self::Balanced;

    /// Lenient mapping from model output. Unknown labels become `FALLBACK`.
    pub fn from_model(label: &str) -> Self {
        let normalized = label.trim().to_lowercase();
        match normalized.parse() {
            Ok(state) => state,
            Err(_) => {
                tracing::debug!(label = %normalized, "Unknown energy state, using fallback");
                Self::FALLBACK
            }
        }
    }
}

impl ChakraType {
    /// Match a model-supplied chakra key against the closed set.
    ///
    /// Case-insensitive; ignores `_`, `-` and spaces, so `solarPlexus`,
    /// `solar_plexus` and `Solar Plexus` all resolve. Unknown keys → `None`.
    pub fn from_key(key: &str) -> Option<Self> {
        let compact: String = key
            .chars()
            .filter(|c| !matches!(c, '_' | '-' | ' '))
            .flat_map(char::to_lowercase)
            .collect();

        Self::all()
            .iter()
            .copied()
            .find(|chakra| chakra.as_str().replace('_', "") == compact)
    }
}
