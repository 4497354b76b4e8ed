/// Declares an identifier enum whose variants serialize as a fixed lowercase name.
///
/// Every variant lists its wire name, a human label and optional aliases. Parsing is
/// case-insensitive over all three and anything else becomes `Custom`, so a spec file
/// can name a stack or tool this crate does not know yet.
#[macro_export]
macro_rules! id_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $(
                $variant:ident ( $wire:literal, $label:literal $(, [ $($alias:literal),* ])? )
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        pub enum $name {
            $( $variant, )*
            Custom(String),
        }

        impl $name {
            pub fn as_str(&self) -> &str {
                match self {
                    $( Self::$variant => $wire, )*
                    Self::Custom(name) => name,
                }
            }

            pub fn label(&self) -> &str {
                match self {
                    $( Self::$variant => $label, )*
                    Self::Custom(name) => name,
                }
            }

            pub fn is_custom(&self) -> bool {
                matches!(self, Self::Custom(_))
            }
        }

        impl From<&str> for $name {
            fn from(raw: &str) -> Self {
                let raw = raw.trim();
                $(
                    if raw.eq_ignore_ascii_case($wire)
                        || raw.eq_ignore_ascii_case($label)
                        $( $( || raw.eq_ignore_ascii_case($alias) )* )?
                    {
                        return Self::$variant;
                    }
                )*
                Self::Custom(raw.to_string())
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl serde::Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                Ok(Self::from(raw.as_str()))
            }
        }
    };
}
