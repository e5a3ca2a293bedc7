//! Tokens passed to the tool for formats and modes

use command_executor::Argument;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Define a string-token enum with `Display`, `FromStr` and argument conversion
macro_rules! tool_tokens {
    (
        $(#[$meta:meta])*
        $name:ident { $($(#[$vmeta:meta])* $variant:ident => $token:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                $(#[$vmeta])*
                #[serde(rename = $token)]
                $variant,
            )+
        }

        impl $name {
            /// Every value, in declaration order
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Token used on the tool's command line
            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $token,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                $name::ALL
                    .iter()
                    .copied()
                    .find(|value| value.as_str().eq_ignore_ascii_case(s))
                    .ok_or_else(|| {
                        let known: Vec<_> = $name::ALL.iter().map(|v| v.as_str()).collect();
                        format!("unknown {} '{}', expected one of: {}", stringify!($name), s, known.join(", "))
                    })
            }
        }

        impl From<$name> for Argument {
            fn from(value: $name) -> Self {
                Argument::Text(value.as_str().to_string())
            }
        }
    };
}

tool_tokens! {
    /// Data interchange format for `--inputFormat` / `--outputFormat`
    DataFormat {
        /// JSON
        Json => "json",
        /// Binary JSON
        Bson => "bson",
        /// MessagePack
        MessagePack => "msgpack",
        /// Excel workbook
        Xlsx => "xlsx",
        /// XLIFF 1.2 translation file
        Xliff1 => "xliff1",
        /// XLIFF 2.0 translation file
        Xliff2 => "xliff2",
    }
}

tool_tokens! {
    /// How `DATA IMPORT` merges documents into existing data
    ImportMode {
        /// Create new documents and update existing ones
        CreateAndUpdate => "CreateAndUpdate",
        /// Only create documents that do not exist
        Create => "Create",
        /// Only update existing documents
        Update => "Update",
        /// Update only the fields present in the input
        SafeUpdate => "SafeUpdate",
        /// Replace all documents of the imported schemas
        Replace => "Replace",
        /// Delete the listed documents
        Delete => "Delete",
    }
}

tool_tokens! {
    /// Checks and fixes requested from `DATA VALIDATE`
    ValidationOption {
        /// Fix repairable issues in place
        Repair => "Repair",
        /// Report missing translations
        CheckTranslation => "CheckTranslation",
        /// Assign new ids to duplicated documents
        DeduplicateIds => "DeduplicateIds",
        /// Fill missing required values with defaults while repairing
        RepairRequiredWithDefaultValue => "RepairRequiredWithDefaultValue",
        /// Remove values that fail validation while repairing
        EraseInvalidValue => "EraseInvalidValue",
        /// Check required values
        CheckRequirements => "CheckRequirements",
        /// Check value formats
        CheckFormat => "CheckFormat",
        /// Check unique constraints
        CheckUniqueness => "CheckUniqueness",
        /// Check references between documents
        CheckReferences => "CheckReferences",
        /// Check schema specifications
        CheckSpecification => "CheckSpecification",
        /// Check value constraints
        CheckConstraints => "CheckConstraints",
    }
}

impl DataFormat {
    /// Usual file extension
    pub fn extension(self) -> &'static str {
        match self {
            DataFormat::Json => "json",
            DataFormat::Bson => "bson",
            DataFormat::MessagePack => "msgpack",
            DataFormat::Xlsx => "xlsx",
            DataFormat::Xliff1 | DataFormat::Xliff2 => "xliff",
        }
    }
}
