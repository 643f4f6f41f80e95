//! Registry value data types.
//!
//! The numeric codes match the `REG_*` constants used by the Windows registry
//! and by the `hex(N):` encoding of `.reg` files. Only five of them are
//! supported by the value model; the others are recognised so they can be
//! named in errors and skipped while parsing.

/// Registry value data types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ValueType {
    /// No value type.
    None,

    /// String (null-terminated).
    String,

    /// String with environment variable references.
    ExpandString,

    /// Binary data.
    Binary,

    /// 32-bit little-endian integer.
    Dword,

    /// 32-bit big-endian integer.
    DwordBigEndian,

    /// Symbolic link (Unicode).
    Link,

    /// Multiple strings.
    MultiString,

    /// Resource list.
    ResourceList,

    /// Full resource descriptor.
    FullResourceDescriptor,

    /// Resource requirements list.
    ResourceRequirementsList,

    /// 64-bit little-endian integer.
    Qword,

    /// Unknown or non-standard value type.
    /// Contains the raw type value.
    Unknown(u32),
}

impl ValueType {
    /// The value types the value model can hold.
    pub const SUPPORTED: [ValueType; 5] = [
        ValueType::String,
        ValueType::ExpandString,
        ValueType::Binary,
        ValueType::Dword,
        ValueType::MultiString,
    ];

    /// Converts a numeric `REG_*` code into a value type.
    ///
    /// Codes outside 0-11 are returned as `ValueType::Unknown`.
    pub fn from_u32(value: u32) -> Self {
        match value {
            0 => ValueType::None,
            1 => ValueType::String,
            2 => ValueType::ExpandString,
            3 => ValueType::Binary,
            4 => ValueType::Dword,
            5 => ValueType::DwordBigEndian,
            6 => ValueType::Link,
            7 => ValueType::MultiString,
            8 => ValueType::ResourceList,
            9 => ValueType::FullResourceDescriptor,
            10 => ValueType::ResourceRequirementsList,
            11 => ValueType::Qword,
            _ => ValueType::Unknown(value),
        }
    }

    /// Returns the numeric `REG_*` code of this type.
    pub fn as_u32(&self) -> u32 {
        match self {
            ValueType::None => 0,
            ValueType::String => 1,
            ValueType::ExpandString => 2,
            ValueType::Binary => 3,
            ValueType::Dword => 4,
            ValueType::DwordBigEndian => 5,
            ValueType::Link => 6,
            ValueType::MultiString => 7,
            ValueType::ResourceList => 8,
            ValueType::FullResourceDescriptor => 9,
            ValueType::ResourceRequirementsList => 10,
            ValueType::Qword => 11,
            ValueType::Unknown(value) => *value,
        }
    }

    /// Returns the name of this value type.
    pub fn name(&self) -> String {
        match self {
            ValueType::None => "REG_NONE".to_string(),
            ValueType::String => "REG_SZ".to_string(),
            ValueType::ExpandString => "REG_EXPAND_SZ".to_string(),
            ValueType::Binary => "REG_BINARY".to_string(),
            ValueType::Dword => "REG_DWORD".to_string(),
            ValueType::DwordBigEndian => "REG_DWORD_BIG_ENDIAN".to_string(),
            ValueType::Link => "REG_LINK".to_string(),
            ValueType::MultiString => "REG_MULTI_SZ".to_string(),
            ValueType::ResourceList => "REG_RESOURCE_LIST".to_string(),
            ValueType::FullResourceDescriptor => "REG_FULL_RESOURCE_DESCRIPTOR".to_string(),
            ValueType::ResourceRequirementsList => "REG_RESOURCE_REQUIREMENTS_LIST".to_string(),
            ValueType::Qword => "REG_QWORD".to_string(),
            ValueType::Unknown(value) => format!("REG_UNKNOWN_{:#010x}", value),
        }
    }

    /// Returns true if the value model can hold this type.
    pub fn is_supported(&self) -> bool {
        Self::SUPPORTED.contains(self)
    }

    /// Returns the `.reg` encoding tag used for the hex form of this type.
    ///
    /// Binary uses the short `hex` tag; every other type is written as
    /// `hex(N)` with its numeric code in lowercase hex.
    pub fn hex_tag(&self) -> String {
        match self {
            ValueType::Binary => "hex".to_string(),
            other => format!("hex({:x})", other.as_u32()),
        }
    }
}

impl std::fmt::Display for ValueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_type() {
        assert_eq!(ValueType::from_u32(1), ValueType::String);
        assert_eq!(ValueType::from_u32(4), ValueType::Dword);
        assert_eq!(ValueType::String.name(), "REG_SZ");
    }

    #[test]
    fn test_code_roundtrip() {
        for code in 0..=12 {
            assert_eq!(ValueType::from_u32(code).as_u32(), code);
        }
        assert!(matches!(ValueType::from_u32(0xFFFF0011), ValueType::Unknown(0xFFFF0011)));
    }

    #[test]
    fn test_supported_set() {
        assert!(ValueType::MultiString.is_supported());
        assert!(ValueType::ExpandString.is_supported());
        assert!(!ValueType::Qword.is_supported());
        assert!(!ValueType::None.is_supported());
        assert!(!ValueType::Unknown(42).is_supported());
    }

    #[test]
    fn test_hex_tag() {
        assert_eq!(ValueType::Binary.hex_tag(), "hex");
        assert_eq!(ValueType::ExpandString.hex_tag(), "hex(2)");
        assert_eq!(ValueType::MultiString.hex_tag(), "hex(7)");
        assert_eq!(ValueType::Qword.hex_tag(), "hex(b)");
    }
}
