//! # Metadata Tokens
//!
//! [`Token`] is the 32-bit handle the runtime uses to address one metadata
//! entity: a table tag in the high byte and a 1-based row index in the low 24
//! bits. User-string tokens reuse the layout with the reserved tag 0x70 and a
//! #US heap byte offset in place of the row.
//!
//! ## References
//!
//! - [ECMA-335 Standard](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf) - Partition III, Section 1.9

use std::fmt;

use crate::metadata::tables::TableId;

/// Table tag of user-string tokens. The #US heap is not a table, but IL `ldstr`
/// operands address it with this reserved tag in the token's high byte.
pub const USER_STRING_TAG: u8 = 0x70;

/// A metadata token identifying one metadata entity.
///
/// Tokens are 32-bit values where:
/// - The high byte (bits 24-31) indicates the table type
/// - The low 24 bits (bits 0-23) indicate the 1-based row index within that table
///
/// User-string tokens use the reserved tag [`USER_STRING_TAG`] and carry a byte
/// offset into the #US heap instead of a row number.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Token(pub u32);

impl Token {
    /// Creates a new token from a raw 32-bit value
    #[must_use]
    pub fn new(value: u32) -> Self {
        Token(value)
    }

    /// Creates a token for a 1-based row in the given table.
    ///
    /// The row must fit the 24-bit row space; callers guard this via
    /// [`crate::Error::TooManyRows`] before rows are handed out.
    #[must_use]
    pub fn from_table_row(table: TableId, row: u32) -> Self {
        Token((u32::from(table.token_tag()) << 24) | (row & 0x00FF_FFFF))
    }

    /// Creates a user-string token for a byte offset into the #US heap.
    #[must_use]
    pub fn user_string(offset: u32) -> Self {
        Token((u32::from(USER_STRING_TAG) << 24) | (offset & 0x00FF_FFFF))
    }

    /// Returns the raw token value
    #[must_use]
    pub fn value(&self) -> u32 {
        self.0
    }

    /// Extracts the table type from the token (high byte)
    #[must_use]
    pub fn table(&self) -> u8 {
        (self.0 >> 24) as u8
    }

    /// Extracts the row index from the token (low 24 bits)
    #[must_use]
    pub fn row(&self) -> u32 {
        self.0 & 0x00FF_FFFF
    }

    /// Returns true if this is a null token (value 0)
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.0 == 0
    }
}

impl From<u32> for Token {
    fn from(value: u32) -> Self {
        Token(value)
    }
}

impl From<Token> for u32 {
    fn from(token: Token) -> Self {
        token.0
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Token(0x{:08x}, table: 0x{:02x}, row: {})",
            self.0,
            self.table(),
            self.row()
        )
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_table_row() {
        let token = Token::from_table_row(TableId::MethodDef, 1);
        assert_eq!(token.value(), 0x06000001);
        assert_eq!(token.table(), 0x06);
        assert_eq!(token.row(), 1);

        let token = Token::from_table_row(TableId::TypeDef, 5);
        assert_eq!(token.value(), 0x02000005);
    }

    #[test]
    fn test_user_string_token() {
        let token = Token::user_string(0x1234);
        assert_eq!(token.table(), USER_STRING_TAG);
        assert_eq!(token.row(), 0x1234);
        assert_eq!(token.value(), 0x70001234);
    }

    #[test]
    fn test_token_is_null() {
        assert!(Token(0).is_null());
        assert!(!Token::from_table_row(TableId::Field, 1).is_null());
    }

    #[test]
    fn test_token_row_masking() {
        let token = Token::from_table_row(TableId::MethodDef, 0x00FF_FFFF);
        assert_eq!(token.row(), 0x00FF_FFFF);
        assert_eq!(token.table(), 0x06);
    }

    #[test]
    fn test_token_display() {
        let token = Token(0x06000001);
        assert_eq!(format!("{token}"), "0x06000001");
        let debug = format!("{token:?}");
        assert!(debug.contains("table: 0x06"));
        assert!(debug.contains("row: 1"));
    }
}
