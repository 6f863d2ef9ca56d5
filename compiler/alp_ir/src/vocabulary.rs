//! Display names for token types.

use crate::TokenType;

/// Literal and symbolic names of a grammar's token types.
///
/// A literal name is the quoted spelling of a fixed token (`'+'`); a
/// symbolic name is the lexer rule name (`PLUS`, `ID`). Either may be
/// missing. Index 0 ([`TokenType::INVALID`]) is never named.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Vocabulary {
    literal_names: Vec<Option<String>>,
    symbolic_names: Vec<Option<String>>,
}

impl Vocabulary {
    /// Build from parallel name tables indexed by token type.
    pub fn new(literal_names: Vec<Option<String>>, symbolic_names: Vec<Option<String>>) -> Self {
        Vocabulary {
            literal_names,
            symbolic_names,
        }
    }

    /// Allocate the next token type with the given names.
    pub fn define(&mut self, literal: Option<&str>, symbolic: Option<&str>) -> TokenType {
        let next = self.max_token_type().raw() + 1;
        let slot = next as usize;
        self.literal_names.resize(slot + 1, None);
        self.symbolic_names.resize(slot + 1, None);
        self.literal_names[slot] = literal.map(str::to_owned);
        self.symbolic_names[slot] = symbolic.map(str::to_owned);
        TokenType::new(next)
    }

    /// Highest defined token type, or [`TokenType::INVALID`] if none.
    pub fn max_token_type(&self) -> TokenType {
        let len = self.literal_names.len().max(self.symbolic_names.len());
        TokenType::new(len.saturating_sub(1) as i32)
    }

    pub fn literal_name(&self, t: TokenType) -> Option<&str> {
        Self::lookup(&self.literal_names, t)
    }

    pub fn symbolic_name(&self, t: TokenType) -> Option<&str> {
        Self::lookup(&self.symbolic_names, t)
    }

    /// Name for messages: literal, else symbolic, else the raw number.
    pub fn display_name(&self, t: TokenType) -> String {
        match t {
            TokenType::EOF => "<EOF>".to_string(),
            TokenType::EPSILON => "<EPSILON>".to_string(),
            _ => self
                .literal_name(t)
                .or_else(|| self.symbolic_name(t))
                .map_or_else(|| t.raw().to_string(), str::to_owned),
        }
    }

    /// Find a token type by symbolic name or literal spelling.
    ///
    /// `"'+'"` and `"PLUS"` both resolve the same token.
    pub fn token_type(&self, name: &str) -> Option<TokenType> {
        let by = |names: &[Option<String>]| {
            names
                .iter()
                .position(|n| n.as_deref() == Some(name))
                .map(|i| TokenType::new(i as i32))
        };
        by(&self.symbolic_names).or_else(|| by(&self.literal_names))
    }

    fn lookup(names: &[Option<String>], t: TokenType) -> Option<&str> {
        if t.raw() < TokenType::MIN_USER.raw() {
            return None;
        }
        names.get(t.raw() as usize)?.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_define_allocates_consecutive_types() {
        let mut vocab = Vocabulary::default();
        let plus = vocab.define(Some("'+'"), Some("PLUS"));
        let num = vocab.define(None, Some("NUM"));
        assert_eq!(plus, TokenType::MIN_USER);
        assert_eq!(num.raw(), 2);
        assert_eq!(vocab.max_token_type(), num);
    }

    #[test]
    fn test_display_name_preference() {
        let mut vocab = Vocabulary::default();
        let plus = vocab.define(Some("'+'"), Some("PLUS"));
        let num = vocab.define(None, Some("NUM"));
        let anon = vocab.define(None, None);

        assert_eq!(vocab.display_name(plus), "'+'");
        assert_eq!(vocab.display_name(num), "NUM");
        assert_eq!(vocab.display_name(anon), "3");
        assert_eq!(vocab.display_name(TokenType::EOF), "<EOF>");
    }

    #[test]
    fn test_token_type_lookup() {
        let mut vocab = Vocabulary::default();
        let plus = vocab.define(Some("'+'"), Some("PLUS"));
        assert_eq!(vocab.token_type("PLUS"), Some(plus));
        assert_eq!(vocab.token_type("'+'"), Some(plus));
        assert_eq!(vocab.token_type("MINUS"), None);
    }
}
