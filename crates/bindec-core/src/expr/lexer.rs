//! Tokenizer for the expression language.

use crate::error::{Error, Result};

/// A token with the character position where it starts
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Token {
    pub(crate) kind: TokenKind,
    pub(crate) pos: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TokenKind {
    Int(i128),
    Str(String),
    Ident(String),
    True,
    False,
    And,
    Or,
    Not,

    Plus,
    Minus,
    Star,
    Slash,
    SlashSlash,
    Percent,
    Amp,
    Pipe,
    Caret,
    Tilde,
    Shl,
    Shr,

    EqEq,
    NotEq,
    Less,
    LessEq,
    Greater,
    GreaterEq,

    LParen,
    RParen,
    LBracket,
    RBracket,

    Eof,
}

pub(crate) fn tokenize(text: &str) -> Result<Vec<Token>> {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }

        let start = i;
        let kind = if c.is_ascii_digit() {
            let (value, next) = lex_number(text, &chars, i)?;
            i = next;
            TokenKind::Int(value)
        } else if c == '_' || c.is_alphabetic() {
            while i < chars.len() && (chars[i] == '_' || chars[i].is_alphanumeric()) {
                i += 1;
            }
            let word: String = chars[start..i].iter().collect();
            match word.as_str() {
                "and" => TokenKind::And,
                "or" => TokenKind::Or,
                "not" => TokenKind::Not,
                "True" | "true" => TokenKind::True,
                "False" | "false" => TokenKind::False,
                _ => TokenKind::Ident(word),
            }
        } else if c == '"' || c == '\'' {
            let (value, next) = lex_string(text, &chars, i)?;
            i = next;
            TokenKind::Str(value)
        } else {
            let next = chars.get(i + 1).copied();
            let (kind, width) = match (c, next) {
                ('/', Some('/')) => (TokenKind::SlashSlash, 2),
                ('=', Some('=')) => (TokenKind::EqEq, 2),
                ('!', Some('=')) => (TokenKind::NotEq, 2),
                ('<', Some('=')) => (TokenKind::LessEq, 2),
                ('>', Some('=')) => (TokenKind::GreaterEq, 2),
                ('<', Some('<')) => (TokenKind::Shl, 2),
                ('>', Some('>')) => (TokenKind::Shr, 2),
                ('+', _) => (TokenKind::Plus, 1),
                ('-', _) => (TokenKind::Minus, 1),
                ('*', _) => (TokenKind::Star, 1),
                ('/', _) => (TokenKind::Slash, 1),
                ('%', _) => (TokenKind::Percent, 1),
                ('&', _) => (TokenKind::Amp, 1),
                ('|', _) => (TokenKind::Pipe, 1),
                ('^', _) => (TokenKind::Caret, 1),
                ('~', _) => (TokenKind::Tilde, 1),
                ('<', _) => (TokenKind::Less, 1),
                ('>', _) => (TokenKind::Greater, 1),
                ('(', _) => (TokenKind::LParen, 1),
                (')', _) => (TokenKind::RParen, 1),
                ('[', _) => (TokenKind::LBracket, 1),
                (']', _) => (TokenKind::RBracket, 1),
                _ => {
                    return Err(Error::expression(
                        text,
                        i,
                        format!("unexpected character '{}'", c),
                    ))
                }
            };
            i += width;
            kind
        };
        tokens.push(Token { kind, pos: start });
    }

    tokens.push(Token {
        kind: TokenKind::Eof,
        pos: chars.len(),
    });
    Ok(tokens)
}

fn lex_number(text: &str, chars: &[char], start: usize) -> Result<(i128, usize)> {
    let mut i = start;
    let radix = match (chars[i], chars.get(i + 1).map(|c| c.to_ascii_lowercase())) {
        ('0', Some('x')) => 16,
        ('0', Some('o')) => 8,
        ('0', Some('b')) => 2,
        _ => 10,
    };
    if radix != 10 {
        i += 2;
    }

    let mut digits = String::new();
    while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
        if chars[i] != '_' {
            digits.push(chars[i]);
        }
        i += 1;
    }

    if digits.is_empty() {
        return Err(Error::expression(text, start, "missing digits in number literal"));
    }
    if radix == 10 && digits.len() > 1 && digits.starts_with('0') {
        return Err(Error::expression(
            text,
            start,
            "leading zeros in decimal literals are not permitted",
        ));
    }

    let value = i128::from_str_radix(&digits, radix).map_err(|e| {
        Error::expression(text, start, format!("invalid number literal: {}", e))
    })?;
    Ok((value, i))
}

fn lex_string(text: &str, chars: &[char], start: usize) -> Result<(String, usize)> {
    let quote = chars[start];
    let mut value = String::new();
    let mut i = start + 1;

    while i < chars.len() {
        match chars[i] {
            c if c == quote => return Ok((value, i + 1)),
            '\\' => {
                let escaped = chars
                    .get(i + 1)
                    .ok_or_else(|| Error::expression(text, i, "unterminated escape"))?;
                value.push(match escaped {
                    'n' => '\n',
                    't' => '\t',
                    'r' => '\r',
                    '0' => '\0',
                    other => *other,
                });
                i += 2;
            }
            c => {
                value.push(c);
                i += 1;
            }
        }
    }

    Err(Error::expression(text, start, "unterminated string literal"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(text: &str) -> Vec<TokenKind> {
        tokenize(text).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_numbers() {
        assert_eq!(
            kinds("0x9a 0b101 0o17 1_000"),
            vec![
                TokenKind::Int(0x9a),
                TokenKind::Int(5),
                TokenKind::Int(15),
                TokenKind::Int(1000),
                TokenKind::Eof
            ]
        );
        assert!(tokenize("0x").is_err());
        assert!(tokenize("007").is_err());
        assert!(tokenize("12ab").is_err());
    }

    #[test]
    fn test_keywords_and_operators() {
        assert_eq!(
            kinds("not RAW[0]>=1 // 2"),
            vec![
                TokenKind::Not,
                TokenKind::Ident("RAW".into()),
                TokenKind::LBracket,
                TokenKind::Int(0),
                TokenKind::RBracket,
                TokenKind::GreaterEq,
                TokenKind::Int(1),
                TokenKind::SlashSlash,
                TokenKind::Int(2),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_strings() {
        assert_eq!(
            kinds(r#"'a\'b' "c""#),
            vec![
                TokenKind::Str("a'b".into()),
                TokenKind::Str("c".into()),
                TokenKind::Eof
            ]
        );
        assert!(tokenize("'open").is_err());
    }

    #[test]
    fn test_rejects_foreign_syntax() {
        assert!(tokenize("a = 1").is_err());
        assert!(tokenize("x.y").is_err());
        assert!(tokenize("f(x);").is_err());
    }
}
