//! Recursive descent parser producing [`Node`] trees.
//!
//! Precedence, lowest first: `or`, `and`, `not`, comparisons (chainable),
//! `|`, `^`, `&`, shifts, `+ -`, `* / // %`, unary `- ~`, indexing.

use super::lexer::{tokenize, Token, TokenKind};
use super::{BinOp, CmpOp, Node, UnaryOp};
use crate::error::{Error, Result};

pub(crate) fn parse(text: &str) -> Result<Node> {
    let tokens = tokenize(text)?;
    let mut parser = Parser {
        text,
        tokens,
        pos: 0,
    };
    let node = parser.parse_or()?;
    match parser.peek() {
        TokenKind::Eof => Ok(node),
        other => Err(parser.error(format!("unexpected trailing token {:?}", other))),
    }
}

struct Parser<'t> {
    text: &'t str,
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser<'_> {
    fn peek(&self) -> &TokenKind {
        &self.tokens[self.pos].kind
    }

    fn advance(&mut self) -> TokenKind {
        let kind = self.tokens[self.pos].kind.clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        kind
    }

    fn error(&self, details: impl Into<String>) -> Error {
        Error::expression(self.text, self.tokens[self.pos].pos, details)
    }

    fn expect(&mut self, expected: &TokenKind) -> Result<()> {
        if self.peek() == expected {
            self.advance();
            Ok(())
        } else {
            Err(self.error(format!("expected {:?}, found {:?}", expected, self.peek())))
        }
    }

    /// Left-associative binary operators; `map_op` maps the current token.
    fn parse_binary_op(
        &mut self,
        mut next_fn: impl FnMut(&mut Self) -> Result<Node>,
        map_op: impl Fn(&TokenKind) -> Option<BinOp>,
    ) -> Result<Node> {
        let mut lhs = next_fn(self)?;
        while let Some(op) = map_op(self.peek()) {
            self.advance();
            let rhs = next_fn(self)?;
            lhs = Node::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_or(&mut self) -> Result<Node> {
        let mut lhs = self.parse_and()?;
        while matches!(self.peek(), TokenKind::Or) {
            self.advance();
            let rhs = self.parse_and()?;
            lhs = Node::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Node> {
        let mut lhs = self.parse_not()?;
        while matches!(self.peek(), TokenKind::And) {
            self.advance();
            let rhs = self.parse_not()?;
            lhs = Node::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_not(&mut self) -> Result<Node> {
        if matches!(self.peek(), TokenKind::Not) {
            self.advance();
            let operand = self.parse_not()?;
            return Ok(Node::Not(Box::new(operand)));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Node> {
        let first = self.parse_bit_or()?;
        let mut rest = Vec::new();
        loop {
            let op = match self.peek() {
                TokenKind::EqEq => CmpOp::Eq,
                TokenKind::NotEq => CmpOp::Ne,
                TokenKind::Less => CmpOp::Lt,
                TokenKind::LessEq => CmpOp::Le,
                TokenKind::Greater => CmpOp::Gt,
                TokenKind::GreaterEq => CmpOp::Ge,
                _ => break,
            };
            self.advance();
            rest.push((op, self.parse_bit_or()?));
        }
        if rest.is_empty() {
            Ok(first)
        } else {
            Ok(Node::Compare {
                first: Box::new(first),
                rest,
            })
        }
    }

    fn parse_bit_or(&mut self) -> Result<Node> {
        self.parse_binary_op(Self::parse_bit_xor, |tok| match tok {
            TokenKind::Pipe => Some(BinOp::BitOr),
            _ => None,
        })
    }

    fn parse_bit_xor(&mut self) -> Result<Node> {
        self.parse_binary_op(Self::parse_bit_and, |tok| match tok {
            TokenKind::Caret => Some(BinOp::BitXor),
            _ => None,
        })
    }

    fn parse_bit_and(&mut self) -> Result<Node> {
        self.parse_binary_op(Self::parse_shift, |tok| match tok {
            TokenKind::Amp => Some(BinOp::BitAnd),
            _ => None,
        })
    }

    fn parse_shift(&mut self) -> Result<Node> {
        self.parse_binary_op(Self::parse_additive, |tok| match tok {
            TokenKind::Shl => Some(BinOp::Shl),
            TokenKind::Shr => Some(BinOp::Shr),
            _ => None,
        })
    }

    fn parse_additive(&mut self) -> Result<Node> {
        self.parse_binary_op(Self::parse_multiplicative, |tok| match tok {
            TokenKind::Plus => Some(BinOp::Add),
            TokenKind::Minus => Some(BinOp::Sub),
            _ => None,
        })
    }

    fn parse_multiplicative(&mut self) -> Result<Node> {
        self.parse_binary_op(Self::parse_unary, |tok| match tok {
            TokenKind::Star => Some(BinOp::Mul),
            TokenKind::Slash | TokenKind::SlashSlash => Some(BinOp::Div),
            TokenKind::Percent => Some(BinOp::Mod),
            _ => None,
        })
    }

    fn parse_unary(&mut self) -> Result<Node> {
        let op = match self.peek() {
            TokenKind::Minus => UnaryOp::Neg,
            TokenKind::Plus => UnaryOp::Pos,
            TokenKind::Tilde => UnaryOp::Invert,
            _ => return self.parse_postfix(),
        };
        self.advance();
        let operand = self.parse_unary()?;
        Ok(Node::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    fn parse_postfix(&mut self) -> Result<Node> {
        let mut node = self.parse_primary()?;
        while matches!(self.peek(), TokenKind::LBracket) {
            self.advance();
            let index = self.parse_or()?;
            self.expect(&TokenKind::RBracket)?;
            node = Node::Index {
                target: Box::new(node),
                index: Box::new(index),
            };
        }
        Ok(node)
    }

    fn parse_primary(&mut self) -> Result<Node> {
        match self.peek().clone() {
            TokenKind::Int(v) => {
                self.advance();
                Ok(Node::Int(v))
            }
            TokenKind::Str(s) => {
                self.advance();
                Ok(Node::Str(s))
            }
            TokenKind::True => {
                self.advance();
                Ok(Node::Bool(true))
            }
            TokenKind::False => {
                self.advance();
                Ok(Node::Bool(false))
            }
            TokenKind::Ident(name) => {
                self.advance();
                if matches!(self.peek(), TokenKind::LParen) {
                    return Err(self.error(format!("function calls are not supported: {}(...)", name)));
                }
                Ok(Node::Name(name))
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_or()?;
                self.expect(&TokenKind::RParen)?;
                Ok(inner)
            }
            other => Err(self.error(format!("expected a value, found {:?}", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precedence() {
        let node = parse("1 + 2 * 3").unwrap();
        assert_eq!(
            node,
            Node::Binary {
                op: BinOp::Add,
                lhs: Box::new(Node::Int(1)),
                rhs: Box::new(Node::Binary {
                    op: BinOp::Mul,
                    lhs: Box::new(Node::Int(2)),
                    rhs: Box::new(Node::Int(3)),
                }),
            }
        );
    }

    #[test]
    fn test_boolean_binds_looser_than_comparison() {
        let node = parse("RAW[0]==0x78 and RAW[1]==0x9a").unwrap();
        assert!(matches!(node, Node::And(_, _)));
    }

    #[test]
    fn test_chained_comparison() {
        let node = parse("1 < n <= 4").unwrap();
        match node {
            Node::Compare { rest, .. } => assert_eq!(rest.len(), 2),
            other => panic!("unexpected node {:?}", other),
        }
    }

    #[test]
    fn test_rejected_forms() {
        for text in ["", "1 +", "(1", "RAW[0", "len(RAW)", "1 2", "and"] {
            assert!(parse(text).is_err(), "accepted {:?}", text);
        }
    }
}
