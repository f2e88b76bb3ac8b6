/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 *
 * Licensed under the Apache License, Version 2.0 (the "License").
 * You may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

//! Lexer: deterministic longest-match tokenization over UTF-8 input, per §4.1.

use log::debug;
use std::fmt;

use crate::error::LexError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Keyword,
    Identifier,
    String,
    Number,
    Binary,
    Bool,
    Null,
    Operator,
    Punctuation,
    Eof,
}

/// `{kind, lexeme, offset}` per §3 — `offset` is the byte offset of the
/// first character, which lets error messages point a caret at the
/// exact spot in the source statement.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub offset: usize,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.lexeme)
    }
}

const KEYWORDS: &[&str] = &[
    "select", "scan", "insert", "into", "update", "delete", "from", "where", "set", "add",
    "remove", "values", "create", "table", "alter", "drop", "if", "not", "exists", "using",
    "order", "by", "asc", "desc", "limit", "threads", "filter", "returns", "consistent", "read",
    "throughput", "index", "hash", "range", "key", "local", "global", "string", "number",
    "binary", "bool", "null", "list", "map", "and", "or", "between", "in", "contains",
    "begins_with", "attribute_exists", "attribute_not_exists", "is", "pay_per_request", "explain",
    "analyze", "dump", "schema", "load", "help", "count", "all_new", "all_old", "updated_new",
    "updated_old", "none", "keys", "projection", "all", "keys_only", "include",
];

fn is_keyword(word: &str) -> bool {
    let lower = word.to_ascii_lowercase();
    KEYWORDS.contains(&lower.as_str())
}

/// Hand-rolled recursive-descent-friendly lexer. Kept deliberately
/// simple: one `next_token` call returns exactly one [`Token`], and the
/// caller (the parser) drives lookahead by buffering.
pub struct Lexer<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Lexer {
            src,
            bytes: src.as_bytes(),
            pos: 0,
        }
    }

    /// Tokenizes the entire input, always appending a trailing `Eof`
    /// token so the parser never needs a separate end-of-stream check.
    pub fn tokenize(src: &'a str) -> Result<Vec<Token>, LexError> {
        let mut lexer = Lexer::new(src);
        let mut tokens = Vec::new();
        loop {
            let tok = lexer.next_token()?;
            let is_eof = tok.kind == TokenKind::Eof;
            tokens.push(tok);
            if is_eof {
                break;
            }
        }
        debug!("tokenized {} token(s) from {} byte(s)", tokens.len(), src.len());
        Ok(tokens)
    }

    fn peek_byte(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn peek_at(&self, ahead: usize) -> Option<u8> {
        self.bytes.get(self.pos + ahead).copied()
    }

    fn advance(&mut self) -> Option<u8> {
        let b = self.peek_byte()?;
        self.pos += 1;
        Some(b)
    }

    fn skip_trivia(&mut self) -> Result<(), LexError> {
        loop {
            match self.peek_byte() {
                Some(b) if b.is_ascii_whitespace() => {
                    self.pos += 1;
                }
                Some(b'-') if self.peek_at(1) == Some(b'-') => {
                    while let Some(b) = self.peek_byte() {
                        if b == b'\n' {
                            break;
                        }
                        self.pos += 1;
                    }
                }
                Some(b'/') if self.peek_at(1) == Some(b'*') => {
                    let start = self.pos;
                    self.pos += 2;
                    loop {
                        match (self.peek_byte(), self.peek_at(1)) {
                            (Some(b'*'), Some(b'/')) => {
                                self.pos += 2;
                                break;
                            }
                            (Some(_), _) => self.pos += 1,
                            (None, _) => {
                                return Err(LexError {
                                    offset: start,
                                    message: "unterminated block comment".to_string(),
                                })
                            }
                        }
                    }
                }
                _ => break,
            }
        }
        Ok(())
    }

    pub fn next_token(&mut self) -> Result<Token, LexError> {
        self.skip_trivia()?;
        let offset = self.pos;
        let Some(b) = self.peek_byte() else {
            return Ok(Token {
                kind: TokenKind::Eof,
                lexeme: String::new(),
                offset,
            });
        };

        match b {
            b'\'' | b'"' => self.lex_string(b as char),
            b'0'..=b'9' => Ok(self.lex_number(offset)),
            b'b' if self.peek_at(1) == Some(b'"') => self.lex_binary(offset),
            b'B' if self.peek_at(1) == Some(b'"') => self.lex_binary(offset),
            _ if b.is_ascii_alphabetic() || b == b'_' => Ok(self.lex_word(offset)),
            // '+'/'-' are always standalone operator tokens; a negative
            // number literal is assembled by the parser from a unary
            // '-' immediately followed by a Number token, which avoids
            // the lexer having to guess whether "a-1" means subtraction
            // or the literal -1.
            b'<' | b'>' | b'=' | b'!' | b'+' | b'-' => Ok(self.lex_operator(offset)),
            b'(' | b')' | b',' | b';' | b'.' | b'[' | b']' | b'*' => {
                self.pos += 1;
                Ok(Token {
                    kind: TokenKind::Punctuation,
                    lexeme: (b as char).to_string(),
                    offset,
                })
            }
            other => Err(LexError {
                offset,
                message: format!("invalid byte 0x{:02x} ('{}')", other, other as char),
            }),
        }
    }

    fn lex_word(&mut self, offset: usize) -> Token {
        let start = self.pos;
        while let Some(b) = self.peek_byte() {
            if b.is_ascii_alphanumeric() || b == b'_' {
                self.pos += 1;
            } else {
                break;
            }
        }
        let lexeme = self.src[start..self.pos].to_string();
        let kind = if lexeme.eq_ignore_ascii_case("true") || lexeme.eq_ignore_ascii_case("false") {
            TokenKind::Bool
        } else if is_keyword(&lexeme) {
            TokenKind::Keyword
        } else {
            TokenKind::Identifier
        };
        Token {
            kind,
            lexeme,
            offset,
        }
    }

    fn lex_operator(&mut self, offset: usize) -> Token {
        let start = self.pos;
        let first = self.advance().unwrap();
        if matches!(first, b'<' | b'>' | b'!') && self.peek_byte() == Some(b'=') {
            self.pos += 1;
        } else if first == b'<' && self.peek_byte() == Some(b'>') {
            self.pos += 1;
        }
        Token {
            kind: TokenKind::Operator,
            lexeme: self.src[start..self.pos].to_string(),
            offset,
        }
    }

    /// Preserves the numeric literal verbatim (no parsing to f64/i64) so
    /// arbitrary-precision DynamoDB Number values survive the round trip.
    fn lex_number(&mut self, offset: usize) -> Token {
        let start = self.pos;
        while self.peek_byte().is_some_and(|b| b.is_ascii_digit()) {
            self.pos += 1;
        }
        if self.peek_byte() == Some(b'.') && self.peek_at(1).is_some_and(|b| b.is_ascii_digit()) {
            self.pos += 1;
            while self.peek_byte().is_some_and(|b| b.is_ascii_digit()) {
                self.pos += 1;
            }
        }
        if matches!(self.peek_byte(), Some(b'e') | Some(b'E')) {
            let mark = self.pos;
            self.pos += 1;
            if matches!(self.peek_byte(), Some(b'+') | Some(b'-')) {
                self.pos += 1;
            }
            if self.peek_byte().is_some_and(|b| b.is_ascii_digit()) {
                while self.peek_byte().is_some_and(|b| b.is_ascii_digit()) {
                    self.pos += 1;
                }
            } else {
                self.pos = mark;
            }
        }
        Token {
            kind: TokenKind::Number,
            lexeme: self.src[start..self.pos].to_string(),
            offset,
        }
    }

    /// Single- or double-quoted string, doubled-quote escape, embedded
    /// newlines permitted (per §4.1). `lexeme` holds the *decoded*
    /// value, not the raw source text including quotes.
    fn lex_string(&mut self, quote: char) -> Result<Token, LexError> {
        let offset = self.pos;
        let qbyte = quote as u8;
        self.pos += 1; // opening quote
        let mut value = String::new();
        loop {
            match self.peek_byte() {
                None => {
                    return Err(LexError {
                        offset,
                        message: "unterminated string literal".to_string(),
                    })
                }
                Some(b) if b == qbyte => {
                    if self.peek_at(1) == Some(qbyte) {
                        // doubled-quote escape: '' -> '
                        value.push(quote);
                        self.pos += 2;
                    } else {
                        self.pos += 1;
                        break;
                    }
                }
                Some(_) => {
                    let rest = &self.src[self.pos..];
                    let ch = rest.chars().next().unwrap();
                    value.push(ch);
                    self.pos += ch.len_utf8();
                }
            }
        }
        Ok(Token {
            kind: TokenKind::String,
            lexeme: value,
            offset,
        })
    }

    /// `b"base64…"` — the lexeme carries the still-encoded base64 text;
    /// decoding to bytes happens in the parser where the literal is
    /// turned into a [`crate::value::Value::B`].
    fn lex_binary(&mut self, offset: usize) -> Result<Token, LexError> {
        self.pos += 1; // 'b'/'B'
        self.pos += 1; // opening quote
        let start = self.pos;
        loop {
            match self.peek_byte() {
                None => {
                    return Err(LexError {
                        offset,
                        message: "unterminated binary literal".to_string(),
                    })
                }
                Some(b'"') => break,
                Some(_) => self.pos += 1,
            }
        }
        let lexeme = self.src[start..self.pos].to_string();
        self.pos += 1; // closing quote
        Ok(Token {
            kind: TokenKind::Binary,
            lexeme,
            offset,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        Lexer::tokenize(src).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn tokenizes_simple_select() {
        let tokens = Lexer::tokenize("SELECT * FROM t WHERE id = 'a'").unwrap();
        let lexemes: Vec<&str> = tokens.iter().map(|t| t.lexeme.as_str()).collect();
        assert_eq!(
            lexemes,
            vec!["SELECT", "*", "FROM", "t", "WHERE", "id", "=", "a", ""]
        );
        assert_eq!(tokens.last().unwrap().kind, TokenKind::Eof);
    }

    #[test]
    fn keywords_are_case_insensitive_identifiers_are_not() {
        let tokens = Lexer::tokenize("select SeLeCt myIdent").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Keyword);
        assert_eq!(tokens[1].kind, TokenKind::Keyword);
        assert_eq!(tokens[2].kind, TokenKind::Identifier);
        assert_eq!(tokens[2].lexeme, "myIdent");
    }

    #[test]
    fn numbers_preserve_arbitrary_precision_text() {
        let tokens = Lexer::tokenize("123.4500000000000000001").unwrap();
        assert_eq!(tokens[0].lexeme, "123.4500000000000000001");
    }

    #[test]
    fn doubled_quote_escape_in_string() {
        let tokens = Lexer::tokenize("'it''s'").unwrap();
        assert_eq!(tokens[0].lexeme, "it's");
    }

    #[test]
    fn binary_literal_keeps_base64_text_undecoded() {
        let tokens = Lexer::tokenize("b\"aGVsbG8=\"").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Binary);
        assert_eq!(tokens[0].lexeme, "aGVsbG8=");
    }

    #[test]
    fn line_and_block_comments_are_skipped() {
        assert_eq!(
            kinds("-- a comment\nSELECT /* mid */ * FROM t"),
            vec![
                TokenKind::Keyword,
                TokenKind::Punctuation,
                TokenKind::Keyword,
                TokenKind::Identifier,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn unterminated_string_is_an_error() {
        let err = Lexer::tokenize("'abc").unwrap_err();
        assert_eq!(err.offset, 0);
    }

    #[test]
    fn unterminated_block_comment_is_an_error() {
        let err = Lexer::tokenize("/* never closes").unwrap_err();
        assert_eq!(err.offset, 0);
    }

    #[test]
    fn invalid_byte_is_an_error() {
        let err = Lexer::tokenize("SELECT # FROM t").unwrap_err();
        assert_eq!(err.offset, 7);
    }

    #[test]
    fn plus_and_minus_are_standalone_operators() {
        let tokens = Lexer::tokenize("views + 1").unwrap();
        assert_eq!(tokens[1].kind, TokenKind::Operator);
        assert_eq!(tokens[1].lexeme, "+");
        assert_eq!(tokens[2].kind, TokenKind::Number);
        assert_eq!(tokens[2].lexeme, "1");
    }

    #[test]
    fn offsets_enable_caret_pointers() {
        let tokens = Lexer::tokenize("SELECT * FROM t").unwrap();
        let from_tok = tokens.iter().find(|t| t.lexeme == "FROM").unwrap();
        assert_eq!(from_tok.offset, 9);
    }

    #[test]
    fn reassembling_lexemes_reproduces_source_modulo_comments() {
        let src = "SELECT * FROM t WHERE id = 'a' AND ts > 10";
        let tokens = Lexer::tokenize(src).unwrap();
        let mut rebuilt = String::new();
        for (i, tok) in tokens.iter().enumerate() {
            if tok.kind == TokenKind::Eof {
                break;
            }
            if i > 0 {
                rebuilt.push(' ');
            }
            if tok.kind == TokenKind::String {
                rebuilt.push('\'');
                rebuilt.push_str(&tok.lexeme);
                rebuilt.push('\'');
            } else {
                rebuilt.push_str(&tok.lexeme);
            }
        }
        assert_eq!(rebuilt, src);
    }
}
