//! MIB tokenizer.
//!
//! Produces just enough token structure for the assignment parser:
//! identifiers, numbers, punctuation and opaque strings. Comments run from
//! `--` to the next `--` or the end of the line.

/// A token and the line it starts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Token<'a> {
    pub kind: TokenKind<'a>,
    pub line: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TokenKind<'a> {
    /// Identifier or keyword (`sysName`, `OBJECT-TYPE`, `BEGIN`).
    Ident(&'a str),
    /// Unsigned or negative number, unparsed.
    Number(&'a str),
    /// Quoted text or a `'..'B` / `'..'H` literal; contents are not needed.
    Str,
    /// `::=`
    Assign,
    LBrace,
    RBrace,
    LParen,
    RParen,
    Comma,
    Semicolon,
    /// Any other punctuation (`|`, `..`, `<`, `[`).
    Other(char),
}

impl std::fmt::Display for TokenKind<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenKind::Ident(s) | TokenKind::Number(s) => f.write_str(s),
            TokenKind::Str => f.write_str("string"),
            TokenKind::Assign => f.write_str("::="),
            TokenKind::LBrace => f.write_str("{"),
            TokenKind::RBrace => f.write_str("}"),
            TokenKind::LParen => f.write_str("("),
            TokenKind::RParen => f.write_str(")"),
            TokenKind::Comma => f.write_str(","),
            TokenKind::Semicolon => f.write_str(";"),
            TokenKind::Other(c) => write!(f, "{}", c),
        }
    }
}

/// Tokenize a whole document.
pub(crate) fn tokenize(source: &str) -> Vec<Token<'_>> {
    Lexer::new(source).collect()
}

struct Lexer<'a> {
    source: &'a str,
    bytes: &'a [u8],
    pos: usize,
    line: usize,
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            bytes: source.as_bytes(),
            pos: 0,
            line: 1,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        if b == b'\n' {
            self.line += 1;
        }
        Some(b)
    }

    /// Skip whitespace and comments.
    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(b) if b.is_ascii_whitespace() => {
                    self.bump();
                }
                Some(b'-') if self.peek_at(1) == Some(b'-') => {
                    self.pos += 2;
                    loop {
                        match self.peek() {
                            None | Some(b'\n') => break,
                            Some(b'-') if self.peek_at(1) == Some(b'-') => {
                                self.pos += 2;
                                break;
                            }
                            Some(_) => self.pos += 1,
                        }
                    }
                }
                _ => return,
            }
        }
    }

    fn take_while(&mut self, start: usize, pred: impl Fn(u8) -> bool) -> &'a str {
        while let Some(b) = self.peek() {
            // A double hyphen starts a comment even inside an identifier
            if b == b'-' && self.peek_at(1) == Some(b'-') {
                break;
            }
            if !pred(b) {
                break;
            }
            self.pos += 1;
        }
        &self.source[start..self.pos]
    }

    fn skip_quoted(&mut self, quote: u8) {
        self.bump();
        while let Some(b) = self.bump() {
            if b == quote {
                break;
            }
        }
        // '0101'B and 'FF'H suffixes
        if quote == b'\'' && matches!(self.peek(), Some(b'B' | b'b' | b'H' | b'h')) {
            self.bump();
        }
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Token<'a>> {
        self.skip_trivia();
        let line = self.line;
        let start = self.pos;
        let b = self.peek()?;

        let kind = match b {
            b'"' | b'\'' => {
                self.skip_quoted(b);
                TokenKind::Str
            }
            b':' if self.peek_at(1) == Some(b':') && self.peek_at(2) == Some(b'=') => {
                self.pos += 3;
                TokenKind::Assign
            }
            b'{' | b'}' | b'(' | b')' | b',' | b';' => {
                self.pos += 1;
                match b {
                    b'{' => TokenKind::LBrace,
                    b'}' => TokenKind::RBrace,
                    b'(' => TokenKind::LParen,
                    b')' => TokenKind::RParen,
                    b',' => TokenKind::Comma,
                    _ => TokenKind::Semicolon,
                }
            }
            b'0'..=b'9' => TokenKind::Number(self.take_while(start, |c| c.is_ascii_digit())),
            b'-' if self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) => {
                self.pos += 1;
                TokenKind::Number(self.take_while(start, |c| c.is_ascii_digit()))
            }
            c if c.is_ascii_alphabetic() => TokenKind::Ident(
                self.take_while(start, |c| c.is_ascii_alphanumeric() || c == b'-' || c == b'_'),
            ),
            _ => {
                // Step over a whole UTF-8 character
                let ch = self.source[start..].chars().next().unwrap_or('?');
                for _ in 0..ch.len_utf8() {
                    self.bump();
                }
                TokenKind::Other(ch)
            }
        };

        Some(Token { kind, line })
    }
}
