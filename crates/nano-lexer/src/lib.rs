//! nano lexer: converts source text into tokens.
use nano_syntax::error::{error_at, Result};
use nano_syntax::token::{Token, TokenKind};

/// Streaming character scanner that produces tokens with positions.
pub struct Lexer {
    src: Vec<char>,
    pos: usize,
    line: usize,
    col: usize,
}

impl Lexer {
    /// Create a new lexer over the given source string.
    pub fn new(input: &str) -> Self {
        Self {
            src: input.chars().collect(),
            pos: 0,
            line: 1,
            col: 1,
        }
    }

    fn peek(&self) -> Option<char> {
        self.src.get(self.pos).copied()
    }
    fn peek_next(&self) -> Option<char> {
        self.src.get(self.pos + 1).copied()
    }
    fn advance(&mut self) -> Option<char> {
        let ch = self.src.get(self.pos).copied();
        if let Some(c) = ch {
            self.pos += 1;
            if c == '\n' {
                self.line += 1;
                self.col = 1;
            } else {
                self.col += 1;
            }
        }
        ch
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.advance();
            } else if c == '#' {
                while let Some(c2) = self.peek() {
                    if c2 == '\n' {
                        break;
                    }
                    self.advance();
                }
            } else {
                break;
            }
        }
    }

    fn read_number(&mut self, line: usize, col: usize) -> Result<TokenKind> {
        let mut s = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                s.push(c);
                self.advance();
            } else if c == '.' && self.peek_next().map_or(false, |n| n.is_ascii_digit()) {
                if s.contains('.') {
                    break;
                }
                s.push(c);
                self.advance();
            } else {
                break;
            }
        }
        match s.parse::<f64>() {
            Ok(val) => Ok(TokenKind::Number(val)),
            Err(_) => error_at(line, col, format!("invalid number '{}'", s)),
        }
    }

    fn read_ident_or_keyword(&mut self) -> TokenKind {
        let mut s = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                s.push(c);
                self.advance();
            } else {
                break;
            }
        }
        TokenKind::keyword(&s).unwrap_or(TokenKind::Ident(s))
    }

    fn read_string(&mut self, quote: char, line: usize, col: usize) -> Result<TokenKind> {
        let mut s = String::new();
        while let Some(c) = self.advance() {
            match c {
                c if c == quote => return Ok(TokenKind::String(s)),
                '\n' => break,
                '\\' => {
                    let (esc_line, esc_col) = (self.line, self.col);
                    let esc = match self.advance() {
                        Some('n') => '\n',
                        Some('t') => '\t',
                        Some('r') => '\r',
                        Some('\\') => '\\',
                        Some('"') => '"',
                        Some('\'') => '\'',
                        Some(other) => {
                            return error_at(
                                esc_line,
                                esc_col - 1,
                                format!("unknown escape sequence '\\{}'", other),
                            )
                        }
                        None => break,
                    };
                    s.push(esc);
                }
                other => s.push(other),
            }
        }
        error_at(line, col, "unterminated string")
    }

    /// Consumes the current character, plus `second` when it follows.
    fn one_or_two(&mut self, second: char, single: TokenKind, double: TokenKind) -> TokenKind {
        self.advance();
        if self.peek() == Some(second) {
            self.advance();
            double
        } else {
            single
        }
    }

    /// Tokenize the entire input into a vector of tokens ending with Eof.
    pub fn tokenize(&mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();
        loop {
            self.skip_whitespace();
            let line = self.line;
            let col = self.col;
            let Some(c) = self.peek() else {
                tokens.push(Token {
                    kind: TokenKind::Eof,
                    line,
                    col,
                });
                break;
            };
            let kind = match c {
                '(' | ')' | '[' | ']' | ',' | ':' | '@' | '-' | '*' | '/' | '%' | '&' => {
                    self.advance();
                    match c {
                        '(' => TokenKind::LParen,
                        ')' => TokenKind::RParen,
                        '[' => TokenKind::LBracket,
                        ']' => TokenKind::RBracket,
                        ',' => TokenKind::Comma,
                        ':' => TokenKind::Colon,
                        '@' => TokenKind::At,
                        '-' => TokenKind::Minus,
                        '*' => TokenKind::Star,
                        '/' => TokenKind::Slash,
                        '%' => TokenKind::Percent,
                        _ => TokenKind::Amp,
                    }
                }
                '+' => self.one_or_two('=', TokenKind::Plus, TokenKind::PlusEqual),
                '=' => self.one_or_two('=', TokenKind::Equal, TokenKind::EqEq),
                '<' => self.one_or_two('=', TokenKind::Less, TokenKind::LessEq),
                '>' => self.one_or_two('=', TokenKind::Greater, TokenKind::GreaterEq),
                '!' => {
                    if self.peek_next() == Some('=') {
                        self.advance();
                        self.advance();
                        TokenKind::NotEq
                    } else {
                        return error_at(line, col, "unexpected '!' (use 'not' for negation)");
                    }
                }
                '"' | '\'' => {
                    self.advance();
                    self.read_string(c, line, col)?
                }
                c if c.is_ascii_digit() => self.read_number(line, col)?,
                c if c.is_ascii_alphabetic() || c == '_' => self.read_ident_or_keyword(),
                other => {
                    return error_at(line, col, format!("unexpected character '{}'", other));
                }
            };
            tokens.push(Token { kind, line, col });
        }
        Ok(tokens)
    }
}
