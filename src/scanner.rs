pub type LineNumber = u16;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum TokenType {
  // Single character tokens
  LeftParen,
  RightParen,
  LeftBrace,
  RightBrace,
  Comma,
  Dot,
  Minus,
  Plus,
  Semicolon,
  Slash,
  Star,
  Percent,

  // One or two character tokens
  Bang,
  BangEqual,
  Equal,
  EqualEqual,
  Greater,
  GreaterEqual,
  Less,
  LessEqual,

  // Literals
  Identifier,
  String,
  Number,

  // Keywords
  And,
  Class,
  Else,
  False,
  For,
  Fun,
  If,
  Nil,
  Or,
  Print,
  Return,
  Super,
  This,
  True,
  Var,
  While,

  Error,
  EndOfFile,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ScanError {
  UnterminatedString,
  UnterminatedBlockComment,
  UnknownCharacter,
}

impl ScanError {
  pub fn message(self, lexeme: &str) -> String {
    match self {
      Self::UnterminatedString => "Unterminated string.".to_string(),
      Self::UnterminatedBlockComment => "Unterminated block comment.".to_string(),
      Self::UnknownCharacter => format!("Unrecognized character '{}'.", lexeme),
    }
  }
}

#[derive(Debug, Clone, Copy)]
pub struct Token<'source> {
  pub token_type: TokenType,
  pub lexeme: &'source str,
  pub line: LineNumber,
  pub error_value: Option<ScanError>,
}

pub struct Scanner<'source> {
  source: &'source str,
  start: usize,
  current: usize,
  line: LineNumber,
}

impl<'source> Scanner<'source> {
  pub fn new(source: &'source str) -> Self {
    Self {
      source,
      start: 0,
      current: 0,
      line: 1,
    }
  }

  pub fn scan_token(&mut self) -> Token<'source> {
    if let Some(error) = self.skip_whitespace() {
      return self.error_token(error);
    }
    self.start = self.current;

    if self.at_end() {
      return self.make_token(TokenType::EndOfFile);
    }

    let character = self.advance();

    if is_alpha(character) {
      return self.identifier();
    }
    if is_digit(character) {
      return self.number();
    }

    match character {
      b'(' => self.make_token(TokenType::LeftParen),
      b')' => self.make_token(TokenType::RightParen),
      b'{' => self.make_token(TokenType::LeftBrace),
      b'}' => self.make_token(TokenType::RightBrace),
      b';' => self.make_token(TokenType::Semicolon),
      b',' => self.make_token(TokenType::Comma),
      b'.' => self.make_token(TokenType::Dot),
      b'-' => self.make_token(TokenType::Minus),
      b'+' => self.make_token(TokenType::Plus),
      b'/' => self.make_token(TokenType::Slash),
      b'*' => self.make_token(TokenType::Star),
      b'%' => self.make_token(TokenType::Percent),
      b'!' => self.matched_token(b'=', TokenType::BangEqual, TokenType::Bang),
      b'=' => self.matched_token(b'=', TokenType::EqualEqual, TokenType::Equal),
      b'<' => self.matched_token(b'=', TokenType::LessEqual, TokenType::Less),
      b'>' => self.matched_token(b'=', TokenType::GreaterEqual, TokenType::Greater),
      b'"' => self.string(),
      _ => {
        // Take any UTF-8 continuation bytes with the unknown character, so
        // the lexeme stays on a character boundary
        while matches!(self.peek(), Some(0x80..=0xBF)) {
          self.current += 1;
        }
        self.error_token(ScanError::UnknownCharacter)
      }
    }
  }

  fn at_end(&self) -> bool {
    self.current >= self.source.len()
  }

  fn advance(&mut self) -> u8 {
    self.current += 1;
    self.source.as_bytes()[self.current - 1]
  }

  fn peek(&self) -> Option<u8> {
    self.source.as_bytes().get(self.current).copied()
  }

  fn peek_next(&self) -> Option<u8> {
    self.source.as_bytes().get(self.current + 1).copied()
  }

  fn matches(&mut self, expected: u8) -> bool {
    if self.peek() == Some(expected) {
      self.current += 1;
      true
    } else {
      false
    }
  }

  fn make_token(&self, token_type: TokenType) -> Token<'source> {
    Token {
      token_type,
      lexeme: &self.source[self.start..self.current],
      line: self.line,
      error_value: None,
    }
  }

  fn matched_token(
    &mut self,
    expected: u8,
    matched: TokenType,
    unmatched: TokenType,
  ) -> Token<'source> {
    if self.matches(expected) {
      self.make_token(matched)
    } else {
      self.make_token(unmatched)
    }
  }

  fn error_token(&self, error: ScanError) -> Token<'source> {
    Token {
      token_type: TokenType::Error,
      lexeme: &self.source[self.start..self.current],
      line: self.line,
      error_value: Some(error),
    }
  }

  fn skip_whitespace(&mut self) -> Option<ScanError> {
    loop {
      match self.peek() {
        Some(b' ' | b'\r' | b'\t') => self.current += 1,
        Some(b'\n') => {
          self.line += 1;
          self.current += 1;
        }
        Some(b'/') => match self.peek_next() {
          Some(b'/') => {
            while !self.at_end() && self.peek() != Some(b'\n') {
              self.current += 1;
            }
          }
          Some(b'*') => {
            self.start = self.current;
            self.current += 2;
            if !self.skip_block_comment() {
              return Some(ScanError::UnterminatedBlockComment);
            }
          }
          _ => return None,
        },
        _ => return None,
      }
    }
  }

  // Block comments nest
  fn skip_block_comment(&mut self) -> bool {
    let mut depth = 1;

    while depth > 0 {
      if self.at_end() {
        return false;
      }

      match (self.peek(), self.peek_next()) {
        (Some(b'*'), Some(b'/')) => {
          depth -= 1;
          self.current += 2;
        }
        (Some(b'/'), Some(b'*')) => {
          depth += 1;
          self.current += 2;
        }
        (Some(b'\n'), _) => {
          self.line += 1;
          self.current += 1;
        }
        _ => self.current += 1,
      }
    }

    true
  }

  fn string(&mut self) -> Token<'source> {
    while !self.at_end() && self.peek() != Some(b'"') {
      if self.peek() == Some(b'\n') {
        self.line += 1;
      }
      self.current += 1;
    }

    if self.at_end() {
      return self.error_token(ScanError::UnterminatedString);
    }

    self.current += 1;
    self.make_token(TokenType::String)
  }

  fn number(&mut self) -> Token<'source> {
    while matches!(self.peek(), Some(c) if is_digit(c)) {
      self.current += 1;
    }

    if self.peek() == Some(b'.') && matches!(self.peek_next(), Some(c) if is_digit(c)) {
      self.current += 1;
      while matches!(self.peek(), Some(c) if is_digit(c)) {
        self.current += 1;
      }
    }

    self.make_token(TokenType::Number)
  }

  fn identifier(&mut self) -> Token<'source> {
    while matches!(self.peek(), Some(c) if is_alpha(c) || is_digit(c)) {
      self.current += 1;
    }
    self.make_token(self.identifier_type())
  }

  fn identifier_type(&self) -> TokenType {
    match self.source.as_bytes()[self.start] {
      b'a' => self.check_keyword("and", TokenType::And),
      b'c' => self.check_keyword("class", TokenType::Class),
      b'e' => self.check_keyword("else", TokenType::Else),
      b'f' => match self.source.as_bytes().get(self.start + 1) {
        Some(b'a') => self.check_keyword("false", TokenType::False),
        Some(b'o') => self.check_keyword("for", TokenType::For),
        Some(b'u') => self.check_keyword("fun", TokenType::Fun),
        _ => TokenType::Identifier,
      },
      b'i' => self.check_keyword("if", TokenType::If),
      b'n' => self.check_keyword("nil", TokenType::Nil),
      b'o' => self.check_keyword("or", TokenType::Or),
      b'p' => self.check_keyword("print", TokenType::Print),
      b'r' => self.check_keyword("return", TokenType::Return),
      b's' => self.check_keyword("super", TokenType::Super),
      b't' => match self.source.as_bytes().get(self.start + 1) {
        Some(b'h') => self.check_keyword("this", TokenType::This),
        Some(b'r') => self.check_keyword("true", TokenType::True),
        _ => TokenType::Identifier,
      },
      b'v' => self.check_keyword("var", TokenType::Var),
      b'w' => self.check_keyword("while", TokenType::While),
      _ => TokenType::Identifier,
    }
  }

  fn check_keyword(&self, keyword: &'static str, token_type: TokenType) -> TokenType {
    if &self.source[self.start..self.current] == keyword {
      token_type
    } else {
      TokenType::Identifier
    }
  }
}

fn is_alpha(c: u8) -> bool {
  c.is_ascii_alphabetic() || c == b'_'
}

fn is_digit(c: u8) -> bool {
  c.is_ascii_digit()
}
