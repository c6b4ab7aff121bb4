use crate::chunk::{Chunk, OpCode, MAX_INDEX};
use crate::scanner::{LineNumber, Scanner, Token, TokenType};
use crate::value::Value;

use num_derive::FromPrimitive;
use num_traits::FromPrimitive;
use std::{error, fmt};

const MAX_LOCALS: usize = MAX_INDEX + 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileError {
  pub line: LineNumber,
  pub at: Option<Box<str>>,
  pub message: Box<str>,
}

impl fmt::Display for CompileError {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "[line {}] Error", self.line)?;
    if let Some(at) = &self.at {
      write!(f, " at {}", at)?;
    }
    write!(f, ": {}", self.message)
  }
}
impl error::Error for CompileError {}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, FromPrimitive)]
enum Precedence {
  None,
  Assignment, // =
  Or,         // or
  And,        // and
  Equality,   // == !=
  Comparison, // < > <= >=
  Term,       // + -
  Factor,     // * / %
  Unary,      // ! -
  Call,       // . ()
  Primary,
}

impl Precedence {
  fn next(self) -> Self {
    FromPrimitive::from_u8(self as u8 + 1).unwrap_or(Precedence::Primary)
  }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
enum Prefix {
  None,
  Grouping,
  Unary,
  Number,
  String,
  Literal,
  Variable,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
enum Infix {
  None,
  Binary,
  And,
  Or,
}

#[derive(Clone, Copy)]
struct ParseRule {
  prefix: Prefix,
  infix: Infix,
  precedence: Precedence,
}

const fn rule(prefix: Prefix, infix: Infix, precedence: Precedence) -> ParseRule {
  ParseRule {
    prefix,
    infix,
    precedence,
  }
}

fn get_rule(token_type: TokenType) -> ParseRule {
  match token_type {
    TokenType::LeftParen => rule(Prefix::Grouping, Infix::None, Precedence::None),
    TokenType::Minus => rule(Prefix::Unary, Infix::Binary, Precedence::Term),
    TokenType::Plus => rule(Prefix::None, Infix::Binary, Precedence::Term),
    TokenType::Slash | TokenType::Star | TokenType::Percent => {
      rule(Prefix::None, Infix::Binary, Precedence::Factor)
    }
    TokenType::Bang => rule(Prefix::Unary, Infix::None, Precedence::None),
    TokenType::BangEqual | TokenType::EqualEqual => {
      rule(Prefix::None, Infix::Binary, Precedence::Equality)
    }
    TokenType::Greater | TokenType::GreaterEqual | TokenType::Less | TokenType::LessEqual => {
      rule(Prefix::None, Infix::Binary, Precedence::Comparison)
    }
    TokenType::Identifier => rule(Prefix::Variable, Infix::None, Precedence::None),
    TokenType::String => rule(Prefix::String, Infix::None, Precedence::None),
    TokenType::Number => rule(Prefix::Number, Infix::None, Precedence::None),
    TokenType::And => rule(Prefix::None, Infix::And, Precedence::And),
    TokenType::Or => rule(Prefix::None, Infix::Or, Precedence::Or),
    TokenType::False | TokenType::Nil | TokenType::True => {
      rule(Prefix::Literal, Infix::None, Precedence::None)
    }
    _ => rule(Prefix::None, Infix::None, Precedence::None),
  }
}

struct Local<'source> {
  name: &'source str,
  // None until the initializer has compiled
  depth: Option<u16>,
}

const EMPTY_TOKEN: Token<'static> = Token {
  token_type: TokenType::EndOfFile,
  lexeme: "",
  line: 0,
  error_value: None,
};

struct Compiler<'source> {
  scanner: Scanner<'source>,
  chunk: Chunk,

  current: Token<'source>,
  previous: Token<'source>,
  errors: Vec<CompileError>,
  panic_mode: bool,

  locals: Vec<Local<'source>>,
  scope_depth: u16,
}

pub fn compile(source: &str) -> Result<Chunk, Vec<CompileError>> {
  let mut compiler = Compiler::new(source);

  compiler.advance();
  while !compiler.matches(TokenType::EndOfFile) {
    compiler.declaration();
  }

  compiler.end()
}

impl<'source> Compiler<'source> {
  fn new(source: &'source str) -> Self {
    Self {
      scanner: Scanner::new(source),
      chunk: Chunk::new(),
      current: EMPTY_TOKEN,
      previous: EMPTY_TOKEN,
      errors: Vec::new(),
      panic_mode: false,
      locals: Vec::new(),
      scope_depth: 0,
    }
  }

  fn end(mut self) -> Result<Chunk, Vec<CompileError>> {
    self.emit_opcode(OpCode::Return);

    if self.errors.is_empty() {
      self.chunk.finalize();
      #[cfg(feature = "debug-bytecode")]
      crate::chunk::disassemble(&self.chunk, "code");
      Ok(self.chunk)
    } else {
      Err(self.errors)
    }
  }

  fn advance(&mut self) {
    self.previous = self.current;

    loop {
      self.current = self.scanner.scan_token();
      match self.current.error_value {
        Some(error) => {
          let message = error.message(self.current.lexeme);
          self.error_at_current(&message);
        }
        None => break,
      }
    }
  }

  fn check(&self, token_type: TokenType) -> bool {
    self.current.token_type == token_type
  }

  fn matches(&mut self, token_type: TokenType) -> bool {
    if self.check(token_type) {
      self.advance();
      true
    } else {
      false
    }
  }

  fn consume(&mut self, token_type: TokenType, message: &str) {
    if self.check(token_type) {
      self.advance();
    } else {
      self.error_at_current(message);
    }
  }

  fn error(&mut self, message: &str) {
    self.error_at(self.previous, message);
  }

  fn error_at_current(&mut self, message: &str) {
    self.error_at(self.current, message);
  }

  // Report once per statement, panic mode swallows the rest until a
  // synchronization point
  fn error_at(&mut self, token: Token, message: &str) {
    if self.panic_mode {
      return;
    }
    self.panic_mode = true;

    let at = match token.token_type {
      TokenType::EndOfFile => Some(Box::from("end")),
      TokenType::Error => None,
      _ => Some(Box::from(token.lexeme)),
    };

    self.errors.push(CompileError {
      line: token.line,
      at,
      message: Box::from(message),
    });
  }

  fn synchronize(&mut self) {
    self.panic_mode = false;

    while !self.check(TokenType::EndOfFile) {
      if self.previous.token_type == TokenType::Semicolon {
        return;
      }
      match self.current.token_type {
        TokenType::Class
        | TokenType::Fun
        | TokenType::Var
        | TokenType::For
        | TokenType::If
        | TokenType::While
        | TokenType::Print
        | TokenType::Return => return,
        _ => self.advance(),
      }
    }
  }
}

// Emit bytecode
impl<'source> Compiler<'source> {
  fn emit_opcode(&mut self, code: OpCode) {
    self.chunk.write(code, self.previous.line);
  }

  fn emit_long_value(&mut self, value: u16) {
    self.chunk.write_long_value(value, self.previous.line);
  }

  fn emit_index(&mut self, code: OpCode, index: usize) {
    self.chunk.write_index_with_check(index, code, self.previous.line);
  }

  fn emit_constant(&mut self, value: Value) {
    let index = self.chunk.add_constant(value);
    self.emit_index(OpCode::Constant, index);
  }

  fn identifier_constant(&mut self, name: &str) -> usize {
    self.chunk.add_constant(Value::from(name))
  }

  fn emit_jump(&mut self, code: OpCode) -> usize {
    self.emit_opcode(code);
    self.emit_long_value(u16::MAX);
    self.chunk.len() - 2
  }

  fn patch_jump(&mut self, offset: usize) {
    let jump = self.chunk.len() - offset - 2;

    if jump > usize::from(u16::MAX) {
      self.error("Too much code to jump over.");
    }

    self.chunk.set_long_value(offset, jump as u16);
  }

  fn emit_loop(&mut self, loop_start: usize) {
    self.emit_opcode(OpCode::Loop);

    let offset = self.chunk.len() - loop_start + 2;
    if offset > usize::from(u16::MAX) {
      self.error("Loop body too large.");
    }

    self.emit_long_value(offset as u16);
  }
}

// Scopes and variables
impl<'source> Compiler<'source> {
  fn begin_scope(&mut self) {
    self.scope_depth += 1;
  }

  // Locals dropped from the scope each leave a value on the stack
  fn end_scope(&mut self) {
    self.scope_depth -= 1;

    loop {
      match self.locals.last() {
        Some(local) if local.depth.map_or(true, |depth| depth > self.scope_depth) => {
          self.emit_opcode(OpCode::Pop);
          self.locals.pop();
        }
        _ => break,
      }
    }
  }

  fn parse_variable(&mut self, message: &str) -> usize {
    self.consume(TokenType::Identifier, message);

    self.declare_variable();
    if self.scope_depth > 0 {
      return 0;
    }

    let name = self.previous.lexeme;
    self.identifier_constant(name)
  }

  fn declare_variable(&mut self) {
    if self.scope_depth == 0 {
      return;
    }

    let name = self.previous.lexeme;

    let mut already_declared = false;
    for local in self.locals.iter().rev() {
      if local.depth.is_some_and(|depth| depth < self.scope_depth) {
        break;
      }
      if local.name == name {
        already_declared = true;
        break;
      }
    }
    if already_declared {
      self.error("Already a variable with this name in this scope.");
    }

    self.add_local(name);
  }

  fn add_local(&mut self, name: &'source str) {
    if self.locals.len() >= MAX_LOCALS {
      self.error("Too many local variables.");
      return;
    }

    self.locals.push(Local { name, depth: None });
  }

  fn mark_initialized(&mut self) {
    if let Some(local) = self.locals.last_mut() {
      local.depth = Some(self.scope_depth);
    }
  }

  fn define_variable(&mut self, global: usize) {
    if self.scope_depth > 0 {
      self.mark_initialized();
      return;
    }

    self.emit_index(OpCode::DefineGlobal, global);
  }

  fn resolve_local(&mut self, name: &str) -> Option<usize> {
    let slot = self.locals.iter().rposition(|local| local.name == name)?;
    if self.locals[slot].depth.is_none() {
      self.error("Can't read local variable in its own initializer.");
    }
    Some(slot)
  }
}

// Declarations and statements
impl<'source> Compiler<'source> {
  fn declaration(&mut self) {
    if self.matches(TokenType::Var) {
      self.var_declaration();
    } else {
      self.statement();
    }

    if self.panic_mode {
      self.synchronize();
    }
  }

  fn var_declaration(&mut self) {
    let global = self.parse_variable("Expect variable name.");

    if self.matches(TokenType::Equal) {
      self.expression();
    } else {
      self.emit_opcode(OpCode::Nil);
    }
    self.consume(TokenType::Semicolon, "Expect ';' after variable declaration.");

    self.define_variable(global);
  }

  fn statement(&mut self) {
    if self.matches(TokenType::Print) {
      self.print_statement();
    } else if self.matches(TokenType::For) {
      self.for_statement();
    } else if self.matches(TokenType::If) {
      self.if_statement();
    } else if self.matches(TokenType::While) {
      self.while_statement();
    } else if self.matches(TokenType::LeftBrace) {
      self.begin_scope();
      self.block();
      self.end_scope();
    } else {
      self.expression_statement();
    }
  }

  fn print_statement(&mut self) {
    self.expression();
    self.consume(TokenType::Semicolon, "Expect ';' after value.");
    self.emit_opcode(OpCode::Print);
  }

  fn expression_statement(&mut self) {
    self.expression();
    self.consume(TokenType::Semicolon, "Expect ';' after expression.");
    self.emit_opcode(OpCode::Pop);
  }

  fn if_statement(&mut self) {
    self.consume(TokenType::LeftParen, "Expect '(' after 'if'.");
    self.expression();
    self.consume(TokenType::RightParen, "Expect ')' after condition.");

    let then_jump = self.emit_jump(OpCode::JumpIfFalse);
    self.emit_opcode(OpCode::Pop);
    self.statement();

    let else_jump = self.emit_jump(OpCode::Jump);

    self.patch_jump(then_jump);
    self.emit_opcode(OpCode::Pop);

    if self.matches(TokenType::Else) {
      self.statement();
    }
    self.patch_jump(else_jump);
  }

  fn while_statement(&mut self) {
    let loop_start = self.chunk.len();
    self.consume(TokenType::LeftParen, "Expect '(' after 'while'.");
    self.expression();
    self.consume(TokenType::RightParen, "Expect ')' after condition.");

    let exit_jump = self.emit_jump(OpCode::JumpIfFalse);
    self.emit_opcode(OpCode::Pop);
    self.statement();
    self.emit_loop(loop_start);

    self.patch_jump(exit_jump);
    self.emit_opcode(OpCode::Pop);
  }

  fn for_statement(&mut self) {
    self.begin_scope();
    self.consume(TokenType::LeftParen, "Expect '(' after 'for'.");
    if self.matches(TokenType::Semicolon) {
      // No initializer
    } else if self.matches(TokenType::Var) {
      self.var_declaration();
    } else {
      self.expression_statement();
    }

    let mut loop_start = self.chunk.len();
    let mut exit_jump = None;
    if !self.matches(TokenType::Semicolon) {
      self.expression();
      self.consume(TokenType::Semicolon, "Expect ';' after loop condition.");

      exit_jump = Some(self.emit_jump(OpCode::JumpIfFalse));
      self.emit_opcode(OpCode::Pop);
    }

    if !self.matches(TokenType::RightParen) {
      let body_jump = self.emit_jump(OpCode::Jump);
      let increment_start = self.chunk.len();
      self.expression();
      self.emit_opcode(OpCode::Pop);
      self.consume(TokenType::RightParen, "Expect ')' after for clauses.");

      self.emit_loop(loop_start);
      loop_start = increment_start;
      self.patch_jump(body_jump);
    }

    self.statement();
    self.emit_loop(loop_start);

    if let Some(exit_jump) = exit_jump {
      self.patch_jump(exit_jump);
      self.emit_opcode(OpCode::Pop);
    }

    self.end_scope();
  }

  fn block(&mut self) {
    while !self.check(TokenType::RightBrace) && !self.check(TokenType::EndOfFile) {
      self.declaration();
    }
    self.consume(TokenType::RightBrace, "Expect '}' after block.");
  }
}

// Expressions
impl<'source> Compiler<'source> {
  fn expression(&mut self) {
    self.parse_precedence(Precedence::Assignment);
  }

  fn parse_precedence(&mut self, precedence: Precedence) {
    self.advance();
    let prefix = get_rule(self.previous.token_type).prefix;
    if prefix == Prefix::None {
      self.error("Expect expression.");
      return;
    }

    let can_assign = precedence <= Precedence::Assignment;
    self.prefix_rule(prefix, can_assign);

    while precedence <= get_rule(self.current.token_type).precedence {
      self.advance();
      let infix = get_rule(self.previous.token_type).infix;
      self.infix_rule(infix);
    }

    if can_assign && self.matches(TokenType::Equal) {
      self.error("Invalid assignment target.");
    }
  }

  fn prefix_rule(&mut self, prefix: Prefix, can_assign: bool) {
    match prefix {
      Prefix::Grouping => self.grouping(),
      Prefix::Unary => self.unary(),
      Prefix::Number => self.number(),
      Prefix::String => self.string(),
      Prefix::Literal => self.literal(),
      Prefix::Variable => self.variable(can_assign),
      Prefix::None => unreachable!("checked before dispatch"),
    }
  }

  fn infix_rule(&mut self, infix: Infix) {
    match infix {
      Infix::Binary => self.binary(),
      Infix::And => self.and(),
      Infix::Or => self.or(),
      Infix::None => unreachable!("only tokens above None precedence have infix rules"),
    }
  }

  fn grouping(&mut self) {
    self.expression();
    self.consume(TokenType::RightParen, "Expect ')' after expression.");
  }

  fn number(&mut self) {
    let value: f64 = self
      .previous
      .lexeme
      .parse()
      .expect("number tokens are valid floats");
    self.emit_constant(Value::from(value));
  }

  fn string(&mut self) {
    let lexeme = self.previous.lexeme;
    let value = &lexeme[1..lexeme.len() - 1];
    self.emit_constant(Value::from(value));
  }

  fn literal(&mut self) {
    match self.previous.token_type {
      TokenType::False => self.emit_opcode(OpCode::False),
      TokenType::Nil => self.emit_opcode(OpCode::Nil),
      TokenType::True => self.emit_opcode(OpCode::True),
      _ => unreachable!("literal rule on non-literal token"),
    }
  }

  fn unary(&mut self) {
    let operator = self.previous.token_type;

    self.parse_precedence(Precedence::Unary);

    match operator {
      TokenType::Bang => self.emit_opcode(OpCode::Not),
      TokenType::Minus => self.emit_opcode(OpCode::Negate),
      _ => unreachable!("unary rule on non-unary operator"),
    }
  }

  fn binary(&mut self) {
    let operator = self.previous.token_type;
    let precedence = get_rule(operator).precedence;
    self.parse_precedence(precedence.next());

    match operator {
      TokenType::BangEqual => self.emit_opcode(OpCode::NotEqual),
      TokenType::EqualEqual => self.emit_opcode(OpCode::Equal),
      TokenType::Greater => self.emit_opcode(OpCode::Greater),
      TokenType::GreaterEqual => self.emit_opcode(OpCode::GreaterEqual),
      TokenType::Less => self.emit_opcode(OpCode::Less),
      TokenType::LessEqual => self.emit_opcode(OpCode::LessEqual),
      TokenType::Plus => self.emit_opcode(OpCode::Add),
      TokenType::Minus => self.emit_opcode(OpCode::Subtract),
      TokenType::Star => self.emit_opcode(OpCode::Multiply),
      TokenType::Slash => self.emit_opcode(OpCode::Divide),
      TokenType::Percent => self.emit_opcode(OpCode::Modulo),
      _ => unreachable!("binary rule on non-binary operator"),
    }
  }

  // Short-circuits leaving the left value when it is falsy
  fn and(&mut self) {
    let end_jump = self.emit_jump(OpCode::JumpIfFalse);

    self.emit_opcode(OpCode::Pop);
    self.parse_precedence(Precedence::And);

    self.patch_jump(end_jump);
  }

  fn or(&mut self) {
    let else_jump = self.emit_jump(OpCode::JumpIfFalse);
    let end_jump = self.emit_jump(OpCode::Jump);

    self.patch_jump(else_jump);
    self.emit_opcode(OpCode::Pop);

    self.parse_precedence(Precedence::Or);
    self.patch_jump(end_jump);
  }

  fn variable(&mut self, can_assign: bool) {
    let name = self.previous;
    self.named_variable(name, can_assign);
  }

  fn named_variable(&mut self, name: Token<'source>, can_assign: bool) {
    let (get_op, set_op, index) = match self.resolve_local(name.lexeme) {
      Some(slot) => (OpCode::GetLocal, OpCode::SetLocal, slot),
      None => {
        let index = self.identifier_constant(name.lexeme);
        (OpCode::GetGlobal, OpCode::SetGlobal, index)
      }
    };

    if can_assign && self.matches(TokenType::Equal) {
      self.expression();
      self.emit_index(set_op, index);
    } else {
      self.emit_index(get_op, index);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn compile_bytes(source: &str) -> Vec<u8> {
    let chunk = compile(source).expect("source compiles");
    (0..chunk.len())
      .map(|position| chunk.get_value(position).unwrap())
      .collect()
  }

  fn errors(source: &str) -> Vec<String> {
    match compile(source) {
      Ok(_) => panic!("expected compile errors"),
      Err(errors) => errors.iter().map(ToString::to_string).collect(),
    }
  }

  #[test]
  fn expression_lowering() {
    let bytes = compile_bytes("1 + 2 * 3;");

    assert_eq!(
      bytes,
      vec![
        OpCode::Constant as u8,
        0,
        OpCode::Constant as u8,
        1,
        OpCode::Constant as u8,
        2,
        OpCode::Multiply as u8,
        OpCode::Add as u8,
        OpCode::Pop as u8,
        OpCode::Return as u8,
      ]
    );
  }

  #[test]
  fn if_lowering() {
    let bytes = compile_bytes("if (true) print 1;");

    assert_eq!(
      bytes,
      vec![
        OpCode::True as u8,
        OpCode::JumpIfFalse as u8,
        0,
        7,
        OpCode::Pop as u8,
        OpCode::Constant as u8,
        0,
        OpCode::Print as u8,
        OpCode::Jump as u8,
        0,
        1,
        OpCode::Pop as u8,
        OpCode::Return as u8,
      ]
    );
  }

  #[test]
  fn while_lowering() {
    let bytes = compile_bytes("while (false) print 1;");

    assert_eq!(
      bytes,
      vec![
        OpCode::False as u8,
        OpCode::JumpIfFalse as u8,
        0,
        7,
        OpCode::Pop as u8,
        OpCode::Constant as u8,
        0,
        OpCode::Print as u8,
        OpCode::Loop as u8,
        0,
        11,
        OpCode::Pop as u8,
        OpCode::Return as u8,
      ]
    );
  }

  #[test]
  fn and_lowering() {
    let bytes = compile_bytes("true and false;");

    assert_eq!(
      bytes,
      vec![
        OpCode::True as u8,
        OpCode::JumpIfFalse as u8,
        0,
        2,
        OpCode::Pop as u8,
        OpCode::False as u8,
        OpCode::Pop as u8,
        OpCode::Return as u8,
      ]
    );
  }

  #[test]
  fn or_lowering() {
    let bytes = compile_bytes("false or true;");

    assert_eq!(
      bytes,
      vec![
        OpCode::False as u8,
        OpCode::JumpIfFalse as u8,
        0,
        3,
        OpCode::Jump as u8,
        0,
        2,
        OpCode::Pop as u8,
        OpCode::True as u8,
        OpCode::Pop as u8,
        OpCode::Return as u8,
      ]
    );
  }

  #[test]
  fn ending_a_scope_pops_each_local() {
    let bytes = compile_bytes("{ var a = 1; var b = 2; }");

    assert_eq!(
      bytes,
      vec![
        OpCode::Constant as u8,
        0,
        OpCode::Constant as u8,
        1,
        OpCode::Pop as u8,
        OpCode::Pop as u8,
        OpCode::Return as u8,
      ]
    );
  }

  #[test]
  fn locals_resolve_to_slots_globals_to_names() {
    let bytes = compile_bytes("var a = 1; { var b = 2; b = a; }");

    // `b` is read and written through its slot, `a` through a name constant
    assert!(bytes.contains(&(OpCode::SetLocal as u8)));
    assert!(bytes.contains(&(OpCode::GetGlobal as u8)));
    assert!(!bytes.contains(&(OpCode::GetLocal as u8)));
  }

  #[test]
  fn compilation_is_deterministic() {
    let source = "var a = 1; while (a < 10) { a = a + 1; } print a;";
    assert_eq!(compile_bytes(source), compile_bytes(source));
  }

  #[test]
  fn invalid_assignment_target() {
    let errors = errors("1 = 2;");
    assert_eq!(errors, vec!["[line 1] Error at =: Invalid assignment target."]);
  }

  #[test]
  fn local_in_own_initializer() {
    let errors = errors("{ var a = a; }");
    assert_eq!(
      errors,
      vec!["[line 1] Error at a: Can't read local variable in its own initializer."]
    );
  }

  #[test]
  fn duplicate_local_name() {
    let errors = errors("{ var a = 1; var a = 2; }");
    assert_eq!(
      errors,
      vec!["[line 1] Error at a: Already a variable with this name in this scope."]
    );
  }

  #[test]
  fn error_at_end_of_file() {
    let errors = errors("print 1");
    assert_eq!(errors, vec!["[line 1] Error at end: Expect ';' after value."]);
  }

  #[test]
  fn recovers_to_report_later_errors() {
    let errors = errors("var 1;\nprint ;");
    assert_eq!(errors.len(), 2);
    assert!(errors[0].contains("Expect variable name."));
    assert!(errors[1].contains("Expect expression."));
    assert!(errors[1].starts_with("[line 2]"));
  }

  #[test]
  fn shadowing_in_an_inner_scope_is_allowed() {
    assert!(compile("{ var a = 1; { var a = 2; } }").is_ok());
  }
}
