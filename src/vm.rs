use crate::chunk::{Chunk, OpCode};
use crate::compiler::compile;
use crate::context::Context;
use crate::scanner::LineNumber;
use crate::value::Value;

use ahash::AHashMap as HashMap;
use std::collections::hash_map::Entry;
use std::rc::Rc;
use std::{error, fmt};

const STACK_MAX: usize = 0xFF_FFFF;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum InterpreterResult {
  Ok,
  CompileError,
  RuntimeError,
}

#[derive(Debug, PartialEq, Eq)]
pub struct RuntimeError {
  pub message: String,
  pub line: LineNumber,
}

impl fmt::Display for RuntimeError {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "{}\n[line {}] in script", self.message, self.line)
  }
}
impl error::Error for RuntimeError {}

macro_rules! runtime_error {
  (($vm:expr, $chunk:expr, $ip:expr), $($message:tt)+) => {{
    $vm.stack.clear();

    Err(RuntimeError {
      message: format!($($message)+),
      line: $chunk.get_line_number($ip),
    })
  }};
}

macro_rules! pop {
  ($vm:expr, $chunk:expr, $ip:expr) => {
    match $vm.stack.pop() {
      Some(value) => value,
      None => break runtime_error!(($vm, $chunk, $ip), "Stack underflow."),
    }
  };
}

macro_rules! push {
  ($vm:expr, $chunk:expr, $ip:expr, $value:expr) => {
    if $vm.stack.len() >= STACK_MAX {
      break runtime_error!(($vm, $chunk, $ip), "Stack overflow.");
    } else {
      $vm.stack.push($value);
    }
  };
}

macro_rules! peek {
  ($vm:expr, $chunk:expr, $ip:expr) => {
    match $vm.stack.last() {
      Some(value) => value,
      None => break runtime_error!(($vm, $chunk, $ip), "Stack underflow."),
    }
  };
}

macro_rules! byte_operand {
  ($vm:expr, $chunk:expr, $ip:expr) => {
    match $chunk.get_value($ip + 1) {
      Some(value) => usize::from(value),
      None => break runtime_error!(($vm, $chunk, $ip), "Malformed bytecode."),
    }
  };
}

macro_rules! long_operand {
  ($vm:expr, $chunk:expr, $ip:expr) => {
    match $chunk.get_index($ip + 1) {
      Some(value) => value,
      None => break runtime_error!(($vm, $chunk, $ip), "Malformed bytecode."),
    }
  };
}

macro_rules! jump_operand {
  ($vm:expr, $chunk:expr, $ip:expr) => {
    match $chunk.get_long_value($ip + 1) {
      Some(value) => usize::from(value),
      None => break runtime_error!(($vm, $chunk, $ip), "Malformed bytecode."),
    }
  };
}

macro_rules! constant {
  ($vm:expr, $chunk:expr, $ip:expr, $index:expr) => {
    match $chunk.get_constant($index) {
      Some(value) => value,
      None => break runtime_error!(($vm, $chunk, $ip), "Malformed bytecode."),
    }
  };
}

macro_rules! numeric_expression {
  ($vm:expr, $chunk:expr, $ip:expr, $token:tt) => {
    let (right, left) = (pop!($vm, $chunk, $ip), pop!($vm, $chunk, $ip));

    match (left, right) {
      (Value::Number(left), Value::Number(right)) => {
        push!($vm, $chunk, $ip, Value::Number(left $token right));
      }
      _ => break runtime_error!(($vm, $chunk, $ip), "Operands must be numbers."),
    }
  };
}

macro_rules! comparison_expression {
  ($vm:expr, $chunk:expr, $ip:expr, $token:tt) => {
    let (right, left) = (pop!($vm, $chunk, $ip), pop!($vm, $chunk, $ip));

    match (left, right) {
      (Value::Number(left), Value::Number(right)) => {
        push!($vm, $chunk, $ip, Value::Boolean(left $token right));
      }
      _ => break runtime_error!(($vm, $chunk, $ip), "Operands must be numbers."),
    }
  };
}

pub struct VM {
  stack: Vec<Value>,
  globals: HashMap<Rc<str>, Value>,
}

impl VM {
  pub fn new() -> Self {
    Self {
      stack: Vec::with_capacity(64),
      globals: HashMap::new(),
    }
  }

  pub fn interpret(&mut self, source: &str, context: &mut dyn Context) -> InterpreterResult {
    let chunk = match compile(source) {
      Ok(chunk) => chunk,
      Err(errors) => {
        for error in &errors {
          context.error_line(&error.to_string());
        }
        return InterpreterResult::CompileError;
      }
    };

    match self.run(&chunk, context) {
      Ok(()) => InterpreterResult::Ok,
      Err(error) => {
        context.error_line(&error.message);
        context.error_line(&format!("[line {}] in script", error.line));
        InterpreterResult::RuntimeError
      }
    }
  }

  pub fn run(&mut self, chunk: &Chunk, context: &mut dyn Context) -> Result<(), RuntimeError> {
    let mut ip = 0;

    loop {
      #[cfg(feature = "debug-stack")]
      println!("Stack={:?}", self.stack);
      #[cfg(feature = "debug-bytecode")]
      crate::chunk::disassemble_instruction(chunk, ip);

      let instruction = chunk.get(ip);

      match instruction {
        Some(OpCode::Constant) => {
          let index = byte_operand!(self, chunk, ip);
          let constant = constant!(self, chunk, ip, index);
          push!(self, chunk, ip, constant);
          ip += 2;
        }
        Some(OpCode::ConstantLong) => {
          let index = long_operand!(self, chunk, ip);
          let constant = constant!(self, chunk, ip, index);
          push!(self, chunk, ip, constant);
          ip += 4;
        }
        Some(OpCode::Nil) => {
          push!(self, chunk, ip, Value::Nil);
          ip += 1;
        }
        Some(OpCode::True) => {
          push!(self, chunk, ip, Value::from(true));
          ip += 1;
        }
        Some(OpCode::False) => {
          push!(self, chunk, ip, Value::from(false));
          ip += 1;
        }

        Some(OpCode::Add) => {
          let (right, left) = (pop!(self, chunk, ip), pop!(self, chunk, ip));

          match (left, right) {
            (Value::Number(left), Value::Number(right)) => {
              push!(self, chunk, ip, Value::Number(left + right));
            }
            (Value::String(left), Value::String(right)) => {
              push!(self, chunk, ip, Value::from([left, right].concat()));
            }
            _ => {
              break runtime_error!(
                (self, chunk, ip),
                "Operands must be two numbers or two strings."
              );
            }
          }

          ip += 1;
        }
        Some(OpCode::Subtract) => {
          numeric_expression!(self, chunk, ip, -);
          ip += 1;
        }
        Some(OpCode::Multiply) => {
          numeric_expression!(self, chunk, ip, *);
          ip += 1;
        }
        Some(OpCode::Divide) => {
          numeric_expression!(self, chunk, ip, /);
          ip += 1;
        }
        Some(OpCode::Modulo) => {
          let (right, left) = (pop!(self, chunk, ip), pop!(self, chunk, ip));

          match (left, right) {
            (Value::Number(left), Value::Number(right)) => {
              // Truncated integer remainder, promoted back to a float
              let remainder = (left.trunc() as i64)
                .checked_rem(right.trunc() as i64)
                .map_or(f64::NAN, |value| value as f64);
              push!(self, chunk, ip, Value::Number(remainder));
            }
            _ => break runtime_error!((self, chunk, ip), "Operands must be numbers."),
          }

          ip += 1;
        }
        Some(OpCode::Negate) => {
          let value = pop!(self, chunk, ip);
          match value {
            Value::Number(number) => push!(self, chunk, ip, Value::Number(-number)),
            _ => break runtime_error!((self, chunk, ip), "Operand must be a number."),
          }
          ip += 1;
        }
        Some(OpCode::Not) => {
          let value = pop!(self, chunk, ip);
          push!(self, chunk, ip, Value::from(value.is_falsy()));
          ip += 1;
        }

        Some(OpCode::Equal) => {
          let (right, left) = (pop!(self, chunk, ip), pop!(self, chunk, ip));
          push!(self, chunk, ip, Value::from(left == right));
          ip += 1;
        }
        Some(OpCode::NotEqual) => {
          let (right, left) = (pop!(self, chunk, ip), pop!(self, chunk, ip));
          push!(self, chunk, ip, Value::from(left != right));
          ip += 1;
        }
        Some(OpCode::Greater) => {
          comparison_expression!(self, chunk, ip, >);
          ip += 1;
        }
        Some(OpCode::GreaterEqual) => {
          comparison_expression!(self, chunk, ip, >=);
          ip += 1;
        }
        Some(OpCode::Less) => {
          comparison_expression!(self, chunk, ip, <);
          ip += 1;
        }
        Some(OpCode::LessEqual) => {
          comparison_expression!(self, chunk, ip, <=);
          ip += 1;
        }

        Some(OpCode::Print) => {
          let value = pop!(self, chunk, ip);
          context.print_line(&value.to_string());
          ip += 1;
        }
        Some(OpCode::Pop) => {
          let _ = pop!(self, chunk, ip);
          ip += 1;
        }

        Some(OpCode::DefineGlobal) => {
          let index = byte_operand!(self, chunk, ip);
          let name = constant!(self, chunk, ip, index);
          let value = pop!(self, chunk, ip);
          self.globals.insert(name.as_str(), value);
          ip += 2;
        }
        Some(OpCode::DefineGlobalLong) => {
          let index = long_operand!(self, chunk, ip);
          let name = constant!(self, chunk, ip, index);
          let value = pop!(self, chunk, ip);
          self.globals.insert(name.as_str(), value);
          ip += 4;
        }
        Some(OpCode::GetGlobal) => {
          let index = byte_operand!(self, chunk, ip);
          let name = constant!(self, chunk, ip, index);

          match self.globals.get(&name.as_str()) {
            Some(value) => {
              let value = value.clone();
              push!(self, chunk, ip, value);
            }
            None => {
              break runtime_error!((self, chunk, ip), "Undefined variable '{}'.", name.as_str());
            }
          }

          ip += 2;
        }
        Some(OpCode::GetGlobalLong) => {
          let index = long_operand!(self, chunk, ip);
          let name = constant!(self, chunk, ip, index);

          match self.globals.get(&name.as_str()) {
            Some(value) => {
              let value = value.clone();
              push!(self, chunk, ip, value);
            }
            None => {
              break runtime_error!((self, chunk, ip), "Undefined variable '{}'.", name.as_str());
            }
          }

          ip += 4;
        }
        Some(OpCode::SetGlobal) => {
          let index = byte_operand!(self, chunk, ip);
          let name = constant!(self, chunk, ip, index);
          let value = peek!(self, chunk, ip).clone();

          // Assignment is an expression, so the value stays on the stack
          if let Entry::Occupied(mut entry) = self.globals.entry(name.as_str()) {
            entry.insert(value);
          } else {
            break runtime_error!((self, chunk, ip), "Undefined variable '{}'.", name.as_str());
          }

          ip += 2;
        }
        Some(OpCode::SetGlobalLong) => {
          let index = long_operand!(self, chunk, ip);
          let name = constant!(self, chunk, ip, index);
          let value = peek!(self, chunk, ip).clone();

          if let Entry::Occupied(mut entry) = self.globals.entry(name.as_str()) {
            entry.insert(value);
          } else {
            break runtime_error!((self, chunk, ip), "Undefined variable '{}'.", name.as_str());
          }

          ip += 4;
        }
        Some(OpCode::GetLocal) => {
          let slot = byte_operand!(self, chunk, ip);
          let value = match self.stack.get(slot) {
            Some(value) => value.clone(),
            None => break runtime_error!((self, chunk, ip), "Stack underflow."),
          };
          push!(self, chunk, ip, value);
          ip += 2;
        }
        Some(OpCode::GetLocalLong) => {
          let slot = long_operand!(self, chunk, ip);
          let value = match self.stack.get(slot) {
            Some(value) => value.clone(),
            None => break runtime_error!((self, chunk, ip), "Stack underflow."),
          };
          push!(self, chunk, ip, value);
          ip += 4;
        }
        Some(OpCode::SetLocal) => {
          let slot = byte_operand!(self, chunk, ip);
          let value = peek!(self, chunk, ip).clone();
          match self.stack.get_mut(slot) {
            Some(entry) => *entry = value,
            None => break runtime_error!((self, chunk, ip), "Stack underflow."),
          }
          ip += 2;
        }
        Some(OpCode::SetLocalLong) => {
          let slot = long_operand!(self, chunk, ip);
          let value = peek!(self, chunk, ip).clone();
          match self.stack.get_mut(slot) {
            Some(entry) => *entry = value,
            None => break runtime_error!((self, chunk, ip), "Stack underflow."),
          }
          ip += 4;
        }

        Some(OpCode::Jump) => {
          let offset = jump_operand!(self, chunk, ip);
          ip += offset + 3;
        }
        Some(OpCode::JumpIfFalse) => {
          let offset = jump_operand!(self, chunk, ip);
          if peek!(self, chunk, ip).is_falsy() {
            ip += offset + 3;
          } else {
            ip += 3;
          }
        }
        Some(OpCode::Loop) => {
          let offset = jump_operand!(self, chunk, ip);
          ip = ip + 3 - offset;
        }

        Some(OpCode::Return) => break Ok(()),
        None => break runtime_error!((self, chunk, ip), "Unknown OpCode"),
      }

      if ip >= chunk.len() {
        break Ok(());
      }
    }
  }
}

impl Default for VM {
  fn default() -> Self {
    Self::new()
  }
}
