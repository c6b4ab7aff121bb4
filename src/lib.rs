mod chunk;
mod compiler;
mod context;
mod scanner;
mod value;
mod vm;

// Compile a string of source code into a chunk of bytecode
pub use chunk::{Chunk, OpCode};
pub use compiler::{compile, CompileError};
pub use scanner::LineNumber;

// Run a chunk of bytecode
pub use vm::{InterpreterResult, RuntimeError, VM};

// A value from the virtual machine
pub use value::Value;

// Where printed values and diagnostics are sent
pub use context::{CaptureContext, Context, StdContext};

// Interpret a string of source code with a fresh set of globals
pub fn interpret(source: &str, context: &mut dyn Context) -> InterpreterResult {
  let mut vm = VM::new();
  vm.interpret(source, context)
}
