use rustyline::error::ReadlineError;
use rustyline::Editor;

use std::env;
use std::fs;
use std::process::exit;

use lox::{interpret, InterpreterResult, StdContext, VM};

fn main() {
  let args: Vec<String> = env::args().collect();
  match args.len() {
    1 => repl(),
    2 => run_file(&args[1]),
    _ => {
      println!("Usage: lox [file]");
      exit(64);
    }
  }
}

fn repl() {
  let mut rl = Editor::<()>::new();
  let mut vm = VM::new();
  let mut context = StdContext;

  loop {
    let readline = rl.readline("> ");
    match readline {
      Ok(line) => {
        if line.trim().is_empty() {
          continue;
        }
        rl.add_history_entry(line.as_str());
        vm.interpret(&line, &mut context);
      }
      Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
      Err(err) => {
        println!("Error: {:?}", err);
        break;
      }
    }
  }
}

fn run_file(filename: &str) {
  if let Ok(file) = fs::read_to_string(filename) {
    let result = interpret(&file, &mut StdContext);

    match result {
      InterpreterResult::CompileError => exit(65),
      InterpreterResult::RuntimeError => exit(70),
      InterpreterResult::Ok => {}
    }
  } else {
    println!("Problem reading file '{}'", filename);
    exit(74);
  }
}
