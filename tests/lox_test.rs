pub use lox::InterpreterResult;

use lox::CaptureContext;

pub fn run(source: &str) -> (InterpreterResult, CaptureContext) {
  let mut context = CaptureContext::default();
  let result = lox::interpret(source, &mut context);
  (result, context)
}

#[macro_export]
macro_rules! lox_test {
  ($name:ident $code:literal CompileError $( $fragment:literal )*) => {
    #[test]
    fn $name() {
      let (result, context) = run($code);
      assert_eq!(result, InterpreterResult::CompileError);
      $(
        assert!(
          context.stderr.iter().any(|line| line.contains($fragment)),
          "stderr {:?} is missing {:?}",
          context.stderr,
          $fragment,
        );
      )*
    }
  };

  ($name:ident $code:literal RuntimeError $( $fragment:literal )*) => {
    #[test]
    fn $name() {
      let (result, context) = run($code);
      assert_eq!(result, InterpreterResult::RuntimeError);
      $(
        assert!(
          context.stderr.iter().any(|line| line.contains($fragment)),
          "stderr {:?} is missing {:?}",
          context.stderr,
          $fragment,
        );
      )*
    }
  };

  ($name:ident $code:literal $( $line:literal )*) => {
    #[test]
    fn $name() {
      let (result, context) = run($code);
      assert_eq!(
        result,
        InterpreterResult::Ok,
        "stderr: {:?}",
        context.stderr,
      );

      let expected: Vec<String> = vec![$( $line.to_string() ),*];
      assert_eq!(context.stdout, expected);
    }
  };
}
