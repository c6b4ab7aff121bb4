mod lox_test;
use lox_test::*;

lox_test!(invalid_assignment_target
  "1 = 2;"
  CompileError
  "[line 1] Error at =: Invalid assignment target."
);

lox_test!(missing_semicolon_reports_at_end
  "print 1"
  CompileError
  "[line 1] Error at end: Expect ';' after value."
);

lox_test!(expected_expression
  "print ;"
  CompileError
  "Expect expression."
);

lox_test!(scan_errors_have_no_at_clause
  "print \"abc;"
  CompileError
  "[line 1] Error: Unterminated string."
);

lox_test!(unknown_character
  "print 1 @ 2;"
  CompileError
  "Unrecognized character '@'."
);

lox_test!(unterminated_block_comment
  "/* comment"
  CompileError
  "Unterminated block comment."
);

lox_test!(error_names_the_offending_token
  "var x = 1; x ** 2;"
  CompileError
  "Error at *"
);

lox_test!(recovery_reports_errors_from_later_statements
  "var 1;\nprint ;"
  CompileError
  "Expect variable name."
  "Expect expression."
);

lox_test!(error_lines_follow_the_source
  "var a = 1;\nvar b = 2;\nprint ;"
  CompileError
  "[line 3] Error"
);

lox_test!(runtime_error_reports_message_then_line
  "print nil + 1;"
  RuntimeError
  "Operands must be two numbers or two strings."
  "[line 1] in script"
);

lox_test!(runtime_error_line_matches_the_failing_statement
  "var a = 1;\nprint a;\nprint a + nil;"
  RuntimeError
  "[line 3] in script"
);

#[test]
fn output_before_a_runtime_error_is_kept() {
  let (result, context) = run("print 1;\nprint missing;");
  assert_eq!(result, InterpreterResult::RuntimeError);
  assert_eq!(context.stdout, vec!["1".to_string()]);
  assert_eq!(
    context.stderr,
    vec![
      "Undefined variable 'missing'.".to_string(),
      "[line 2] in script".to_string(),
    ]
  );
}

#[test]
fn compile_errors_stop_execution_entirely() {
  let (result, context) = run("print 1; print ;");
  assert_eq!(result, InterpreterResult::CompileError);
  assert!(context.stdout.is_empty());
}
