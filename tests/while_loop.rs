mod lox_test;
use lox_test::*;

lox_test!(counts_up
  "var i = 0; while (i < 3) { print i; i = i + 1; }"
  "0"
  "1"
  "2"
);

lox_test!(false_condition_never_runs_the_body
  "while (false) print 1; print 2;"
  "2"
);

lox_test!(body_with_locals
  "var total = 0;
   var i = 0;
   while (i < 5) {
     var double = i * 2;
     total = total + double;
     i = i + 1;
   }
   print total;"
  "20"
);

lox_test!(condition_reevaluated_each_iteration
  "{ var i = 3; while (i > 0) i = i - 1; print i; }"
  "0"
);

lox_test!(missing_parenthesis
  "while true) print 1;"
  CompileError
  "Expect '(' after 'while'."
);
