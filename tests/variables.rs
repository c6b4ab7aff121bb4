mod lox_test;
use lox_test::*;

lox_test!(define_and_read_a_global
  "var a = 1; a = a + 1; print a;"
  "2"
);

lox_test!(uninitialized_global_is_nil
  "var a; print a;"
  "nil"
);

lox_test!(assignment_is_an_expression
  "var a; var b; a = b = 3; print a; print b;"
  "3"
  "3"
);

lox_test!(assignment_in_a_larger_expression
  "var a = 1; print (a = 5) + 1; print a;"
  "6"
  "5"
);

lox_test!(redefining_a_global_reads_the_old_value
  "var x = 1; var x = x + 1; print x;"
  "2"
);

lox_test!(globals_hold_any_value
  "var a = nil; var b = true; var c = \"text\"; print a; print b; print c;"
  "nil"
  "true"
  "text"
);

lox_test!(reading_an_undefined_global_fails
  "print missing;"
  RuntimeError
  "Undefined variable 'missing'."
);

lox_test!(assigning_an_undefined_global_fails
  "missing = 1;"
  RuntimeError
  "Undefined variable 'missing'."
);
