mod lox_test;
use lox_test::*;

lox_test!(and_returns_the_deciding_operand
  "print 1 and 2; print nil and 2; print false and 1;"
  "2"
  "nil"
  "false"
);

lox_test!(or_returns_the_deciding_operand
  "print 1 or 2; print nil or 2; print false or \"x\";"
  "1"
  "2"
  "x"
);

lox_test!(and_short_circuits_a_falsy_left
  "print false and missing;"
  "false"
);

lox_test!(or_short_circuits_a_truthy_left
  "print true or missing;"
  "true"
);

lox_test!(and_evaluates_the_right_when_needed
  "print true and missing;"
  RuntimeError
  "Undefined variable 'missing'."
);

lox_test!(or_evaluates_the_right_when_needed
  "print false or missing;"
  RuntimeError
  "Undefined variable 'missing'."
);

lox_test!(chains
  "print 1 and 2 and 3; print nil or false or 3;"
  "3"
  "3"
);

lox_test!(or_binds_looser_than_and
  "print false and false or true;"
  "true"
);

lox_test!(short_circuit_skips_side_effects
  "var a = 0; true or (a = 1); print a;"
  "0"
);
