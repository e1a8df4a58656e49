//! Terminal mascot. Printed at startup when stdout is a terminal.

pub const CRAB: &str = r"
      \ /
     --o--          dyncrab
       |            every crab knows where home is
  .-'     '-.
 /  (\   /)  \
 \_  ^   ^  _/
   \__|_|__/
  //       \\
 ((         ))
  \\__,,,__//
";
