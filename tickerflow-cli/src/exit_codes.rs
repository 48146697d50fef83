//! Process exit codes. Scripts polling `tickerflow` rely on these values.

pub const SUCCESS: i32 = 0;
/// Bad configuration, unknown workflow type, missing handler or rejected symbols.
pub const VALIDATION_FAILED: i32 = 2;
/// The workflow ended `failed` or `cancelled`.
pub const RUN_FAILED: i32 = 3;
/// Store, I/O or other environment failure.
pub const RUNTIME_ERROR: i32 = 4;
