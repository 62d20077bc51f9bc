//! Scenario tests exercising the processor pipeline end to end.

mod helpers;
mod processor;
