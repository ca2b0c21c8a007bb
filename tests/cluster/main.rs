#[macro_use]
#[path = "../fixtures/mod.rs"]
mod fixtures;

// The number indicate the preferred running order for these case.

mod t10_elect;
mod t20_replicate;
mod t30_partition_step_down;
mod t40_join;
mod t50_leave;
mod t60_append_conflict;
mod t70_restart;
