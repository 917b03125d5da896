//! Top-level session workers
//!
//! One entry point per role: the sender drives its pipeline off the
//! control channel's committed transitions, the receiver drives the
//! control channel off its command loop. Both run until TEARDOWN,
//! end of stream plus teardown, or a cancelled signal handle (Ctrl-C).

pub mod receiver;
pub mod sender;
