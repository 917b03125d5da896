//! Media transport pipelines
//!
//! Both ends of the pair are built from stages that run as independent
//! tasks and communicate through channels and the shared buffers:
//! - Sender: media source → packetize → datagrams, with a parity packet
//!   per completed protection group
//! - Receiver: datagram intake → dispatch by payload type → FEC recovery
//!   and fixed-rate playback
//!
//! Coordinators wire the stages together and own their lifecycle; a
//! [`SessionSignals`] handle gates pause/resume and carries the
//! cancellation token every blocking point selects on.

pub mod receiver;
pub mod sender;
pub mod signals;
pub mod stage;

pub use signals::SessionSignals;
pub use stage::PipelineStage;
