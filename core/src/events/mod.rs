pub mod detection;
pub mod emission;
pub mod profile;

pub use detection::DetectionEvent;
pub use emission::{seconds_between, CandidateEmission};
pub use profile::{ReceiverId, ReceiverProfile, ReceiverTable};
