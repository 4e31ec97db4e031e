//! Partner linkage: invitation codes and the couples they create.

pub mod couple;
pub mod invitation;

pub use couple::{CoupleLinkStatus, CoupleService};
pub use invitation::{CreatedInvitation, InvitationService, VerifiedInvitation};
