pub mod error;
pub mod invitation;
pub mod message;
pub mod proto;
pub mod stream;
pub mod topic;

pub use error::ProtocolError;
pub use invitation::{Invitation, InvitationContext, SealedInvitation, SealedInvitationHeader};
pub use message::{Message, MessageHeader};
pub use stream::{AsyncStream, EndGuard};
