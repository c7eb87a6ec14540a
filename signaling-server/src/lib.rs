/*!
Signaling relay for pairwise offer/answer negotiation.

Peers connect to `/ws`, optionally announcing their identity with `?uuid=<id>`, and send
JSON frames carrying either a session description or a connectivity candidate. The relay
forwards each frame verbatim to the other connected peers and never interprets the payload.
Delivery is best effort: a peer whose connection breaks is dropped without telling the sender.
*/

pub mod config;
pub mod connection;
pub mod error;
pub mod registry;
pub mod relay;
pub mod router;

pub use config::Config;
pub use error::{RelayError, Result};
pub use relay::{Relay, RelayMode, RelayStats};
pub use router::ServerState;
