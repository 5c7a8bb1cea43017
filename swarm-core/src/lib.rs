//! Buying side of a paid piece-exchange swarm.
//! Host-driven: no I/O; host passes connection events and commands, the engine answers through callbacks.

pub mod buying;
pub mod config;
pub mod connection;
pub mod ledger;
pub mod payment;
pub mod policy;
pub mod protocol;
pub mod registry;
pub mod seller;
pub mod status;

pub use buying::{Buying, BuyingError, BuyingState, Callbacks, DisconnectCause};
pub use config::BuyingConfig;
pub use ledger::{PieceInformation, PieceLedger, PieceState};
pub use payment::{Contract, ContractId, Payee, PaymentUpdate, StartDownloadInfo};
pub use policy::PickNextPiece;
pub use protocol::{AnnouncedModeAndTerms, BuyerTerms, Message, SellerTerms};
pub use status::{BuyingStatus, SellerStatus};
