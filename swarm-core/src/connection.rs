//! Buyer-side protocol machine for one peer connection.
//!
//! Inbound messages go through [`Connection::on_message`], which checks them against the current
//! state and raises at most one [`ConnectionEvent`]. Outbound messages are recorded with
//! [`Connection::on_sent`] before they leave, so the machine always knows what the peer may send next.

use serde::Serialize;

use crate::payment::Payee;
use crate::protocol::{AnnouncedModeAndTerms, Message};

/// Progress of the connection from the buyer's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConnectionState {
    /// Peer has not said which mode it is in.
    AwaitingAnnouncement,
    Announced,
    /// We sent contract parameters; waiting for the seller to join.
    Invited,
    Joined,
    PieceRequested { index: u32 },
    PieceDelivered { index: u32 },
}

impl ConnectionState {
    pub fn name(&self) -> &'static str {
        match self {
            ConnectionState::AwaitingAnnouncement => "awaiting_announcement",
            ConnectionState::Announced => "announced",
            ConnectionState::Invited => "invited",
            ConnectionState::Joined => "joined",
            ConnectionState::PieceRequested { .. } => "piece_requested",
            ConnectionState::PieceDelivered { .. } => "piece_delivered",
        }
    }

    /// Invited or further along: the peer's announced terms are binding.
    pub fn in_contract(&self) -> bool {
        matches!(
            self,
            ConnectionState::Invited
                | ConnectionState::Joined
                | ConnectionState::PieceRequested { .. }
                | ConnectionState::PieceDelivered { .. }
        )
    }
}

/// Discrete events raised to the buying engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    PeerAnnouncedMode(AnnouncedModeAndTerms),
    SellerJoined(Payee),
    /// Peer re-announced its mode while bound by a contract.
    SellerInterruptedContract,
    ReceivedFullPiece { index: u32, data: Vec<u8> },
}

pub struct Connection {
    state: ConnectionState,
    announced: AnnouncedModeAndTerms,
    max_piece_index: u32,
    /// Longest piece the peer may deliver, in bytes.
    max_piece_len: u64,
}

impl Connection {
    pub fn new(max_piece_index: u32, max_piece_len: u64) -> Self {
        Self {
            state: ConnectionState::AwaitingAnnouncement,
            announced: AnnouncedModeAndTerms::None,
            max_piece_index,
            max_piece_len,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn announced_mode_and_terms_from_peer(&self) -> AnnouncedModeAndTerms {
        self.announced
    }

    pub fn max_piece_index(&self) -> u32 {
        self.max_piece_index
    }

    pub fn can_invite(&self) -> bool {
        matches!(
            self.state,
            ConnectionState::Announced | ConnectionState::Invited
        )
    }

    pub fn can_request(&self) -> bool {
        matches!(
            self.state,
            ConnectionState::Joined | ConnectionState::PieceDelivered { .. }
        )
    }

    /// Dispatch an inbound message.
    pub fn on_message(&mut self, msg: Message) -> Result<Option<ConnectionEvent>, ConnectionError> {
        match (self.state, msg) {
            (_, Message::Observe) => Ok(Some(self.announce(AnnouncedModeAndTerms::Observe))),
            (_, Message::Buy { terms }) => {
                Ok(Some(self.announce(AnnouncedModeAndTerms::Buy(terms))))
            }
            (_, Message::Sell { terms }) => {
                Ok(Some(self.announce(AnnouncedModeAndTerms::Sell(terms))))
            }
            (
                ConnectionState::Invited,
                Message::JoiningContract {
                    contract_key,
                    final_key_hash,
                },
            ) => {
                self.state = ConnectionState::Joined;
                Ok(Some(ConnectionEvent::SellerJoined(Payee {
                    contract_key,
                    final_key_hash,
                })))
            }
            (ConnectionState::PieceRequested { index }, Message::FullPiece { data }) => {
                let len = data.len() as u64;
                if len > self.max_piece_len {
                    return Err(ConnectionError::PieceTooLarge {
                        len,
                        max: self.max_piece_len,
                    });
                }
                self.state = ConnectionState::PieceDelivered { index };
                Ok(Some(ConnectionEvent::ReceivedFullPiece { index, data }))
            }
            (state, msg) => Err(ConnectionError::UnexpectedMessage {
                message: msg.kind(),
                state: state.name(),
            }),
        }
    }

    /// Record an outbound message. Fails if we are not allowed to send it now.
    pub fn on_sent(&mut self, msg: &Message) -> Result<(), ConnectionError> {
        let next = match (self.state, msg) {
            (state, Message::Buy { .. }) => state,
            (ConnectionState::Announced | ConnectionState::Invited, Message::Ready { .. }) => {
                ConnectionState::Invited
            }
            (
                ConnectionState::Joined | ConnectionState::PieceDelivered { .. },
                Message::RequestFullPiece { index },
            ) => {
                if *index > self.max_piece_index {
                    return Err(ConnectionError::PieceIndexOutOfRange {
                        index: *index,
                        max: self.max_piece_index,
                    });
                }
                ConnectionState::PieceRequested { index: *index }
            }
            (
                ConnectionState::Joined
                | ConnectionState::PieceRequested { .. }
                | ConnectionState::PieceDelivered { .. },
                Message::Payment { .. },
            ) => match self.state {
                ConnectionState::PieceDelivered { .. } => ConnectionState::Joined,
                state => state,
            },
            (state, msg) => {
                return Err(ConnectionError::CannotSend {
                    message: msg.kind(),
                    state: state.name(),
                })
            }
        };
        self.state = next;
        Ok(())
    }

    fn announce(&mut self, announced: AnnouncedModeAndTerms) -> ConnectionEvent {
        let interrupted = self.state.in_contract();
        self.announced = announced;
        self.state = ConnectionState::Announced;
        if interrupted {
            ConnectionEvent::SellerInterruptedContract
        } else {
            ConnectionEvent::PeerAnnouncedMode(announced)
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("unexpected {message} message in state {state}")]
    UnexpectedMessage {
        message: &'static str,
        state: &'static str,
    },
    #[error("cannot send {message} message in state {state}")]
    CannotSend {
        message: &'static str,
        state: &'static str,
    },
    #[error("piece index {index} beyond max piece index {max}")]
    PieceIndexOutOfRange { index: u32, max: u32 },
    #[error("piece of {len} bytes exceeds the {max} byte limit")]
    PieceTooLarge { len: u64, max: u64 },
}
