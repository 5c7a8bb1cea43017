//! Buying-side record of one connection: announced terms, request progress, channel, payee.

use serde::Serialize;

use crate::connection::{Connection, ConnectionError};
use crate::payment::{ContractId, Payee, PaymentError, PaymentUpdate, Payor, StartDownloadInfo};
use crate::protocol::{Message, SellerTerms};

/// Outbound transport for one connection. Fire-and-forget.
pub type SendMessage = Box<dyn FnMut(&Message)>;

/// What the seller is doing for us. `since` is the engine tick the state was entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RequestState {
    Idle,
    Requested { index: u32, since: u64 },
    /// Piece data arrived; the host is verifying it.
    AwaitingValidation {
        index: u32,
        since: u64,
        /// Already paid for before validation finished.
        compensated: bool,
    },
    /// The requested piece was completed without this delivery; the late copy will be dropped.
    Draining {
        index: u32,
        since: u64,
        /// Paid for already; the late copy owes nothing.
        compensated: bool,
    },
}

#[derive(Debug, Clone, Copy)]
struct Invitation {
    contract_id: ContractId,
    info: StartDownloadInfo,
}

pub struct Seller<Id> {
    id: Id,
    connection: Connection,
    send: SendMessage,
    request: RequestState,
    invitation: Option<Invitation>,
    invitation_attempts: u32,
    payor: Option<Payor>,
    payee: Option<Payee>,
    valid_pieces: u32,
}

impl<Id> Seller<Id> {
    pub fn new(id: Id, connection: Connection, send: SendMessage) -> Self {
        Self {
            id,
            connection,
            send,
            request: RequestState::Idle,
            invitation: None,
            invitation_attempts: 0,
            payor: None,
            payee: None,
            valid_pieces: 0,
        }
    }

    pub fn id(&self) -> &Id {
        &self.id
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    pub fn connection_mut(&mut self) -> &mut Connection {
        &mut self.connection
    }

    pub fn terms(&self) -> Option<SellerTerms> {
        self.connection
            .announced_mode_and_terms_from_peer()
            .seller_terms()
            .copied()
    }

    pub fn request_state(&self) -> RequestState {
        self.request
    }

    /// Piece this seller holds in the ledger.
    pub fn assigned_piece(&self) -> Option<u32> {
        match self.request {
            RequestState::Requested { index, .. }
            | RequestState::AwaitingValidation { index, .. } => Some(index),
            RequestState::Idle | RequestState::Draining { .. } => None,
        }
    }

    pub fn is_invited(&self) -> bool {
        self.invitation.is_some()
    }

    /// Joined the contract we invited it to.
    pub fn has_joined(&self) -> bool {
        self.invitation.is_some() && self.payee.is_some()
    }

    pub fn invitation_attempts(&self) -> u32 {
        self.invitation_attempts
    }

    pub fn payor(&self) -> Option<&Payor> {
        self.payor.as_ref()
    }

    pub fn valid_pieces(&self) -> u32 {
        self.valid_pieces
    }

    /// Joined, idle, payable and in a state where a request may go out.
    pub fn can_take_piece(&self) -> bool {
        self.has_joined()
            && self.request == RequestState::Idle
            && self.payor.as_ref().is_some_and(Payor::can_pay)
            && self.connection.can_request()
    }

    /// Record the message with the connection machine, then hand it to the transport.
    pub fn send(&mut self, msg: Message) -> Result<(), ConnectionError> {
        self.connection.on_sent(&msg)?;
        (self.send)(&msg);
        Ok(())
    }

    /// Send contract parameters and open a channel priced at the seller's asking price.
    pub fn invite(
        &mut self,
        contract_id: ContractId,
        info: StartDownloadInfo,
        price: u64,
    ) -> Result<(), ConnectionError> {
        self.send(ready_message(contract_id, &info))?;
        self.invitation = Some(Invitation { contract_id, info });
        self.invitation_attempts = 1;
        self.payor = Some(Payor::new(price, info.value));
        self.payee = None;
        Ok(())
    }

    /// Send the invitation again after a stalled invitation phase.
    pub fn reinvite(&mut self) -> Result<(), ConnectionError> {
        let Some(invitation) = self.invitation else {
            return Ok(());
        };
        self.send(ready_message(invitation.contract_id, &invitation.info))?;
        self.invitation_attempts += 1;
        Ok(())
    }

    /// Drop a stale invitation; the seller is no longer part of the contract.
    pub fn revoke_invitation(&mut self) {
        self.invitation = None;
        self.invitation_attempts = 0;
        self.payor = None;
        self.payee = None;
    }

    /// Returns `false` if the seller was not invited; the join is then ignored.
    pub fn joined(&mut self, payee: Payee) -> bool {
        if self.invitation.is_none() {
            return false;
        }
        self.payee = Some(payee);
        true
    }

    pub fn request_piece(&mut self, index: u32, now: u64) -> Result<(), ConnectionError> {
        self.send(Message::RequestFullPiece { index })?;
        self.request = RequestState::Requested { index, since: now };
        Ok(())
    }

    /// `Requested -> AwaitingValidation`. Returns the requested index.
    pub fn piece_arrived(&mut self, now: u64) -> Option<u32> {
        let RequestState::Requested { index, .. } = self.request else {
            return None;
        };
        self.request = RequestState::AwaitingValidation {
            index,
            since: now,
            compensated: false,
        };
        Some(index)
    }

    /// The host accepted the piece. Returns whether it was already paid for; if not, the caller pays now.
    ///
    /// A piece validated before its delivery arrived leaves the seller draining the outstanding copy.
    pub fn piece_validated(&mut self, now: u64) -> bool {
        let compensated = match self.request {
            RequestState::Requested { index, .. } => {
                self.request = RequestState::Draining {
                    index,
                    since: now,
                    compensated: true,
                };
                false
            }
            RequestState::AwaitingValidation { compensated, .. } => {
                self.request = RequestState::Idle;
                compensated
            }
            RequestState::Idle | RequestState::Draining { .. } => {
                self.request = RequestState::Idle;
                false
            }
        };
        self.valid_pieces += 1;
        compensated
    }

    /// The held piece was completed out of band. Returns `Some(compensated)` if the seller had already
    /// delivered it; otherwise the seller drains its outstanding request.
    pub fn piece_completed_elsewhere(&mut self, now: u64) -> Option<bool> {
        match self.request {
            RequestState::Requested { index, .. } => {
                self.request = RequestState::Draining {
                    index,
                    since: now,
                    compensated: false,
                };
                None
            }
            RequestState::AwaitingValidation { compensated, .. } => {
                self.request = RequestState::Idle;
                Some(compensated)
            }
            RequestState::Idle | RequestState::Draining { .. } => None,
        }
    }

    /// A drained delivery arrived and was dropped. Returns `Some(compensated)` if the seller was draining.
    pub fn drained(&mut self) -> Option<bool> {
        let RequestState::Draining { compensated, .. } = self.request else {
            return None;
        };
        self.request = RequestState::Idle;
        Some(compensated)
    }

    /// Pay for a delivered but not yet validated piece.
    pub fn compensate(&mut self) -> Result<Option<PaymentUpdate>, SellerError> {
        let RequestState::AwaitingValidation {
            index,
            since,
            compensated: false,
        } = self.request
        else {
            return Ok(None);
        };
        let update = self.pay()?;
        self.request = RequestState::AwaitingValidation {
            index,
            since,
            compensated: true,
        };
        Ok(Some(update))
    }

    /// Advance the channel by one piece and send the update.
    pub fn pay(&mut self) -> Result<PaymentUpdate, SellerError> {
        let payor = self.payor.as_mut().ok_or(SellerError::NotInContract)?;
        let update = payor.make_payment()?;
        self.send(Message::Payment {
            number: update.number,
            amount_paid: update.amount_paid,
        })?;
        Ok(update)
    }
}

fn ready_message(contract_id: ContractId, info: &StartDownloadInfo) -> Message {
    Message::Ready {
        contract_id,
        value: info.value,
        output_index: info.output_index,
        contract_key: info.buyer_contract_key,
        final_key_hash: info.buyer_final_key_hash,
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SellerError {
    #[error("seller is not part of the contract")]
    NotInContract,
    #[error(transparent)]
    Payment(#[from] PaymentError),
    #[error(transparent)]
    Connection(#[from] ConnectionError),
}
