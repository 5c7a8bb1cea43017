//! Buying mode engine. The host feeds it connection events and session commands; the engine
//! assigns pieces to sellers, requests them, pays for them and reports back through [`Callbacks`].
//!
//! Nothing here performs I/O or keeps time. Outbound messages go through each connection's send
//! callback and the host calls [`Buying::tick`] periodically; every timeout is counted in ticks.

use std::collections::BTreeMap;
use std::fmt::Debug;

use serde::{Deserialize, Serialize};

use crate::config::BuyingConfig;
use crate::connection::{Connection, ConnectionError, ConnectionEvent};
use crate::ledger::{LedgerError, PieceInformation, PieceLedger, PieceState};
use crate::payment::{Contract, Payee, PaymentUpdate, StartDownloadInfo};
use crate::policy::{self, PickNextPiece};
use crate::protocol::{AnnouncedModeAndTerms, BuyerTerms, Message};
use crate::registry::ConnectionRegistry;
use crate::seller::{RequestState, SendMessage, Seller};
use crate::status::{BuyingStatus, SellerStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BuyingState {
    NotStarted,
    /// Contract parameters sent; waiting for enough sellers to join.
    SendingInvitations,
    Operating,
    /// No new requests; outstanding ones still complete and get paid.
    Paused,
}

/// Why a connection was dropped. Reported once per removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DisconnectCause {
    PeerDisconnected,
    ProtocolViolation,
    InvalidPieceReceived,
    SellerInterruptedContract,
    Unresponsive,
    SessionStopped,
    PolicyEviction,
}

/// Notifications to the host. Each fires synchronously from inside the engine call that caused it.
pub struct Callbacks<Id> {
    pub removed_connection: Box<dyn FnMut(&Id, DisconnectCause)>,
    /// A piece passed host validation and is now downloaded.
    pub full_piece_arrived: Box<dyn FnMut(&Id, u32)>,
    pub sent_payment: Box<dyn FnMut(&Id, &PaymentUpdate)>,
    /// Delivered piece data. The host verifies it and answers with
    /// [`Buying::valid_piece_received_on_connection`] or [`Buying::invalid_piece_received_on_connection`].
    pub piece_data: Box<dyn FnMut(&Id, u32, &[u8])>,
    pub download_completed: Box<dyn FnMut()>,
}

impl<Id> Default for Callbacks<Id> {
    fn default() -> Self {
        Self {
            removed_connection: Box::new(|_: &Id, _: DisconnectCause| {}),
            full_piece_arrived: Box::new(|_: &Id, _: u32| {}),
            sent_payment: Box::new(|_: &Id, _: &PaymentUpdate| {}),
            piece_data: Box::new(|_: &Id, _: u32, _: &[u8]| {}),
            download_completed: Box::new(|| {}),
        }
    }
}

/// Buying-side session engine over connections identified by `Id`.
pub struct Buying<Id> {
    callbacks: Callbacks<Id>,
    config: BuyingConfig,
    state: BuyingState,
    terms: BuyerTerms,
    sellers: ConnectionRegistry<Id>,
    pieces: PieceLedger<Id>,
    contract: Option<Contract>,
    tick_count: u64,
    last_start_of_sending_invitations: u64,
    completion_signaled: bool,
    pick_next_piece: Option<Box<dyn PickNextPiece<Id>>>,
}

impl<Id: Clone + Ord + Debug> Buying<Id> {
    pub fn new(callbacks: Callbacks<Id>, terms: BuyerTerms, pieces: &[PieceInformation]) -> Self {
        Self::with_config(callbacks, terms, pieces, BuyingConfig::default())
    }

    pub fn with_config(
        callbacks: Callbacks<Id>,
        terms: BuyerTerms,
        pieces: &[PieceInformation],
        config: BuyingConfig,
    ) -> Self {
        let pieces = PieceLedger::new(pieces);
        let completion_signaled = pieces.is_complete();
        Self {
            callbacks,
            config,
            state: BuyingState::NotStarted,
            terms,
            sellers: ConnectionRegistry::new(),
            pieces,
            contract: None,
            tick_count: 0,
            last_start_of_sending_invitations: 0,
            completion_signaled,
            pick_next_piece: None,
        }
    }

    pub fn state(&self) -> BuyingState {
        self.state
    }

    pub fn terms(&self) -> BuyerTerms {
        self.terms
    }

    pub fn is_complete(&self) -> bool {
        self.pieces.is_complete()
    }

    /// Replace our terms. Only connections added afterwards see them.
    pub fn update_terms(&mut self, terms: BuyerTerms) {
        tracing::debug!(?terms, "buyer terms updated");
        self.terms = terms;
    }

    /// Install a piece selection strategy for fresh pieces.
    pub fn set_pick_next_piece_method<P: PickNextPiece<Id> + 'static>(&mut self, picker: P) {
        self.pick_next_piece = Some(Box::new(picker));
    }

    /// Move the streaming threshold (seek).
    pub fn set_assignment_lower_bound(&mut self, index: u32) -> Result<(), BuyingError> {
        self.pieces.set_assignment_lower_bound(index)?;
        tracing::debug!(piece = index, "assignment lower bound moved");
        Ok(())
    }

    pub fn status(&self) -> BuyingStatus<Id> {
        BuyingStatus {
            state: self.state,
            terms: self.terms,
            tick: self.tick_count,
            contract: self.contract.as_ref().map(Contract::id),
            assignment_lower_bound: self.pieces.assignment_lower_bound(),
            missing_pieces: self.pieces.missing_count(),
            pieces: (0..self.pieces.len())
                .filter_map(|i| self.pieces.state(i).cloned())
                .collect(),
            deassigned: self.pieces.deassigned().collect(),
            sellers: self.sellers.iter().map(SellerStatus::of).collect(),
        }
    }

    /// Register a connection and announce our buyer terms to it. Returns the new connection count.
    pub fn add_connection(&mut self, id: Id, send: SendMessage) -> Result<usize, BuyingError> {
        if self.sellers.contains(&id) {
            tracing::warn!(connection = ?id, "connection already registered");
            return Err(BuyingError::DuplicateConnection {
                connections: self.sellers.len(),
            });
        }
        let connection = Connection::new(
            self.pieces.len().saturating_sub(1),
            self.pieces.max_piece_size(),
        );
        let mut seller = Seller::new(id.clone(), connection, send);
        seller.send(Message::Buy { terms: self.terms })?;
        let connections = self
            .sellers
            .insert(seller)
            .map_err(|connections| BuyingError::DuplicateConnection { connections })?;
        tracing::debug!(connection = ?id, connections, "connection added");
        Ok(connections)
    }

    /// Drop a connection, returning its piece to the deassigned queue. `false` if `id` is unknown.
    pub fn remove_connection(&mut self, id: &Id, cause: DisconnectCause) -> bool {
        let Some(seller) = self.sellers.remove(id) else {
            tracing::warn!(connection = ?id, ?cause, "removing unknown connection");
            return false;
        };
        if let Some(index) = seller.assigned_piece() {
            match self.pieces.deassign(index) {
                Ok(_) => tracing::debug!(connection = ?id, piece = index, "piece deassigned"),
                Err(err) => {
                    tracing::error!(connection = ?id, piece = index, error = %err, "ledger out of sync with seller")
                }
            }
        }
        tracing::info!(connection = ?id, ?cause, "connection removed");
        (self.callbacks.removed_connection)(id, cause);
        true
    }

    /// Feed an inbound peer message through the connection's protocol machine.
    /// Illegal messages evict the connection; only an unknown `id` is an error.
    pub fn process_message(&mut self, id: &Id, msg: Message) -> Result<(), BuyingError> {
        let seller = self.sellers.get_mut(id).ok_or_else(|| unknown(id))?;
        let kind = msg.kind();
        match seller.connection_mut().on_message(msg) {
            Ok(Some(event)) => self.dispatch(id, event),
            Ok(None) => {}
            Err(err) => {
                tracing::warn!(connection = ?id, message = kind, error = %err, "protocol violation");
                self.remove_connection(id, DisconnectCause::ProtocolViolation);
            }
        }
        Ok(())
    }

    pub fn peer_announced_mode_and_terms(
        &mut self,
        id: &Id,
        announced: AnnouncedModeAndTerms,
    ) -> Result<(), BuyingError> {
        match announced.to_message() {
            Some(msg) => self.process_message(id, msg),
            None if self.sellers.contains(id) => Ok(()),
            None => Err(unknown(id)),
        }
    }

    /// The seller accepted our invitation and supplied its payee keys.
    pub fn seller_has_joined(&mut self, id: &Id, payee: Payee) -> Result<(), BuyingError> {
        let seller = self.sellers.get(id).ok_or_else(|| unknown(id))?;
        if !seller.is_invited() {
            return Err(BuyingError::NotInvited(describe(id)));
        }
        self.process_message(
            id,
            Message::JoiningContract {
                contract_key: payee.contract_key,
                final_key_hash: payee.final_key_hash,
            },
        )
    }

    pub fn seller_has_interrupted_contract(&mut self, id: &Id) -> Result<(), BuyingError> {
        if !self.sellers.contains(id) {
            return Err(unknown(id));
        }
        tracing::warn!(connection = ?id, "seller interrupted contract");
        self.remove_connection(id, DisconnectCause::SellerInterruptedContract);
        Ok(())
    }

    pub fn received_full_piece(&mut self, id: &Id, data: Vec<u8>) -> Result<(), BuyingError> {
        self.process_message(id, Message::FullPiece { data })
    }

    /// The host verified the piece delivered (or still requested) on `id`.
    /// A seller whose copy has not arrived yet is paid now and drains the late delivery.
    pub fn valid_piece_received_on_connection(
        &mut self,
        id: &Id,
        index: u32,
    ) -> Result<(), BuyingError> {
        let seller = self.sellers.get_mut(id).ok_or_else(|| unknown(id))?;
        if seller.assigned_piece() != Some(index) {
            return Err(BuyingError::PieceNotAssigned {
                connection: describe(id),
                index,
            });
        }
        self.pieces.mark_downloaded(index)?;
        if !seller.piece_validated(self.tick_count) {
            self.pay_for_piece(id);
        }
        tracing::debug!(connection = ?id, piece = index, missing = self.pieces.missing_count(), "valid piece");
        (self.callbacks.full_piece_arrived)(id, index);
        self.check_completion();
        self.try_to_assign_and_request_piece(id);
        Ok(())
    }

    /// The host rejected the piece delivered on `id`; the seller is dropped.
    pub fn invalid_piece_received_on_connection(
        &mut self,
        id: &Id,
        index: u32,
    ) -> Result<(), BuyingError> {
        if self.state == BuyingState::NotStarted {
            return Err(BuyingError::InvalidState {
                operation: "invalid_piece_received_on_connection",
                state: self.state,
            });
        }
        let seller = self.sellers.get(id).ok_or_else(|| unknown(id))?;
        if seller.assigned_piece() != Some(index) {
            return Err(BuyingError::PieceNotAssigned {
                connection: describe(id),
                index,
            });
        }
        tracing::warn!(connection = ?id, piece = index, "invalid piece received");
        self.remove_connection(id, DisconnectCause::InvalidPieceReceived);
        Ok(())
    }

    /// Mark a piece downloaded by other means. A seller holding it is released without penalty.
    pub fn piece_downloaded(&mut self, index: u32) -> Result<(), BuyingError> {
        match self.pieces.mark_downloaded(index)? {
            PieceState::Downloaded => {
                tracing::debug!(piece = index, "piece already downloaded");
                return Ok(());
            }
            PieceState::Missing => {}
            PieceState::Assigned(holder) => self.release_holder(&holder),
        }
        tracing::debug!(piece = index, missing = self.pieces.missing_count(), "piece downloaded elsewhere");
        self.check_completion();
        Ok(())
    }

    /// Offer the next piece to `id` and send the request. `false` if the engine is not operating,
    /// the seller cannot take work, or nothing is left to assign.
    pub fn try_to_assign_and_request_piece(&mut self, id: &Id) -> bool {
        if self.state != BuyingState::Operating {
            return false;
        }
        let now = self.tick_count;
        let Some(seller) = self.sellers.get_mut(id) else {
            return false;
        };
        if !seller.can_take_piece() {
            return false;
        }
        let Some(candidate) =
            policy::next_piece(&self.pieces, id, self.pick_next_piece.as_deref())
        else {
            tracing::debug!(connection = ?id, "no piece to assign");
            return false;
        };
        let index = candidate.index();
        if let Err(err) = self.pieces.assign(index, id.clone()) {
            tracing::error!(connection = ?id, piece = index, error = %err, "assignment failed");
            return false;
        }
        if let Err(err) = seller.request_piece(index, now) {
            tracing::error!(connection = ?id, piece = index, error = %err, "piece request failed");
            if let Err(err) = self.pieces.deassign(index) {
                tracing::error!(piece = index, error = %err, "could not return piece");
            }
            return false;
        }
        tracing::debug!(connection = ?id, piece = index, ?candidate, "piece requested");
        true
    }

    /// Invite the listed sellers to `contract`. Every listed id must have announced terms we accept.
    pub fn start_downloading(
        &mut self,
        contract: Contract,
        start_info: &BTreeMap<Id, StartDownloadInfo>,
    ) -> Result<(), BuyingError> {
        if !matches!(
            self.state,
            BuyingState::NotStarted | BuyingState::SendingInvitations
        ) {
            return Err(BuyingError::InvalidState {
                operation: "start_downloading",
                state: self.state,
            });
        }
        let mut prices = Vec::with_capacity(start_info.len());
        for id in start_info.keys() {
            let seller = self.sellers.get(id).ok_or_else(|| unknown(id))?;
            let terms = seller
                .terms()
                .filter(|terms| self.terms.satisfied_by(terms))
                .ok_or_else(|| BuyingError::IncompatibleTerms(describe(id)))?;
            if !seller.connection().can_invite() {
                return Err(BuyingError::NotInvitable(describe(id)));
            }
            prices.push(terms.min_price);
        }

        let contract_id = contract.id();
        let stale = self
            .sellers
            .ids_where(|s| s.is_invited() && !start_info.contains_key(s.id()));
        for id in stale {
            let Some(seller) = self.sellers.get_mut(&id) else {
                continue;
            };
            if seller.has_joined() {
                // Settle what it delivered under the old contract, then let its piece go.
                self.compensate_seller(&id);
                tracing::info!(connection = ?id, "seller left out of new contract");
                self.remove_connection(&id, DisconnectCause::PolicyEviction);
            } else {
                seller.revoke_invitation();
            }
        }
        self.contract = Some(contract);
        self.enter_sending_invitations();
        for ((id, info), price) in start_info.iter().zip(prices) {
            if let Some(seller) = self.sellers.get_mut(id) {
                if let Err(err) = seller.invite(contract_id, *info, price) {
                    tracing::warn!(connection = ?id, error = %err, "could not send invitation");
                }
            }
        }
        tracing::info!(contract = %contract_id, sellers = start_info.len(), "invitations sent");
        self.start_if_contract_ready();
        Ok(())
    }

    pub fn start(&mut self) -> Result<(), BuyingError> {
        match self.state {
            BuyingState::NotStarted | BuyingState::Paused => {
                if self.contract_is_ready() {
                    self.start_operating();
                } else {
                    self.enter_sending_invitations();
                }
                Ok(())
            }
            state => Err(BuyingError::InvalidState {
                operation: "start",
                state,
            }),
        }
    }

    pub fn pause(&mut self) -> Result<(), BuyingError> {
        if self.state != BuyingState::Operating {
            return Err(BuyingError::InvalidState {
                operation: "pause",
                state: self.state,
            });
        }
        self.state = BuyingState::Paused;
        tracing::info!("buying paused");
        Ok(())
    }

    /// Pay for delivered pieces still under validation, drop every connection and discard the contract.
    pub fn stop(&mut self) {
        self.polite_seller_compensation(0);
        for id in self.sellers.ids() {
            self.remove_connection(&id, DisconnectCause::SessionStopped);
        }
        self.contract = None;
        self.state = BuyingState::NotStarted;
        tracing::info!("buying stopped");
    }

    /// The session is switching to another mode.
    pub fn leaving_state(&mut self) {
        tracing::info!(state = ?self.state, "leaving buying mode");
        self.stop();
    }

    /// Advance engine time by one tick and run the periodic work for the current state.
    pub fn tick(&mut self) {
        self.tick_count = self.tick_count.saturating_add(1);
        match self.state {
            BuyingState::SendingInvitations => {
                if self.contract_is_ready() {
                    self.start_operating();
                } else if self
                    .tick_count
                    .saturating_sub(self.last_start_of_sending_invitations)
                    > self.config.invitation_timeout_ticks
                {
                    self.resend_stalled_invitations();
                }
            }
            BuyingState::Operating | BuyingState::Paused => {
                self.polite_seller_compensation(self.config.validation_grace_ticks);
                self.evict_unresponsive_sellers();
            }
            BuyingState::NotStarted => {}
        }
        if self.state == BuyingState::Operating {
            self.evict_exhausted_sellers();
            for id in self.sellers.ids() {
                self.try_to_assign_and_request_piece(&id);
            }
        }
    }

    fn dispatch(&mut self, id: &Id, event: ConnectionEvent) {
        match event {
            ConnectionEvent::PeerAnnouncedMode(announced) => self.on_peer_announced(id, announced),
            ConnectionEvent::SellerJoined(payee) => self.on_seller_joined(id, payee),
            ConnectionEvent::SellerInterruptedContract => {
                tracing::warn!(connection = ?id, "seller re-announced during contract");
                self.remove_connection(id, DisconnectCause::SellerInterruptedContract);
            }
            ConnectionEvent::ReceivedFullPiece { data, .. } => self.on_received_full_piece(id, data),
        }
    }

    fn on_peer_announced(&mut self, id: &Id, announced: AnnouncedModeAndTerms) {
        match announced {
            AnnouncedModeAndTerms::Sell(terms) if self.terms.satisfied_by(&terms) => {
                tracing::debug!(connection = ?id, ?terms, "seller terms acceptable")
            }
            AnnouncedModeAndTerms::Sell(terms) => {
                tracing::debug!(connection = ?id, ?terms, "seller terms not acceptable")
            }
            other => tracing::debug!(connection = ?id, mode = ?other, "peer is not selling"),
        }
    }

    fn on_seller_joined(&mut self, id: &Id, payee: Payee) {
        let Some(seller) = self.sellers.get_mut(id) else {
            return;
        };
        if !seller.joined(payee) {
            tracing::debug!(connection = ?id, "join ignored; seller not invited to current contract");
            return;
        }
        tracing::info!(connection = ?id, joined = self.sellers.joined_count(), "seller joined contract");
        match self.state {
            BuyingState::SendingInvitations => self.start_if_contract_ready(),
            BuyingState::Operating => {
                self.try_to_assign_and_request_piece(id);
            }
            BuyingState::NotStarted | BuyingState::Paused => {}
        }
    }

    fn on_received_full_piece(&mut self, id: &Id, data: Vec<u8>) {
        let now = self.tick_count;
        let Some(seller) = self.sellers.get_mut(id) else {
            return;
        };
        match seller.request_state() {
            RequestState::Requested { .. } => {
                if let Some(index) = seller.piece_arrived(now) {
                    tracing::debug!(connection = ?id, piece = index, bytes = data.len(), "piece delivered");
                    (self.callbacks.piece_data)(id, index, &data);
                }
            }
            RequestState::Draining { index, .. } => {
                tracing::debug!(connection = ?id, piece = index, "dropping piece completed elsewhere");
                if seller.drained() == Some(false) {
                    self.pay_for_piece(id);
                }
                self.try_to_assign_and_request_piece(id);
            }
            RequestState::Idle | RequestState::AwaitingValidation { .. } => {
                tracing::warn!(connection = ?id, "piece delivered without a request");
                self.remove_connection(id, DisconnectCause::ProtocolViolation);
            }
        }
    }

    fn release_holder(&mut self, holder: &Id) {
        let now = self.tick_count;
        let Some(seller) = self.sellers.get_mut(holder) else {
            tracing::error!(connection = ?holder, "piece held by unknown connection");
            return;
        };
        match seller.piece_completed_elsewhere(now) {
            Some(compensated) => {
                // Delivered but not yet validated: the seller still gets paid.
                if !compensated {
                    self.pay_for_piece(holder);
                }
                self.try_to_assign_and_request_piece(holder);
            }
            None => tracing::debug!(connection = ?holder, "seller draining"),
        }
    }

    fn pay_for_piece(&mut self, id: &Id) {
        let Some(seller) = self.sellers.get_mut(id) else {
            return;
        };
        match seller.pay() {
            Ok(update) => {
                tracing::debug!(connection = ?id, payment = update.number, amount = update.amount_paid, "payment sent");
                (self.callbacks.sent_payment)(id, &update);
            }
            Err(err) => {
                tracing::warn!(connection = ?id, error = %err, "could not pay for piece")
            }
        }
    }

    fn contract_is_ready(&self) -> bool {
        let needed = self.terms.min_number_of_sellers.max(1) as usize;
        self.contract.is_some() && self.sellers.joined_count() >= needed
    }

    fn start_if_contract_ready(&mut self) {
        if self.state == BuyingState::SendingInvitations && self.contract_is_ready() {
            self.start_operating();
        }
    }

    fn enter_sending_invitations(&mut self) {
        self.state = BuyingState::SendingInvitations;
        self.last_start_of_sending_invitations = self.tick_count;
        tracing::info!(tick = self.tick_count, "sending invitations");
    }

    fn start_operating(&mut self) {
        self.state = BuyingState::Operating;
        tracing::info!(joined = self.sellers.joined_count(), "buying operating");
        for id in self.sellers.ids() {
            self.try_to_assign_and_request_piece(&id);
        }
    }

    fn resend_stalled_invitations(&mut self) {
        let max_attempts = self.config.max_invitation_attempts;
        let stalled = self
            .sellers
            .ids_where(|s| s.is_invited() && !s.has_joined());
        tracing::debug!(sellers = stalled.len(), "invitation phase stalled");
        for id in stalled {
            let Some(seller) = self.sellers.get_mut(&id) else {
                continue;
            };
            if seller.invitation_attempts() >= max_attempts {
                tracing::warn!(connection = ?id, attempts = max_attempts, "seller never joined");
                self.remove_connection(&id, DisconnectCause::Unresponsive);
            } else if let Err(err) = seller.reinvite() {
                tracing::warn!(connection = ?id, error = %err, "could not resend invitation");
            }
        }
        self.last_start_of_sending_invitations = self.tick_count;
    }

    /// Pay sellers whose delivered piece has waited at least `grace` ticks for validation.
    fn polite_seller_compensation(&mut self, grace: u64) {
        let now = self.tick_count;
        let due = self.sellers.ids_where(|s| {
            matches!(
                s.request_state(),
                RequestState::AwaitingValidation { since, compensated: false, .. }
                    if now.saturating_sub(since) >= grace
            )
        });
        for id in due {
            self.compensate_seller(&id);
        }
    }

    /// Pay for a delivered piece still under validation, unless already paid.
    fn compensate_seller(&mut self, id: &Id) {
        let Some(seller) = self.sellers.get_mut(id) else {
            return;
        };
        match seller.compensate() {
            Ok(Some(update)) => {
                tracing::debug!(connection = ?id, payment = update.number, "paid ahead of validation");
                (self.callbacks.sent_payment)(id, &update);
            }
            Ok(None) => {}
            Err(err) => {
                tracing::warn!(connection = ?id, error = %err, "could not compensate seller")
            }
        }
    }

    fn evict_unresponsive_sellers(&mut self) {
        let now = self.tick_count;
        let timeout = self.config.request_timeout_ticks;
        let overdue = self.sellers.ids_where(|s| match s.request_state() {
            RequestState::Requested { since, .. } | RequestState::Draining { since, .. } => {
                now.saturating_sub(since) > timeout
            }
            RequestState::Idle | RequestState::AwaitingValidation { .. } => false,
        });
        for id in overdue {
            tracing::warn!(connection = ?id, timeout, "piece request timed out");
            self.remove_connection(&id, DisconnectCause::Unresponsive);
        }
    }

    fn evict_exhausted_sellers(&mut self) {
        if self.pieces.is_complete() {
            return;
        }
        let exhausted = self.sellers.ids_where(|s| {
            s.has_joined()
                && s.request_state() == RequestState::Idle
                && s.payor().is_some_and(|p| !p.can_pay())
        });
        for id in exhausted {
            tracing::info!(connection = ?id, "payment channel exhausted");
            self.remove_connection(&id, DisconnectCause::PolicyEviction);
        }
    }

    fn check_completion(&mut self) {
        if self.completion_signaled || !self.pieces.is_complete() {
            return;
        }
        self.completion_signaled = true;
        tracing::info!(pieces = self.pieces.len(), "download completed");
        (self.callbacks.download_completed)();
    }
}

fn describe<Id: Debug>(id: &Id) -> String {
    format!("{id:?}")
}

fn unknown<Id: Debug>(id: &Id) -> BuyingError {
    BuyingError::UnknownConnection(describe(id))
}

/// Host calls that break the engine's preconditions. The failing call changes nothing.
#[derive(Debug, thiserror::Error)]
pub enum BuyingError {
    #[error("connection already registered ({connections} connections)")]
    DuplicateConnection { connections: usize },
    #[error("unknown connection {0}")]
    UnknownConnection(String),
    #[error("{operation} not allowed in state {state:?}")]
    InvalidState {
        operation: &'static str,
        state: BuyingState,
    },
    #[error("piece {index} is not assigned to connection {connection}")]
    PieceNotAssigned { connection: String, index: u32 },
    #[error("piece {index} out of range ({pieces} pieces)")]
    PieceOutOfRange { index: u32, pieces: u32 },
    #[error("connection {0} was not invited to the contract")]
    NotInvited(String),
    #[error("connection {0} cannot be invited in its current state")]
    NotInvitable(String),
    #[error("connection {0} has not announced acceptable seller terms")]
    IncompatibleTerms(String),
    #[error(transparent)]
    Ledger(LedgerError),
    #[error(transparent)]
    Connection(#[from] ConnectionError),
}

impl From<LedgerError> for BuyingError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::OutOfRange { index, pieces } => {
                BuyingError::PieceOutOfRange { index, pieces }
            }
            other => BuyingError::Ledger(other),
        }
    }
}
