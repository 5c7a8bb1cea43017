//! Read-only snapshots of the buying engine, safe to take at any time.

use serde::Serialize;

use crate::buying::BuyingState;
use crate::connection::ConnectionState;
use crate::ledger::PieceState;
use crate::payment::ContractId;
use crate::protocol::{BuyerTerms, SellerTerms};
use crate::seller::{RequestState, Seller};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SellerStatus<Id> {
    pub id: Id,
    pub connection: ConnectionState,
    pub terms: Option<SellerTerms>,
    pub request: RequestState,
    pub invited: bool,
    pub joined: bool,
    pub payments_made: u64,
    pub amount_paid: u64,
    pub valid_pieces: u32,
}

impl<Id: Clone> SellerStatus<Id> {
    pub(crate) fn of(seller: &Seller<Id>) -> Self {
        Self {
            id: seller.id().clone(),
            connection: seller.connection().state(),
            terms: seller.terms(),
            request: seller.request_state(),
            invited: seller.is_invited(),
            joined: seller.has_joined(),
            payments_made: seller.payor().map_or(0, |p| p.payments_made()),
            amount_paid: seller.payor().map_or(0, |p| p.amount_paid()),
            valid_pieces: seller.valid_pieces(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuyingStatus<Id> {
    pub state: BuyingState,
    pub terms: BuyerTerms,
    pub tick: u64,
    pub contract: Option<ContractId>,
    pub assignment_lower_bound: u32,
    pub missing_pieces: u32,
    pub pieces: Vec<PieceState<Id>>,
    /// Deassigned pieces, next to be handed out first.
    pub deassigned: Vec<u32>,
    pub sellers: Vec<SellerStatus<Id>>,
}

impl<Id> BuyingStatus<Id> {
    pub fn seller(&self, id: &Id) -> Option<&SellerStatus<Id>>
    where
        Id: PartialEq,
    {
        self.sellers.iter().find(|s| &s.id == id)
    }
}
