//! Swarm protocol vocabulary: announced modes, terms, and the messages a buyer exchanges with sellers.

use serde::{Deserialize, Serialize};

use crate::payment::ContractId;

/// Terms under which we buy pieces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuyerTerms {
    /// Highest price per piece we pay.
    pub max_price: u64,
    /// Longest refund lock (in blocks) we accept on our contract outputs.
    pub max_lock: u32,
    /// Number of sellers that must join before any piece is requested.
    pub min_number_of_sellers: u32,
    /// Highest fee per kB we pay for the contract transaction.
    pub max_contract_fee_per_kb: u64,
}

impl BuyerTerms {
    /// Whether a seller announcing `seller` terms can take part in our contract.
    pub fn satisfied_by(&self, seller: &SellerTerms) -> bool {
        seller.min_price <= self.max_price
            && seller.min_lock <= self.max_lock
            && seller.max_sellers >= self.min_number_of_sellers
            && seller.min_contract_fee_per_kb <= self.max_contract_fee_per_kb
    }
}

/// Terms a seller announces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SellerTerms {
    pub min_price: u64,
    pub min_lock: u32,
    pub max_sellers: u32,
    pub min_contract_fee_per_kb: u64,
    pub settlement_fee: u64,
}

/// What a peer last announced about itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AnnouncedModeAndTerms {
    #[default]
    None,
    Observe,
    Buy(BuyerTerms),
    Sell(SellerTerms),
}

impl AnnouncedModeAndTerms {
    pub fn seller_terms(&self) -> Option<&SellerTerms> {
        match self {
            AnnouncedModeAndTerms::Sell(terms) => Some(terms),
            _ => None,
        }
    }

    /// The message a peer sends to make this announcement.
    pub fn to_message(self) -> Option<Message> {
        match self {
            AnnouncedModeAndTerms::None => None,
            AnnouncedModeAndTerms::Observe => Some(Message::Observe),
            AnnouncedModeAndTerms::Buy(terms) => Some(Message::Buy { terms }),
            AnnouncedModeAndTerms::Sell(terms) => Some(Message::Sell { terms }),
        }
    }
}

/// All protocol messages between a buyer and its peers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Message {
    /// Mode announcements.
    Observe,
    Buy {
        terms: BuyerTerms,
    },
    Sell {
        terms: SellerTerms,
    },
    /// Buyer to seller: contract parameters for the seller's output; doubles as the invitation.
    Ready {
        contract_id: ContractId,
        value: u64,
        output_index: u32,
        contract_key: [u8; 32],
        final_key_hash: [u8; 20],
    },
    /// Seller to buyer: accepts the invitation and supplies its payee keys.
    JoiningContract {
        contract_key: [u8; 32],
        final_key_hash: [u8; 20],
    },
    RequestFullPiece {
        index: u32,
    },
    FullPiece {
        data: Vec<u8>,
    },
    /// Buyer to seller: payment-channel update after a delivered piece.
    Payment {
        number: u64,
        amount_paid: u64,
    },
}

impl Message {
    /// Short name used in logs and protocol errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Message::Observe => "observe",
            Message::Buy { .. } => "buy",
            Message::Sell { .. } => "sell",
            Message::Ready { .. } => "ready",
            Message::JoiningContract { .. } => "joining_contract",
            Message::RequestFullPiece { .. } => "request_full_piece",
            Message::FullPiece { .. } => "full_piece",
            Message::Payment { .. } => "payment",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buyer_terms() -> BuyerTerms {
        BuyerTerms {
            max_price: 10,
            max_lock: 5,
            min_number_of_sellers: 2,
            max_contract_fee_per_kb: 100,
        }
    }

    fn seller_terms() -> SellerTerms {
        SellerTerms {
            min_price: 10,
            min_lock: 5,
            max_sellers: 2,
            min_contract_fee_per_kb: 100,
            settlement_fee: 7,
        }
    }

    #[test]
    fn terms_at_the_limits_are_compatible() {
        assert!(buyer_terms().satisfied_by(&seller_terms()));
    }

    #[test]
    fn each_limit_is_enforced() {
        let buyer = buyer_terms();
        let pricey = SellerTerms {
            min_price: 11,
            ..seller_terms()
        };
        let long_lock = SellerTerms {
            min_lock: 6,
            ..seller_terms()
        };
        let too_few_sellers = SellerTerms {
            max_sellers: 1,
            ..seller_terms()
        };
        let fee = SellerTerms {
            min_contract_fee_per_kb: 101,
            ..seller_terms()
        };
        assert!(!buyer.satisfied_by(&pricey));
        assert!(!buyer.satisfied_by(&long_lock));
        assert!(!buyer.satisfied_by(&too_few_sellers));
        assert!(!buyer.satisfied_by(&fee));
    }

    #[test]
    fn announcement_maps_to_message() {
        assert_eq!(AnnouncedModeAndTerms::None.to_message(), None);
        assert_eq!(
            AnnouncedModeAndTerms::Sell(seller_terms()).to_message(),
            Some(Message::Sell {
                terms: seller_terms()
            })
        );
        assert_eq!(
            AnnouncedModeAndTerms::Sell(seller_terms()).seller_terms(),
            Some(&seller_terms())
        );
        assert_eq!(AnnouncedModeAndTerms::Observe.seller_terms(), None);
    }
}
