//! Paying side of the payment channels: contract identity, per-seller start parameters, payor bookkeeping.
//! No signatures are produced here; a payment is the channel state the host turns into a signed update.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Identity of a contract: double SHA-256 of its raw bytes, as for a funding transaction id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContractId([u8; 32]);

impl ContractId {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for ContractId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.0 {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

/// The multi-party contract backing per-piece payments. Built and signed by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contract {
    raw: Vec<u8>,
}

impl Contract {
    pub fn new(raw: Vec<u8>) -> Self {
        Self { raw }
    }

    pub fn id(&self) -> ContractId {
        let first = Sha256::digest(&self.raw);
        ContractId(Sha256::digest(first).into())
    }
}

/// What one seller is told when invited: its contract output and our keys on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartDownloadInfo {
    /// Funds locked in the seller's output.
    pub value: u64,
    pub output_index: u32,
    pub buyer_contract_key: [u8; 32],
    pub buyer_final_key_hash: [u8; 20],
}

/// Seller's keys on its contract output, supplied when it joins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payee {
    pub contract_key: [u8; 32],
    pub final_key_hash: [u8; 20],
}

/// Channel state after a payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentUpdate {
    /// Payments made on this channel, this one included.
    pub number: u64,
    pub amount_paid: u64,
}

/// Our side of one seller's channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Payor {
    price: u64,
    funds: u64,
    payments_made: u64,
}

impl Payor {
    pub fn new(price: u64, funds: u64) -> Self {
        Self {
            price,
            funds,
            payments_made: 0,
        }
    }

    pub fn funds(&self) -> u64 {
        self.funds
    }

    pub fn payments_made(&self) -> u64 {
        self.payments_made
    }

    pub fn amount_paid(&self) -> u64 {
        self.price.saturating_mul(self.payments_made)
    }

    /// Whether the locked funds cover one more payment.
    pub fn can_pay(&self) -> bool {
        self.amount_paid()
            .checked_add(self.price)
            .is_some_and(|required| required <= self.funds)
    }

    pub fn make_payment(&mut self) -> Result<PaymentUpdate, PaymentError> {
        if !self.can_pay() {
            return Err(PaymentError::InsufficientFunds {
                funds: self.funds,
                required: self.amount_paid().saturating_add(self.price),
            });
        }
        self.payments_made += 1;
        Ok(PaymentUpdate {
            number: self.payments_made,
            amount_paid: self.amount_paid(),
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("insufficient channel funds: {funds} locked, {required} required")]
    InsufficientFunds { funds: u64, required: u64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contract_id_is_double_sha256() {
        let contract = Contract::new(b"contract".to_vec());
        let expected: [u8; 32] = Sha256::digest(Sha256::digest(b"contract")).into();
        assert_eq!(contract.id().as_bytes(), &expected);
        assert_eq!(contract.id(), Contract::new(b"contract".to_vec()).id());
        assert_ne!(contract.id(), Contract::new(b"other".to_vec()).id());
        assert_eq!(contract.id().to_string().len(), 64);
    }

    #[test]
    fn payments_accumulate() {
        let mut payor = Payor::new(3, 10);
        assert_eq!(
            payor.make_payment().unwrap(),
            PaymentUpdate {
                number: 1,
                amount_paid: 3
            }
        );
        payor.make_payment().unwrap();
        let third = payor.make_payment().unwrap();
        assert_eq!(third.number, 3);
        assert_eq!(third.amount_paid, 9);
        assert!(!payor.can_pay());
        assert!(matches!(
            payor.make_payment(),
            Err(PaymentError::InsufficientFunds {
                funds: 10,
                required: 12
            })
        ));
        assert_eq!(payor.payments_made(), 3);
    }

    #[test]
    fn free_pieces_never_exhaust() {
        let mut payor = Payor::new(0, 0);
        for _ in 0..5 {
            payor.make_payment().unwrap();
        }
        assert_eq!(payor.amount_paid(), 0);
    }
}
