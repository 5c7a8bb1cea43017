//! Piece assignment policy: which piece, if any, a seller is offered next.

use crate::ledger::PieceLedger;

/// Installable piece selection (e.g. rarest-first). Replaces the lowest-index pick for fresh pieces;
/// deassigned pieces are still handed out first.
///
/// Closures `Fn(&PieceLedger<Id>, &Id) -> Option<u32>` implement this directly.
pub trait PickNextPiece<Id> {
    /// Piece to offer `seller`, or `None` to leave the seller idle.
    fn pick(&self, ledger: &PieceLedger<Id>, seller: &Id) -> Option<u32>;
}

impl<Id, F> PickNextPiece<Id> for F
where
    F: Fn(&PieceLedger<Id>, &Id) -> Option<u32>,
{
    fn pick(&self, ledger: &PieceLedger<Id>, seller: &Id) -> Option<u32> {
        self(ledger, seller)
    }
}

/// Where the chosen piece came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Candidate {
    /// Lost its previous seller.
    Deassigned(u32),
    /// Never assigned before (or only to sellers that delivered nothing).
    Fresh(u32),
}

impl Candidate {
    pub fn index(self) -> u32 {
        match self {
            Candidate::Deassigned(index) | Candidate::Fresh(index) => index,
        }
    }
}

/// Decide the next piece for `seller`:
/// 1. the oldest deassigned piece allowed by the lower bound;
/// 2. else the hook's choice when installed and eligible, falling back to the lowest eligible index.
///
/// Returns `None` when nothing can be assigned; the seller stays idle.
pub fn next_piece<Id: Clone + PartialEq>(
    ledger: &PieceLedger<Id>,
    seller: &Id,
    picker: Option<&dyn PickNextPiece<Id>>,
) -> Option<Candidate> {
    if let Some(index) = ledger.deassigned().find(|&i| ledger.is_eligible(i)) {
        return Some(Candidate::Deassigned(index));
    }
    if let Some(picker) = picker {
        let picked = picker.pick(ledger, seller)?;
        if ledger.is_eligible(picked) {
            return Some(Candidate::Fresh(picked));
        }
        tracing::warn!(
            piece = picked,
            "pick-next-piece hook chose an ineligible piece; using lowest index"
        );
    }
    ledger.lowest_eligible().map(Candidate::Fresh)
}
