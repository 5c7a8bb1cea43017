//! Piece ledger: per-piece assignment state, the deassigned queue and the streaming lower bound.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// Host-supplied description of one piece: its size and whether it is already held.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PieceInformation {
    pub size: u64,
    pub downloaded: bool,
}

/// Where a piece stands. A piece never leaves `Downloaded`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum PieceState<Id> {
    Missing,
    Assigned(Id),
    Downloaded,
}

#[derive(Debug, Clone)]
struct Piece<Id> {
    size: u64,
    state: PieceState<Id>,
}

/// Totals over all pieces; always sums to the piece count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct PieceCounts {
    pub missing: u32,
    pub assigned: u32,
    pub downloaded: u32,
}

/// Assignment and possession bookkeeping for the full piece set.
#[derive(Debug, Clone)]
pub struct PieceLedger<Id> {
    pieces: Vec<Piece<Id>>,
    /// Pieces not yet downloaded, assigned or not.
    not_downloaded: u32,
    /// Pieces that lost their seller, oldest first. Every entry is `Missing`.
    deassigned: VecDeque<u32>,
    /// Below this index nothing is assigned while a `Missing` piece exists at or above it.
    assignment_lower_bound: u32,
}

impl<Id: Clone + PartialEq> PieceLedger<Id> {
    pub fn new(pieces: &[PieceInformation]) -> Self {
        let pieces: Vec<Piece<Id>> = pieces
            .iter()
            .map(|info| Piece {
                size: info.size,
                state: if info.downloaded {
                    PieceState::Downloaded
                } else {
                    PieceState::Missing
                },
            })
            .collect();
        let not_downloaded = pieces
            .iter()
            .filter(|p| p.state != PieceState::Downloaded)
            .count() as u32;
        Self {
            pieces,
            not_downloaded,
            deassigned: VecDeque::new(),
            assignment_lower_bound: 0,
        }
    }

    pub fn len(&self) -> u32 {
        self.pieces.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.pieces.is_empty()
    }

    pub fn state(&self, index: u32) -> Option<&PieceState<Id>> {
        self.pieces.get(index as usize).map(|p| &p.state)
    }

    /// Size of the largest piece; no delivery may be longer.
    pub fn max_piece_size(&self) -> u64 {
        self.pieces.iter().map(|p| p.size).max().unwrap_or(0)
    }

    /// Pieces not in `Downloaded`. Zero means the content is complete.
    pub fn missing_count(&self) -> u32 {
        self.not_downloaded
    }

    pub fn is_complete(&self) -> bool {
        self.not_downloaded == 0
    }

    pub fn counts(&self) -> PieceCounts {
        let mut counts = PieceCounts::default();
        for piece in &self.pieces {
            match piece.state {
                PieceState::Missing => counts.missing += 1,
                PieceState::Assigned(_) => counts.assigned += 1,
                PieceState::Downloaded => counts.downloaded += 1,
            }
        }
        counts
    }

    pub fn assignment_lower_bound(&self) -> u32 {
        self.assignment_lower_bound
    }

    /// Explicit reset of the streaming position, e.g. after a seek.
    pub fn set_assignment_lower_bound(&mut self, index: u32) -> Result<(), LedgerError> {
        self.check_range(index)?;
        self.assignment_lower_bound = index;
        Ok(())
    }

    /// Deassigned pieces in the order they will be handed out again.
    pub fn deassigned(&self) -> impl Iterator<Item = u32> + '_ {
        self.deassigned.iter().copied()
    }

    /// Lowest `Missing` index at or above `from`.
    pub fn first_missing_from(&self, from: u32) -> Option<u32> {
        self.pieces
            .iter()
            .enumerate()
            .skip(from as usize)
            .find(|(_, p)| p.state == PieceState::Missing)
            .map(|(i, _)| i as u32)
    }

    /// `Missing`, and not held back by the lower bound.
    pub fn is_eligible(&self, index: u32) -> bool {
        if self.state(index) != Some(&PieceState::Missing) {
            return false;
        }
        index >= self.assignment_lower_bound
            || self.first_missing_from(self.assignment_lower_bound).is_none()
    }

    /// Built-in pick: lowest missing index at or above the lower bound, else lowest missing overall.
    pub fn lowest_eligible(&self) -> Option<u32> {
        self.first_missing_from(self.assignment_lower_bound)
            .or_else(|| self.first_missing_from(0))
    }

    /// `Missing -> Assigned(holder)`. Takes the piece off the deassigned queue if it was there.
    pub fn assign(&mut self, index: u32, holder: Id) -> Result<(), LedgerError> {
        let piece = self.piece_mut(index)?;
        if piece.state != PieceState::Missing {
            return Err(LedgerError::NotMissing { index });
        }
        piece.state = PieceState::Assigned(holder);
        self.deassigned.retain(|&i| i != index);
        Ok(())
    }

    /// `Assigned -> Missing`; the index joins the back of the deassigned queue. Returns the former holder.
    pub fn deassign(&mut self, index: u32) -> Result<Id, LedgerError> {
        let piece = self.piece_mut(index)?;
        let holder = match std::mem::replace(&mut piece.state, PieceState::Missing) {
            PieceState::Assigned(holder) => holder,
            other => {
                piece.state = other;
                return Err(LedgerError::NotAssigned { index });
            }
        };
        self.deassigned.push_back(index);
        Ok(holder)
    }

    /// Any state `-> Downloaded`. Returns the previous state; the missing count only drops on a real transition.
    pub fn mark_downloaded(&mut self, index: u32) -> Result<PieceState<Id>, LedgerError> {
        let piece = self.piece_mut(index)?;
        let previous = std::mem::replace(&mut piece.state, PieceState::Downloaded);
        if previous != PieceState::Downloaded {
            self.not_downloaded -= 1;
            self.deassigned.retain(|&i| i != index);
        }
        Ok(previous)
    }

    fn check_range(&self, index: u32) -> Result<(), LedgerError> {
        if (index as usize) < self.pieces.len() {
            Ok(())
        } else {
            Err(LedgerError::OutOfRange {
                index,
                pieces: self.len(),
            })
        }
    }

    fn piece_mut(&mut self, index: u32) -> Result<&mut Piece<Id>, LedgerError> {
        self.check_range(index)?;
        Ok(&mut self.pieces[index as usize])
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("piece {index} out of range ({pieces} pieces)")]
    OutOfRange { index: u32, pieces: u32 },
    #[error("piece {index} is not missing")]
    NotMissing { index: u32 },
    #[error("piece {index} is not assigned")]
    NotAssigned { index: u32 },
}
