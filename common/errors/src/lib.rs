// Copyright 2026 Stitch Authors.
// This file is part of Stitch.

// Stitch is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// Stitch is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.

// You should have received a copy of the GNU General Public License
// along with Stitch.  If not, see <http://www.gnu.org/licenses/>.

#[macro_use]
extern crate enum_display_derive;

use failure::{err_msg, Backtrace, Context, Fail};
use std::fmt::{self, Debug, Display};

/// Coarse classification of engine failures.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Display)]
pub enum ErrorKind {
    Decoding,
    Consistency,
    Boundary,
    Traversal,
    Store,
}

#[derive(Debug)]
pub struct Error {
    kind: Context<ErrorKind>,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if let Some(cause) = self.cause() {
            if f.alternate() {
                write!(f, "{}: {}", self.kind(), cause)
            } else {
                write!(f, "{}({})", self.kind(), cause)
            }
        } else {
            write!(f, "{}", self.kind())
        }
    }
}

impl From<Context<ErrorKind>> for Error {
    fn from(inner: Context<ErrorKind>) -> Self {
        Self { kind: inner }
    }
}

impl Fail for Error {
    fn cause(&self) -> Option<&dyn Fail> {
        self.kind.cause()
    }

    fn backtrace(&self) -> Option<&Backtrace> {
        self.kind.backtrace()
    }
}

impl Error {
    pub fn kind(&self) -> &ErrorKind {
        self.kind.get_context()
    }

    pub fn downcast_ref<T: Fail>(&self) -> Option<&T> {
        self.cause().and_then(|cause| cause.downcast_ref::<T>())
    }
}

//////////////////////////////////////////////////////////////////

/// The single detailed taxonomy of the trie ingestion engine. Every
/// fallible core operation reports one of these codes.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Display)]
pub enum TrieErrorKind {
    // input decoding
    RlpEncoding,
    RlpBlobExpected,
    RlpBranchLinkExpected,
    RlpNonEmptyBlobExpected,
    RlpEmptyBlobExpected,
    RlpExtPathEncoding,
    Rlp2Or17ListEntries,
    ExpectedNodeKeyDiffers,
    // trie consistency
    RootNodeMissing,
    RootNodeMismatch,
    DifferentNodeValueExists,
    InternalDbInconsistency,
    AccountRepairBlocked,
    AccountNotFound,
    // boundary and ordering
    AccountsNotSrictlyIncreasing,
    AccountSmallerThanBase,
    SlotsNotSrictlyIncreasing,
    AccountRangesOverlap,
    LowerBoundAfterFirstEntry,
    LowerBoundProofError,
    RightBoundaryProofFailed,
    // traversal
    TrieLoopAlert,
    TrieIsEmpty,
    GarbledNextLeaf,
    LeafMaxExceeded,
    NodeNotFound,
    // persistence
    UnresolvedRepairNode,
    NoRocksDbBackend,
    CannotOpenRocksDbBulkSession,
    AddBulkItemFailed,
    CommitBulkItemsFailed,
    OSErrorException,
    StateRootNotFound,
}

impl TrieErrorKind {
    /// Category the detailed code belongs to.
    pub fn class(self) -> ErrorKind {
        use TrieErrorKind::*;
        match self {
            RlpEncoding | RlpBlobExpected | RlpBranchLinkExpected | RlpNonEmptyBlobExpected
            | RlpEmptyBlobExpected | RlpExtPathEncoding | Rlp2Or17ListEntries
            | ExpectedNodeKeyDiffers => ErrorKind::Decoding,
            RootNodeMissing | RootNodeMismatch | DifferentNodeValueExists
            | InternalDbInconsistency | AccountRepairBlocked | AccountNotFound => {
                ErrorKind::Consistency
            }
            AccountsNotSrictlyIncreasing | AccountSmallerThanBase | SlotsNotSrictlyIncreasing
            | AccountRangesOverlap | LowerBoundAfterFirstEntry | LowerBoundProofError
            | RightBoundaryProofFailed => ErrorKind::Boundary,
            TrieLoopAlert | TrieIsEmpty | GarbledNextLeaf | LeafMaxExceeded | NodeNotFound => {
                ErrorKind::Traversal
            }
            UnresolvedRepairNode | NoRocksDbBackend | CannotOpenRocksDbBulkSession
            | AddBulkItemFailed | CommitBulkItemsFailed | OSErrorException
            | StateRootNotFound => ErrorKind::Store,
        }
    }

    pub fn cause<F: Fail>(self, cause: F) -> TrieError {
        TrieError {
            kind: cause.context(self),
        }
    }

    pub fn reason<S: Display + Debug + Sync + Send + 'static>(self, reason: S) -> TrieError {
        TrieError {
            kind: err_msg(reason).compat().context(self),
        }
    }
}

#[derive(Debug)]
pub struct TrieError {
    kind: Context<TrieErrorKind>,
}

impl fmt::Display for TrieError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if let Some(cause) = self.cause() {
            write!(f, "{}({})", self.kind(), cause)
        } else {
            write!(f, "{}", self.kind())
        }
    }
}

impl TrieError {
    pub fn kind(&self) -> &TrieErrorKind {
        self.kind.get_context()
    }
}

impl Fail for TrieError {
    fn cause(&self) -> Option<&dyn Fail> {
        self.kind.cause()
    }

    fn backtrace(&self) -> Option<&Backtrace> {
        self.kind.backtrace()
    }
}

impl From<TrieErrorKind> for TrieError {
    fn from(kind: TrieErrorKind) -> Self {
        TrieError {
            kind: Context::new(kind),
        }
    }
}

impl From<TrieError> for Error {
    fn from(error: TrieError) -> Self {
        let class = error.kind().class();
        error.context(class).into()
    }
}

impl From<TrieErrorKind> for Error {
    fn from(kind: TrieErrorKind) -> Self {
        Into::<TrieError>::into(kind).into()
    }
}
