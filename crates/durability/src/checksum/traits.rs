//! Checksum trait definitions.

use snapframe_core::ChecksumType;

/// Incremental hash accumulator.
///
/// Every byte that frames a snapshot passes through one of these: the
/// payload, the serialized header and, for v2, each block. Implementations
/// must be `Send` so a writer or validator can move between threads between
/// calls.
pub trait Checksum: Send {
    /// Feed bytes into the running checksum.
    fn update(&mut self, data: &[u8]);

    /// Finalized checksum of everything fed so far.
    ///
    /// Does not consume or reset the accumulator, so it can be called
    /// repeatedly while more data keeps arriving.
    fn sum(&self) -> Vec<u8>;

    /// Forget all data fed so far.
    fn reset(&mut self);

    /// Length in bytes of the value returned by [`Checksum::sum`].
    fn size(&self) -> usize;

    /// Algorithm identifier recorded in snapshot headers.
    fn checksum_type(&self) -> ChecksumType;
}
