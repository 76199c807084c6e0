// ABOUTME: Sealed trait pattern for the transport capability trait.
// ABOUTME: Only the local and remote backends in this crate implement Transport.

/// Sealed trait to prevent external implementations.
pub trait Sealed {}
