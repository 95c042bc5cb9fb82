/// Identifier of a particle within one molecule.
///
/// Identifiers are unique per molecule and increase monotonically as particles are
/// appended; they are not required to be contiguous once particles are removed.
pub type NodeId = usize;
