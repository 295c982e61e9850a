bitflags::bitflags! {
    /// Bit flags carried by networks and layers.
    ///
    /// On a network, `ONEHOT` means raw inputs are class indices to expand and
    /// `RECURRENT` marks a network containing a recurrent or LSTM layer. On a
    /// layer, `ONEHOT` means the targets for that layer are class indices.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Flags: u32 {
        const RECURRENT = 1 << 0;
        const ONEHOT    = 1 << 1;
    }
}

impl Default for Flags {
    fn default() -> Self { Flags::empty() }
}
