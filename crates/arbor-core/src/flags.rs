use bitflags::bitflags;

bitflags! {
    /// Pending mutation kinds recorded on a work node.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Flags: u16 {
        const PLACEMENT = 1 << 1;
        const UPDATE = 1 << 2;
        const CHILD_DELETION = 1 << 3;
        const PASSIVE_EFFECT = 1 << 4;
        const REF = 1 << 5;
    }
}

impl Flags {
    /// Bits handled by the mutation pass.
    pub const MUTATION_MASK: Flags = Flags::PLACEMENT
        .union(Flags::UPDATE)
        .union(Flags::CHILD_DELETION)
        .union(Flags::REF);

    /// Bits that require a deferred-effect flush after commit.
    pub const PASSIVE_MASK: Flags = Flags::PASSIVE_EFFECT.union(Flags::CHILD_DELETION);

    /// Bits handled by the layout pass.
    pub const LAYOUT_MASK: Flags = Flags::REF;
}

bitflags! {
    /// Tag carried by an effect record.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct HookFlags: u8 {
        /// Setup must run at the next deferred-effect flush.
        const HAS_EFFECT = 1;
        const PASSIVE = 1 << 1;
    }
}
