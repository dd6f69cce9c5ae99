//! Property tests for flag composition and masking

use meld_core::{FlagGroup, Flags};
use proptest::prelude::*;

fn any_flags() -> impl Strategy<Value = Flags> {
    any::<u64>().prop_map(Flags::from_bits_retain)
}

proptest! {
    #[test]
    fn downstream_never_carries_internal_bits(flags in any_flags()) {
        prop_assert_eq!(flags.downstream() & Flags::SDK_INTERNAL_MASK, 0);
    }

    #[test]
    fn with_info_only_changes_the_marker(flags in any_flags()) {
        let marked = flags | Flags::WITH_INFO;
        prop_assert!(marked.wants_info());
        prop_assert_eq!(marked.downstream(), flags.downstream());
    }

    #[test]
    fn downstream_keeps_every_other_bit(flags in any_flags()) {
        let expected = flags.bits() & !(1u64 << 62);
        prop_assert_eq!(flags.downstream(), expected);
    }

    #[test]
    fn composition_is_commutative_and_associative(
        a in any_flags(),
        b in any_flags(),
        c in any_flags(),
    ) {
        prop_assert_eq!(a | b, b | a);
        prop_assert_eq!((a | b) | c, a | (b | c));
    }

    #[test]
    fn masking_distributes_over_union(a in any_flags(), b in any_flags()) {
        prop_assert_eq!((a | b).downstream(), a.downstream() | b.downstream());
    }

    #[test]
    fn recipes_plus_info_mask_back_to_recipe(idx in 0usize..10) {
        let groups = [
            FlagGroup::EntityGet,
            FlagGroup::RecordGet,
            FlagGroup::Export,
            FlagGroup::WhyEntities,
            FlagGroup::WhyRecords,
            FlagGroup::HowEntity,
            FlagGroup::FindPath,
            FlagGroup::Search,
            FlagGroup::RecordModify,
            FlagGroup::Redo,
        ];
        let recipe = groups[idx].default_flags();
        prop_assert_eq!((recipe | Flags::WITH_INFO).downstream(), recipe.bits());
    }
}
