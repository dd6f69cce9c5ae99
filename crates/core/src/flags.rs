//! Capability flags passed to native operations
//!
//! The native layer takes a single 64-bit integer describing which optional
//! data an operation should produce. [`Flags`] wraps that integer: named
//! bits compose with `|`, and [`FlagGroup`] provides the default recipe for
//! each operation family.
//!
//! Bit 62 ([`Flags::WITH_INFO`]) is an SDK-internal marker asking a
//! mutating call to also return its change-summary document. The native
//! layer does not understand it; [`Flags::downstream`] strips every bit in
//! [`Flags::SDK_INTERNAL_MASK`] before dispatch.
//!
//! No combination is rejected. Bits without a name are retained and inert.

use bitflags::bitflags;

bitflags! {
    /// Composable capability bits for native operations.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Flags: u64 {
        // ==================== Export ====================
        /// Export entities resolved from several records
        const EXPORT_INCLUDE_MULTI_RECORD_ENTITIES = 1 << 0;
        /// Export entities with possibly-same relations
        const EXPORT_INCLUDE_POSSIBLY_SAME = 1 << 1;
        /// Export entities with possibly-related relations
        const EXPORT_INCLUDE_POSSIBLY_RELATED = 1 << 2;
        /// Export entities with name-only relations
        const EXPORT_INCLUDE_NAME_ONLY = 1 << 3;
        /// Export entities with disclosed relations
        const EXPORT_INCLUDE_DISCLOSED = 1 << 4;
        /// Export single-record entities
        const EXPORT_INCLUDE_SINGLE_RECORD_ENTITIES = 1 << 5;

        // ==================== Entity relations ====================
        /// Include possibly-same relations
        const ENTITY_INCLUDE_POSSIBLY_SAME_RELATIONS = 1 << 6;
        /// Include possibly-related relations
        const ENTITY_INCLUDE_POSSIBLY_RELATED_RELATIONS = 1 << 7;
        /// Include name-only relations
        const ENTITY_INCLUDE_NAME_ONLY_RELATIONS = 1 << 8;
        /// Include disclosed relations
        const ENTITY_INCLUDE_DISCLOSED_RELATIONS = 1 << 9;

        // ==================== Entity content ====================
        /// Include every feature value
        const ENTITY_INCLUDE_ALL_FEATURES = 1 << 10;
        /// Include representative feature values only
        const ENTITY_INCLUDE_REPRESENTATIVE_FEATURES = 1 << 11;
        /// Include the entity's best name
        const ENTITY_INCLUDE_ENTITY_NAME = 1 << 12;
        /// Include per-data-source record counts
        const ENTITY_INCLUDE_RECORD_SUMMARY = 1 << 13;
        /// Include basic record data
        const ENTITY_INCLUDE_RECORD_DATA = 1 << 14;
        /// Include record match keys
        const ENTITY_INCLUDE_RECORD_MATCHING_INFO = 1 << 15;
        /// Include the original record JSON
        const ENTITY_INCLUDE_RECORD_JSON_DATA = 1 << 16;
        /// Include record feature ids
        const ENTITY_INCLUDE_RECORD_FEATURES = 1 << 18;
        /// Include related entity names
        const ENTITY_INCLUDE_RELATED_ENTITY_NAME = 1 << 19;
        /// Include related entity match keys
        const ENTITY_INCLUDE_RELATED_MATCHING_INFO = 1 << 20;
        /// Include related entity record summaries
        const ENTITY_INCLUDE_RELATED_RECORD_SUMMARY = 1 << 21;
        /// Include related entity record data
        const ENTITY_INCLUDE_RELATED_RECORD_DATA = 1 << 22;
        /// Include internal features
        const ENTITY_INCLUDE_INTERNAL_FEATURES = 1 << 23;
        /// Include feature statistics
        const ENTITY_INCLUDE_FEATURE_STATS = 1 << 24;

        // ==================== Analysis ====================
        /// Strictly avoid the listed entities when finding paths
        const FIND_PATH_STRICT_AVOID = 1 << 25;
        /// Include feature scores in why/how/search results
        const INCLUDE_FEATURE_SCORES = 1 << 26;
        /// Include search statistics
        const SEARCH_INCLUDE_STATS = 1 << 27;
        /// Include match key details
        const INCLUDE_MATCH_KEY_DETAILS = 1 << 28;
        /// Include matching info on path results
        const FIND_PATH_INCLUDE_MATCHING_INFO = 1 << 30;
        /// Include unmapped record data
        const ENTITY_INCLUDE_RECORD_UNMAPPED_DATA = 1 << 31;
        /// Include the search request in search results
        const SEARCH_INCLUDE_REQUEST = 1 << 37;
        /// Include search request details
        const SEARCH_INCLUDE_REQUEST_DETAILS = 1 << 38;

        // ==================== SDK internal ====================
        /// Return the change-summary ("info") document of a mutating call.
        /// Never forwarded to the native layer.
        const WITH_INFO = 1 << 62;

        // ==================== Recipes ====================
        /// Every export entity class
        const EXPORT_INCLUDE_ALL_ENTITIES = Self::EXPORT_INCLUDE_MULTI_RECORD_ENTITIES.bits()
            | Self::EXPORT_INCLUDE_SINGLE_RECORD_ENTITIES.bits();
        /// Every export relation class
        const EXPORT_INCLUDE_ALL_HAVING_RELATIONSHIPS = Self::EXPORT_INCLUDE_POSSIBLY_SAME.bits()
            | Self::EXPORT_INCLUDE_POSSIBLY_RELATED.bits()
            | Self::EXPORT_INCLUDE_NAME_ONLY.bits()
            | Self::EXPORT_INCLUDE_DISCLOSED.bits();
        /// Every entity relation class
        const ENTITY_INCLUDE_ALL_RELATIONS = Self::ENTITY_INCLUDE_POSSIBLY_SAME_RELATIONS.bits()
            | Self::ENTITY_INCLUDE_POSSIBLY_RELATED_RELATIONS.bits()
            | Self::ENTITY_INCLUDE_NAME_ONLY_RELATIONS.bits()
            | Self::ENTITY_INCLUDE_DISCLOSED_RELATIONS.bits();
        /// Default for fetching an entity
        const ENTITY_DEFAULT = Self::ENTITY_INCLUDE_ALL_RELATIONS.bits()
            | Self::ENTITY_INCLUDE_REPRESENTATIVE_FEATURES.bits()
            | Self::ENTITY_INCLUDE_ENTITY_NAME.bits()
            | Self::ENTITY_INCLUDE_RECORD_SUMMARY.bits()
            | Self::ENTITY_INCLUDE_RECORD_DATA.bits()
            | Self::ENTITY_INCLUDE_RECORD_MATCHING_INFO.bits()
            | Self::ENTITY_INCLUDE_RELATED_ENTITY_NAME.bits()
            | Self::ENTITY_INCLUDE_RELATED_RECORD_SUMMARY.bits()
            | Self::ENTITY_INCLUDE_RELATED_MATCHING_INFO.bits();
        /// Default for fetching a single record
        const RECORD_DEFAULT = Self::ENTITY_INCLUDE_RECORD_JSON_DATA.bits();
        /// Default for export
        const EXPORT_DEFAULT = Self::EXPORT_INCLUDE_ALL_ENTITIES.bits()
            | Self::ENTITY_DEFAULT.bits();
        /// Default for path finding
        const FIND_PATH_DEFAULT = Self::FIND_PATH_INCLUDE_MATCHING_INFO.bits()
            | Self::ENTITY_INCLUDE_ENTITY_NAME.bits()
            | Self::ENTITY_INCLUDE_RECORD_SUMMARY.bits();
        /// Default for why-entities / why-records analysis
        const WHY_ENTITIES_DEFAULT = Self::INCLUDE_FEATURE_SCORES.bits();
        /// Default for how-entity analysis
        const HOW_ENTITY_DEFAULT = Self::INCLUDE_FEATURE_SCORES.bits();
        /// Default for attribute search
        const SEARCH_BY_ATTRIBUTES_DEFAULT = Self::EXPORT_INCLUDE_ALL_ENTITIES.bits()
            | Self::EXPORT_INCLUDE_POSSIBLY_SAME.bits()
            | Self::EXPORT_INCLUDE_POSSIBLY_RELATED.bits()
            | Self::EXPORT_INCLUDE_NAME_ONLY.bits()
            | Self::SEARCH_INCLUDE_STATS.bits()
            | Self::INCLUDE_FEATURE_SCORES.bits()
            | Self::ENTITY_INCLUDE_REPRESENTATIVE_FEATURES.bits()
            | Self::ENTITY_INCLUDE_ENTITY_NAME.bits()
            | Self::ENTITY_INCLUDE_RECORD_SUMMARY.bits();
    }
}

impl Flags {
    /// Bits that are meaningful to the SDK only.
    pub const SDK_INTERNAL_MASK: u64 = Flags::WITH_INFO.bits();

    /// No flags
    pub const NONE: Flags = Flags::empty();

    /// Integer handed to the native layer: all bits except the SDK-internal ones.
    pub fn downstream(self) -> u64 {
        self.bits() & !Self::SDK_INTERNAL_MASK
    }

    /// True when a mutating call should return its info document
    pub fn wants_info(self) -> bool {
        self.contains(Flags::WITH_INFO)
    }

    /// Names of the single-bit flags set, in bit order.
    ///
    /// Recipe constants are not listed; unnamed bits are skipped.
    pub fn names(self) -> Vec<&'static str> {
        Flags::all()
            .iter_names()
            .filter(|(_, flag)| flag.bits().is_power_of_two() && self.contains(*flag))
            .map(|(name, _)| name)
            .collect()
    }

    /// Build a flag set from flag or recipe names.
    ///
    /// Returns the first unknown name as the error.
    pub fn parse_names<'a, I>(names: I) -> Result<Flags, String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        names.into_iter().try_fold(Flags::empty(), |acc, name| {
            Flags::from_name(name.trim())
                .map(|flag| acc | flag)
                .ok_or_else(|| name.to_string())
        })
    }
}

// =============================================================================
// Usage Groups
// =============================================================================

/// Operation families and the flags each one understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlagGroup {
    /// Fetching an entity by entity id or record id
    EntityGet,
    /// Fetching a single record
    RecordGet,
    /// Exporting entities
    Export,
    /// Explaining why two entities did or did not resolve
    WhyEntities,
    /// Explaining why two records did or did not resolve
    WhyRecords,
    /// Explaining how an entity was built
    HowEntity,
    /// Finding paths between entities
    FindPath,
    /// Searching by attributes
    Search,
    /// Adding, deleting or reevaluating records
    RecordModify,
    /// Processing redo records
    Redo,
}

impl FlagGroup {
    /// Every family, in declaration order
    pub const ALL: [FlagGroup; 10] = [
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

    /// Snake-case name, as used in configuration files
    pub fn name(self) -> &'static str {
        match self {
            FlagGroup::EntityGet => "entity_get",
            FlagGroup::RecordGet => "record_get",
            FlagGroup::Export => "export",
            FlagGroup::WhyEntities => "why_entities",
            FlagGroup::WhyRecords => "why_records",
            FlagGroup::HowEntity => "how_entity",
            FlagGroup::FindPath => "find_path",
            FlagGroup::Search => "search",
            FlagGroup::RecordModify => "record_modify",
            FlagGroup::Redo => "redo",
        }
    }

    /// Inverse of [`FlagGroup::name`]
    pub fn from_name(name: &str) -> Option<FlagGroup> {
        FlagGroup::ALL.into_iter().find(|group| group.name() == name)
    }

    /// Recipe used when an operation of this family is called without flags.
    pub fn default_flags(self) -> Flags {
        match self {
            FlagGroup::EntityGet => Flags::ENTITY_DEFAULT,
            FlagGroup::RecordGet => Flags::RECORD_DEFAULT,
            FlagGroup::Export => Flags::EXPORT_DEFAULT,
            FlagGroup::WhyEntities | FlagGroup::WhyRecords => Flags::WHY_ENTITIES_DEFAULT,
            FlagGroup::HowEntity => Flags::HOW_ENTITY_DEFAULT,
            FlagGroup::FindPath => Flags::FIND_PATH_DEFAULT,
            FlagGroup::Search => Flags::SEARCH_BY_ATTRIBUTES_DEFAULT,
            FlagGroup::RecordModify | FlagGroup::Redo => Flags::NONE,
        }
    }

    /// Union of every flag the family's native operations interpret.
    pub fn applicable(self) -> Flags {
        let entity_content = Flags::ENTITY_INCLUDE_ALL_RELATIONS
            | Flags::ENTITY_INCLUDE_ALL_FEATURES
            | Flags::ENTITY_INCLUDE_REPRESENTATIVE_FEATURES
            | Flags::ENTITY_INCLUDE_ENTITY_NAME
            | Flags::ENTITY_INCLUDE_RECORD_SUMMARY
            | Flags::ENTITY_INCLUDE_RECORD_DATA
            | Flags::ENTITY_INCLUDE_RECORD_MATCHING_INFO
            | Flags::ENTITY_INCLUDE_RECORD_JSON_DATA
            | Flags::ENTITY_INCLUDE_RECORD_FEATURES
            | Flags::ENTITY_INCLUDE_RECORD_UNMAPPED_DATA
            | Flags::ENTITY_INCLUDE_RELATED_ENTITY_NAME
            | Flags::ENTITY_INCLUDE_RELATED_MATCHING_INFO
            | Flags::ENTITY_INCLUDE_RELATED_RECORD_SUMMARY
            | Flags::ENTITY_INCLUDE_RELATED_RECORD_DATA
            | Flags::ENTITY_INCLUDE_INTERNAL_FEATURES
            | Flags::ENTITY_INCLUDE_FEATURE_STATS;
        let scoring = Flags::INCLUDE_FEATURE_SCORES | Flags::INCLUDE_MATCH_KEY_DETAILS;

        match self {
            FlagGroup::EntityGet => entity_content,
            FlagGroup::RecordGet => {
                Flags::ENTITY_INCLUDE_RECORD_JSON_DATA
                    | Flags::ENTITY_INCLUDE_RECORD_DATA
                    | Flags::ENTITY_INCLUDE_RECORD_MATCHING_INFO
                    | Flags::ENTITY_INCLUDE_RECORD_FEATURES
                    | Flags::ENTITY_INCLUDE_RECORD_UNMAPPED_DATA
            }
            FlagGroup::Export => {
                entity_content
                    | Flags::EXPORT_INCLUDE_ALL_ENTITIES
                    | Flags::EXPORT_INCLUDE_ALL_HAVING_RELATIONSHIPS
            }
            FlagGroup::WhyEntities | FlagGroup::WhyRecords | FlagGroup::HowEntity => {
                entity_content | scoring
            }
            FlagGroup::FindPath => {
                entity_content | Flags::FIND_PATH_STRICT_AVOID | Flags::FIND_PATH_INCLUDE_MATCHING_INFO
            }
            FlagGroup::Search => {
                entity_content
                    | scoring
                    | Flags::EXPORT_INCLUDE_ALL_ENTITIES
                    | Flags::EXPORT_INCLUDE_ALL_HAVING_RELATIONSHIPS
                    | Flags::SEARCH_INCLUDE_STATS
                    | Flags::SEARCH_INCLUDE_REQUEST
                    | Flags::SEARCH_INCLUDE_REQUEST_DETAILS
            }
            FlagGroup::RecordModify | FlagGroup::Redo => Flags::WITH_INFO,
        }
    }

    /// Flags for a call: the caller's, or the family recipe when `None`.
    pub fn resolve(self, flags: Option<Flags>) -> Flags {
        flags.unwrap_or_else(|| self.default_flags())
    }
}
