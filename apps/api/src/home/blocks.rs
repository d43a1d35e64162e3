//! Block catalog and per-zone editorial layouts.
//!
//! Each block type maps to display metadata plus exactly one fetch strategy.
//! Layouts are hand-curated orderings: a village user sees farm and garden
//! blocks first, a city-center user sees shops and beauty first.

use serde::Serialize;

use crate::models::ad::{AdFilter, AdQuery, AdSort};
use crate::models::profile::SellerRole;
use crate::zones::scoring::{BEAUTY_CATEGORIES, SERVICE_CATEGORIES};
use crate::zones::Zone;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BlockType {
    Banners,
    FarmerGoods,
    GardenHelp,
    Machinery,
    Seedlings,
    Firewood,
    SnowCleaning,
    FreshNearby,
    TrendingNearby,
    FreeGiveaway,
    LocalShops,
    Bloggers,
    Beauty,
    Services,
    KidsGoods,
    Electronics,
    DemandTrending,
    Fairs,
}

impl BlockType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockType::Banners => "banners",
            BlockType::FarmerGoods => "farmer_goods",
            BlockType::GardenHelp => "garden_help",
            BlockType::Machinery => "machinery",
            BlockType::Seedlings => "seedlings",
            BlockType::Firewood => "firewood",
            BlockType::SnowCleaning => "snow_cleaning",
            BlockType::FreshNearby => "fresh_nearby",
            BlockType::TrendingNearby => "trending_nearby",
            BlockType::FreeGiveaway => "free_giveaway",
            BlockType::LocalShops => "local_shops",
            BlockType::Bloggers => "bloggers",
            BlockType::Beauty => "beauty",
            BlockType::Services => "services",
            BlockType::KidsGoods => "kids_goods",
            BlockType::Electronics => "electronics",
            BlockType::DemandTrending => "demand_trending",
            BlockType::Fairs => "fairs",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    Banners,
    HorizontalList,
}

/// A sub-filter chip shown above a block's items.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FilterChip {
    pub id: &'static str,
    pub label: &'static str,
    pub icon: &'static str,
    pub keywords: &'static [&'static str],
}

/// Category-style constraint declared by a block.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CategorySpec {
    pub categories: &'static [&'static str],
    pub farmer: Option<bool>,
    pub free_giveaway: Option<bool>,
}

impl CategorySpec {
    fn to_filter(self) -> AdFilter {
        AdFilter {
            category_ids: self.categories.iter().map(|c| c.to_string()).collect(),
            is_farmer_ad: self.farmer,
            is_free_giveaway: self.free_giveaway,
        }
    }
}

/// How a block gets its items.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchStrategy {
    /// Fixed items supplied by the engine (banners).
    Static,
    /// Progressive-radius ads under a category constraint, optionally AND-ed
    /// with keyword terms.
    CategoryFilter {
        spec: CategorySpec,
        terms: &'static [&'static str],
        sort: AdSort,
    },
    /// Progressive-radius ads matching any of the terms.
    Keyword {
        terms: &'static [&'static str],
        sort: AdSort,
    },
    /// Seller profiles with the given role.
    ProfileRole(SellerRole),
    /// Most searched terms nearby.
    Demand,
    /// Fairs running now.
    Fairs,
}

impl FetchStrategy {
    /// The ad predicate for ad-backed strategies.
    pub fn ad_query(&self) -> Option<(AdQuery, AdSort)> {
        match self {
            FetchStrategy::CategoryFilter { spec, terms, sort } => Some((
                AdQuery {
                    filter: spec.to_filter(),
                    keywords: terms.iter().map(|t| t.to_string()).collect(),
                },
                *sort,
            )),
            FetchStrategy::Keyword { terms, sort } => Some((
                AdQuery {
                    filter: AdFilter::default(),
                    keywords: terms.iter().map(|t| t.to_string()).collect(),
                },
                *sort,
            )),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BlockConfig {
    pub block_type: BlockType,
    pub kind: BlockKind,
    pub title: &'static str,
    pub subtitle: Option<&'static str>,
    pub icon: Option<&'static str>,
    pub accent_color: Option<&'static str>,
    pub link: Option<&'static str>,
    /// Calendar months (1–12) in which the block is shown. `None` means always.
    pub seasonal_months: Option<&'static [u32]>,
    pub max_items: Option<usize>,
    pub filters: &'static [FilterChip],
    pub fetch: FetchStrategy,
}

impl BlockConfig {
    pub fn in_season(&self, month: u32) -> bool {
        self.seasonal_months
            .map_or(true, |months| months.contains(&month))
    }

    /// Banners are shown even when empty; every other block needs items.
    pub fn always_shown(&self) -> bool {
        self.kind == BlockKind::Banners
    }
}

const WINTER: &[u32] = &[11, 12, 1, 2, 3];
const HEATING_SEASON: &[u32] = &[9, 10, 11, 12, 1, 2, 3];
const PLANTING_SEASON: &[u32] = &[3, 4, 5, 6];

const GARDEN_FILTERS: &[FilterChip] = &[
    FilterChip {
        id: "ploughing",
        label: "Ploughing",
        icon: "🚜",
        keywords: &["вспашка", "пахота", "plough"],
    },
    FilterChip {
        id: "mowing",
        label: "Mowing",
        icon: "🌿",
        keywords: &["покос", "косить", "mowing"],
    },
    FilterChip {
        id: "digging",
        label: "Digging",
        icon: "⛏️",
        keywords: &["копка", "выкопать", "digging"],
    },
];

const KIDS_FILTERS: &[FilterChip] = &[
    FilterChip {
        id: "clothes",
        label: "Clothes",
        icon: "👕",
        keywords: &["одежда", "комбинезон", "clothes"],
    },
    FilterChip {
        id: "strollers",
        label: "Strollers",
        icon: "🍼",
        keywords: &["коляска", "stroller"],
    },
    FilterChip {
        id: "toys",
        label: "Toys",
        icon: "🧸",
        keywords: &["игрушка", "конструктор", "toy"],
    },
];

fn list(block_type: BlockType, title: &'static str, fetch: FetchStrategy) -> BlockConfig {
    BlockConfig {
        block_type,
        kind: BlockKind::HorizontalList,
        title,
        subtitle: None,
        icon: None,
        accent_color: None,
        link: None,
        seasonal_months: None,
        max_items: None,
        filters: &[],
        fetch,
    }
}

fn ads(spec: CategorySpec, sort: AdSort) -> FetchStrategy {
    FetchStrategy::CategoryFilter {
        spec,
        terms: &[],
        sort,
    }
}

/// The catalog entry for one block type.
pub fn block_config(block_type: BlockType) -> BlockConfig {
    use BlockType::*;

    match block_type {
        Banners => BlockConfig {
            kind: BlockKind::Banners,
            ..list(Banners, "", FetchStrategy::Static)
        },
        FarmerGoods => BlockConfig {
            subtitle: Some("Straight from local farms"),
            icon: Some("🥕"),
            accent_color: Some("#4CAF50"),
            link: Some("/search?farmer=1"),
            ..list(
                FarmerGoods,
                "Farm produce",
                ads(
                    CategorySpec {
                        farmer: Some(true),
                        ..CategorySpec::default()
                    },
                    AdSort::Newest,
                ),
            )
        },
        GardenHelp => BlockConfig {
            subtitle: Some("Neighbours who help with the plot"),
            icon: Some("🌱"),
            accent_color: Some("#8BC34A"),
            filters: GARDEN_FILTERS,
            ..list(
                GardenHelp,
                "Garden help",
                FetchStrategy::CategoryFilter {
                    spec: CategorySpec {
                        categories: &SERVICE_CATEGORIES,
                        ..CategorySpec::default()
                    },
                    terms: &["огород", "сад", "вспашка", "покос", "garden"],
                    sort: AdSort::Newest,
                },
            )
        },
        Machinery => BlockConfig {
            icon: Some("🚜"),
            accent_color: Some("#795548"),
            ..list(
                Machinery,
                "Machinery",
                FetchStrategy::Keyword {
                    terms: &["трактор", "мотоблок", "культиватор", "tractor"],
                    sort: AdSort::Newest,
                },
            )
        },
        Seedlings => BlockConfig {
            icon: Some("🌿"),
            accent_color: Some("#689F38"),
            seasonal_months: Some(PLANTING_SEASON),
            ..list(
                Seedlings,
                "Seedlings",
                FetchStrategy::Keyword {
                    terms: &["рассада", "саженцы", "seedling"],
                    sort: AdSort::Newest,
                },
            )
        },
        Firewood => BlockConfig {
            icon: Some("🪵"),
            accent_color: Some("#8D6E63"),
            seasonal_months: Some(HEATING_SEASON),
            ..list(
                Firewood,
                "Firewood",
                FetchStrategy::Keyword {
                    terms: &["дрова", "брикеты", "firewood"],
                    sort: AdSort::PriceAsc,
                },
            )
        },
        SnowCleaning => BlockConfig {
            icon: Some("❄️"),
            accent_color: Some("#03A9F4"),
            seasonal_months: Some(WINTER),
            ..list(
                SnowCleaning,
                "Snow clearing",
                FetchStrategy::CategoryFilter {
                    spec: CategorySpec {
                        categories: &SERVICE_CATEGORIES,
                        ..CategorySpec::default()
                    },
                    terms: &["снег", "уборка снега", "snow"],
                    sort: AdSort::Newest,
                },
            )
        },
        FreshNearby => BlockConfig {
            subtitle: Some("Just posted around you"),
            icon: Some("🆕"),
            link: Some("/search?sort=newest"),
            ..list(
                FreshNearby,
                "New nearby",
                ads(CategorySpec::default(), AdSort::Newest),
            )
        },
        TrendingNearby => BlockConfig {
            subtitle: Some("Most viewed around you"),
            icon: Some("🔥"),
            accent_color: Some("#F44336"),
            ..list(
                TrendingNearby,
                "Trending nearby",
                ads(CategorySpec::default(), AdSort::Popular),
            )
        },
        FreeGiveaway => BlockConfig {
            icon: Some("🎁"),
            accent_color: Some("#9C27B0"),
            link: Some("/search?free=1"),
            ..list(
                FreeGiveaway,
                "Giving away for free",
                ads(
                    CategorySpec {
                        free_giveaway: Some(true),
                        ..CategorySpec::default()
                    },
                    AdSort::Newest,
                ),
            )
        },
        LocalShops => BlockConfig {
            icon: Some("🏪"),
            link: Some("/shops"),
            max_items: Some(20),
            ..list(
                LocalShops,
                "Local shops",
                FetchStrategy::ProfileRole(SellerRole::Shop),
            )
        },
        Bloggers => BlockConfig {
            icon: Some("📸"),
            max_items: Some(20),
            ..list(
                Bloggers,
                "Local bloggers",
                FetchStrategy::ProfileRole(SellerRole::Blogger),
            )
        },
        Beauty => BlockConfig {
            icon: Some("💅"),
            accent_color: Some("#E91E63"),
            ..list(
                Beauty,
                "Beauty",
                ads(
                    CategorySpec {
                        categories: &BEAUTY_CATEGORIES,
                        ..CategorySpec::default()
                    },
                    AdSort::Popular,
                ),
            )
        },
        Services => BlockConfig {
            icon: Some("🛠️"),
            accent_color: Some("#607D8B"),
            ..list(
                Services,
                "Services",
                ads(
                    CategorySpec {
                        categories: &SERVICE_CATEGORIES,
                        ..CategorySpec::default()
                    },
                    AdSort::Newest,
                ),
            )
        },
        KidsGoods => BlockConfig {
            icon: Some("🧸"),
            filters: KIDS_FILTERS,
            ..list(
                KidsGoods,
                "For kids",
                ads(
                    CategorySpec {
                        categories: &["kids"],
                        ..CategorySpec::default()
                    },
                    AdSort::Newest,
                ),
            )
        },
        Electronics => BlockConfig {
            icon: Some("📱"),
            ..list(
                Electronics,
                "Electronics",
                ads(
                    CategorySpec {
                        categories: &["electronics", "phones"],
                        ..CategorySpec::default()
                    },
                    AdSort::Popular,
                ),
            )
        },
        DemandTrending => BlockConfig {
            subtitle: Some("What neighbours are searching for"),
            icon: Some("🔎"),
            max_items: Some(12),
            ..list(DemandTrending, "People are looking for", FetchStrategy::Demand)
        },
        Fairs => BlockConfig {
            icon: Some("🎪"),
            accent_color: Some("#FFC107"),
            max_items: Some(10),
            ..list(Fairs, "Fairs", FetchStrategy::Fairs)
        },
    }
}

const VILLAGE_LAYOUT: &[BlockType] = &[
    BlockType::Banners,
    BlockType::FarmerGoods,
    BlockType::GardenHelp,
    BlockType::Machinery,
    BlockType::Seedlings,
    BlockType::Firewood,
    BlockType::SnowCleaning,
    BlockType::FreshNearby,
    BlockType::FreeGiveaway,
    BlockType::Fairs,
    BlockType::Services,
    BlockType::LocalShops,
];

const SUBURB_LAYOUT: &[BlockType] = &[
    BlockType::Banners,
    BlockType::FreshNearby,
    BlockType::FarmerGoods,
    BlockType::Services,
    BlockType::GardenHelp,
    BlockType::Seedlings,
    BlockType::SnowCleaning,
    BlockType::KidsGoods,
    BlockType::FreeGiveaway,
    BlockType::LocalShops,
    BlockType::DemandTrending,
    BlockType::Fairs,
];

const CITY_CENTER_LAYOUT: &[BlockType] = &[
    BlockType::Banners,
    BlockType::TrendingNearby,
    BlockType::Beauty,
    BlockType::LocalShops,
    BlockType::Bloggers,
    BlockType::Electronics,
    BlockType::FreshNearby,
    BlockType::Services,
    BlockType::DemandTrending,
    BlockType::KidsGoods,
    BlockType::Fairs,
];

pub fn zone_layout(zone: Zone) -> &'static [BlockType] {
    match zone {
        Zone::Village => VILLAGE_LAYOUT,
        Zone::Suburb => SUBURB_LAYOUT,
        Zone::CityCenter => CITY_CENTER_LAYOUT,
    }
}

/// The zone's blocks in layout order, minus those out of season in `month`.
pub fn select_blocks(zone: Zone, month: u32) -> Vec<BlockConfig> {
    zone_layout(zone)
        .iter()
        .map(|t| block_config(*t))
        .filter(|config| config.in_season(month))
        .collect()
}
