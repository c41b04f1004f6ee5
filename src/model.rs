//! Pet model: bounded stats, the three variants and their constant tables.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ModelError;
use crate::inventory::ItemCategory;

pub const STAT_MAX: u8 = 10;

/// Stat value the load fallback pet starts with.
pub const FALLBACK_STAT: u8 = 5;
pub const FALLBACK_PET_NAME: &str = "DefaultPet";

const SLEEP_ITEM_SLEEP: i32 = 3;
const FUN_ITEM_COST: i32 = 1;

/// An integer in `0..=10`. Every mutation saturates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Stat(u8);

impl Stat {
    pub const FULL: Stat = Stat(STAT_MAX);
    pub const EMPTY: Stat = Stat(0);

    /// Clamps `value` into range.
    pub fn new(value: i64) -> Self {
        Self(value.clamp(0, STAT_MAX as i64) as u8)
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn increase(&mut self, n: u32) {
        self.0 = (self.0 as u32).saturating_add(n).min(STAT_MAX as u32) as u8;
    }

    pub fn decrease(&mut self, n: u32) {
        self.0 = (self.0 as u32).saturating_sub(n) as u8;
    }

    pub fn is_full(self) -> bool {
        self.0 >= STAT_MAX
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl Default for Stat {
    fn default() -> Self {
        Self::FULL
    }
}

impl fmt::Display for Stat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StatKind {
    Hunger,
    Fun,
    Sleep,
    Grooming,
}

impl StatKind {
    pub const ALL: [StatKind; 4] = [
        StatKind::Hunger,
        StatKind::Fun,
        StatKind::Sleep,
        StatKind::Grooming,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StatKind::Hunger => "hunger",
            StatKind::Fun => "fun",
            StatKind::Sleep => "sleep",
            StatKind::Grooming => "grooming",
        }
    }
}

impl fmt::Display for StatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Stats {
    pub hunger: Stat,
    pub fun: Stat,
    pub sleep: Stat,
    pub grooming: Stat,
}

impl Stats {
    pub fn uniform(value: u8) -> Self {
        let s = Stat::new(value as i64);
        Self {
            hunger: s,
            fun: s,
            sleep: s,
            grooming: s,
        }
    }

    pub fn get(&self, kind: StatKind) -> Stat {
        match kind {
            StatKind::Hunger => self.hunger,
            StatKind::Fun => self.fun,
            StatKind::Sleep => self.sleep,
            StatKind::Grooming => self.grooming,
        }
    }

    fn get_mut(&mut self, kind: StatKind) -> &mut Stat {
        match kind {
            StatKind::Hunger => &mut self.hunger,
            StatKind::Fun => &mut self.fun,
            StatKind::Sleep => &mut self.sleep,
            StatKind::Grooming => &mut self.grooming,
        }
    }
}

/// Seconds between decay ticks, per stat.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DecayIntervals {
    pub hunger: Duration,
    pub fun: Duration,
    pub grooming: Duration,
    pub sleep: Duration,
}

impl DecayIntervals {
    const fn secs(hunger: u64, fun: u64, grooming: u64, sleep: u64) -> Self {
        Self {
            hunger: Duration::from_secs(hunger),
            fun: Duration::from_secs(fun),
            grooming: Duration::from_secs(grooming),
            sleep: Duration::from_secs(sleep),
        }
    }

    pub fn period(&self, kind: StatKind) -> Duration {
        match kind {
            StatKind::Hunger => self.hunger,
            StatKind::Fun => self.fun,
            StatKind::Grooming => self.grooming,
            StatKind::Sleep => self.sleep,
        }
    }

    /// Multiplies every period by `factor`. A non-positive or non-finite factor leaves the
    /// table unchanged, as does any product too large for a `Duration`.
    pub fn scaled(self, factor: f64) -> Self {
        if !factor.is_finite() || factor <= 0.0 || factor == 1.0 {
            return self;
        }
        let s = |d: Duration| Duration::try_from_secs_f64(d.as_secs_f64() * factor).unwrap_or(d);
        Self {
            hunger: s(self.hunger),
            fun: s(self.fun),
            grooming: s(self.grooming),
            sleep: s(self.sleep),
        }
    }
}

/// Per-variant effect magnitudes and decay periods.
#[derive(Clone, Copy, Debug)]
pub struct VariantProfile {
    pub play_fun: u32,
    pub food_hunger: i32,
    pub bath_grooming: i32,
    pub fun_item_fun: i32,
    pub decay: DecayIntervals,
    pub meal: &'static str,
}

const PEGASUS: VariantProfile = VariantProfile {
    play_fun: 1,
    food_hunger: 3,
    bath_grooming: 5,
    fun_item_fun: 3,
    decay: DecayIntervals::secs(30, 25, 10, 35),
    meal: "magical herbs",
};

const PHOENIX: VariantProfile = VariantProfile {
    play_fun: 2,
    food_hunger: 5,
    bath_grooming: 2,
    fun_item_fun: 2,
    decay: DecayIntervals::secs(40, 15, 15, 35),
    meal: "mystical fruits",
};

const DRAGON: VariantProfile = VariantProfile {
    play_fun: 1,
    food_hunger: 1,
    bath_grooming: 3,
    fun_item_fun: 4,
    decay: DecayIntervals::secs(15, 40, 25, 35),
    meal: "a large meal",
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Variant {
    Phoenix,
    Pegasus,
    Dragon,
}

impl Variant {
    /// The lowercase type string stored in save files.
    pub fn tag(self) -> &'static str {
        match self {
            Variant::Phoenix => "phoenix",
            Variant::Pegasus => "pegasus",
            Variant::Dragon => "dragon",
        }
    }

    pub fn profile(self) -> &'static VariantProfile {
        match self {
            Variant::Phoenix => &PHOENIX,
            Variant::Pegasus => &PEGASUS,
            Variant::Dragon => &DRAGON,
        }
    }

    pub fn item_effect(self, category: ItemCategory) -> Effect {
        let p = self.profile();
        match category {
            ItemCategory::Food => Effect::Adjust(StatDelta {
                hunger: p.food_hunger,
                ..StatDelta::NONE
            }),
            ItemCategory::Bath => Effect::Adjust(StatDelta {
                grooming: p.bath_grooming,
                ..StatDelta::NONE
            }),
            ItemCategory::Fun => Effect::Adjust(StatDelta {
                fun: p.fun_item_fun,
                hunger: -FUN_ITEM_COST,
                sleep: -FUN_ITEM_COST,
                grooming: 0,
            }),
            ItemCategory::Sleep => Effect::Adjust(StatDelta {
                sleep: SLEEP_ITEM_SLEEP,
                ..StatDelta::NONE
            }),
            ItemCategory::Gift => Effect::Refill,
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for Variant {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "phoenix" => Ok(Variant::Phoenix),
            "pegasus" => Ok(Variant::Pegasus),
            "dragon" => Ok(Variant::Dragon),
            "" => Err(ModelError::MissingVariant),
            other => Err(ModelError::UnknownVariant(other.to_string())),
        }
    }
}

/// Signed change per stat. Positive values increase, negative decrease.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StatDelta {
    pub hunger: i32,
    pub fun: i32,
    pub sleep: i32,
    pub grooming: i32,
}

impl StatDelta {
    pub const NONE: StatDelta = StatDelta {
        hunger: 0,
        fun: 0,
        sleep: 0,
        grooming: 0,
    };

    pub fn single(kind: StatKind, amount: i32) -> Self {
        let mut d = Self::NONE;
        match kind {
            StatKind::Hunger => d.hunger = amount,
            StatKind::Fun => d.fun = amount,
            StatKind::Sleep => d.sleep = amount,
            StatKind::Grooming => d.grooming = amount,
        }
        d
    }

    fn get(&self, kind: StatKind) -> i32 {
        match kind {
            StatKind::Hunger => self.hunger,
            StatKind::Fun => self.fun,
            StatKind::Sleep => self.sleep,
            StatKind::Grooming => self.grooming,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Effect {
    Adjust(StatDelta),
    /// Every stat back to full.
    Refill,
}

/// What a behaviour method did, or why it did nothing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PetReaction {
    Ate,
    Full,
    Played { fun_gained: u8 },
    TooTired,
    Slept,
    FullyRested,
    Groomed,
    AlreadyGroomed,
}

impl PetReaction {
    pub fn is_noop(self) -> bool {
        matches!(
            self,
            PetReaction::Full
                | PetReaction::TooTired
                | PetReaction::FullyRested
                | PetReaction::AlreadyGroomed
        )
    }

    pub fn describe(self, pet: &Pet) -> String {
        let name = pet.name();
        match self {
            PetReaction::Ate => format!("{name} is eating {}.", pet.variant().profile().meal),
            PetReaction::Full => format!("{name} is full!"),
            PetReaction::Played { fun_gained: 0 } => {
                format!("{name} is already fully entertained!")
            }
            PetReaction::Played { .. } => format!("{name} is playing and having fun!"),
            PetReaction::TooTired => format!(
                "{name} is too hungry or tired to play! Feed or let it sleep first."
            ),
            PetReaction::Slept => format!("{name} is sleeping to regain energy."),
            PetReaction::FullyRested => format!("{name} is already fully rested!"),
            PetReaction::Groomed => format!("{name} is being groomed."),
            PetReaction::AlreadyGroomed => format!("{name} is already perfectly groomed!"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Pet {
    name: String,
    variant: Variant,
    stats: Stats,
}

impl Pet {
    /// A new pet with every stat full.
    pub fn new(name: impl Into<String>, variant: Variant) -> Self {
        Self::with_stats(name, variant, Stats::default())
    }

    pub fn with_stats(name: impl Into<String>, variant: Variant, stats: Stats) -> Self {
        Self {
            name: name.into(),
            variant,
            stats,
        }
    }

    /// The pet a corrupt or incomplete save degrades to.
    pub fn fallback(name: Option<&str>) -> Self {
        let name = name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(FALLBACK_PET_NAME);
        Self::with_stats(name, Variant::Pegasus, Stats::uniform(FALLBACK_STAT))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn variant(&self) -> Variant {
        self.variant
    }

    pub fn stats(&self) -> Stats {
        self.stats
    }

    pub fn stat(&self, kind: StatKind) -> Stat {
        self.stats.get(kind)
    }

    pub fn increase(&mut self, kind: StatKind, n: u32) {
        self.stats.get_mut(kind).increase(n);
    }

    pub fn decrease(&mut self, kind: StatKind, n: u32) {
        self.stats.get_mut(kind).decrease(n);
    }

    pub fn apply(&mut self, effect: Effect) {
        match effect {
            Effect::Adjust(delta) => {
                for kind in StatKind::ALL {
                    let amount = delta.get(kind);
                    if amount >= 0 {
                        self.increase(kind, amount.unsigned_abs());
                    } else {
                        self.decrease(kind, amount.unsigned_abs());
                    }
                }
            }
            Effect::Refill => self.stats = Stats::default(),
        }
    }

    /// All four stats at zero at once.
    pub fn is_exhausted(&self) -> bool {
        StatKind::ALL.iter().all(|&k| self.stat(k).is_empty())
    }

    pub fn eat(&mut self) -> PetReaction {
        if self.stats.hunger.is_full() {
            return PetReaction::Full;
        }
        self.increase(StatKind::Hunger, 1);
        PetReaction::Ate
    }

    /// Trades one hunger and one sleep for a variant-specific amount of fun.
    pub fn play(&mut self) -> PetReaction {
        if self.stats.hunger.is_empty() || self.stats.sleep.is_empty() {
            return PetReaction::TooTired;
        }
        let before = self.stats.fun.value();
        self.increase(StatKind::Fun, self.variant.profile().play_fun);
        self.decrease(StatKind::Hunger, 1);
        self.decrease(StatKind::Sleep, 1);
        PetReaction::Played {
            fun_gained: self.stats.fun.value() - before,
        }
    }

    pub fn sleep(&mut self) -> PetReaction {
        if self.stats.sleep.is_full() {
            return PetReaction::FullyRested;
        }
        self.increase(StatKind::Sleep, 1);
        PetReaction::Slept
    }

    pub fn groom(&mut self) -> PetReaction {
        if self.stats.grooming.is_full() {
            return PetReaction::AlreadyGroomed;
        }
        self.increase(StatKind::Grooming, 1);
        PetReaction::Groomed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(hunger: u8, fun: u8, sleep: u8, grooming: u8) -> Stats {
        Stats {
            hunger: Stat::new(hunger as i64),
            fun: Stat::new(fun as i64),
            sleep: Stat::new(sleep as i64),
            grooming: Stat::new(grooming as i64),
        }
    }

    #[test]
    fn stat_saturates_both_ways() {
        for start in 0..=10u8 {
            for n in [0u32, 1, 3, 10, 11, u32::MAX] {
                let mut up = Stat::new(start as i64);
                up.increase(n);
                assert!(up.value() <= STAT_MAX);
                let mut down = Stat::new(start as i64);
                down.decrease(n);
                assert_eq!(down.value(), start.saturating_sub(n.min(255) as u8));
            }
        }
        assert_eq!(Stat::new(-4), Stat::EMPTY);
        assert_eq!(Stat::new(42), Stat::FULL);
    }

    #[test]
    fn new_pet_starts_full() {
        let pet = Pet::new("Ember", Variant::Phoenix);
        assert_eq!(pet.stats(), Stats::uniform(10));
        assert!(!pet.is_exhausted());
    }

    #[test]
    fn exhausted_only_when_all_four_are_zero() {
        let pet = Pet::with_stats("x", Variant::Dragon, stats(0, 0, 0, 0));
        assert!(pet.is_exhausted());
        for kind in StatKind::ALL {
            let mut p = pet.clone();
            p.increase(kind, 1);
            assert!(!p.is_exhausted(), "{kind} at 1 must not count as exhausted");
        }
    }

    #[test]
    fn item_effects_follow_variant_table() {
        let cases = [
            (Variant::Pegasus, ItemCategory::Food, stats(8, 5, 5, 5)),
            (Variant::Phoenix, ItemCategory::Food, stats(10, 5, 5, 5)),
            (Variant::Dragon, ItemCategory::Food, stats(6, 5, 5, 5)),
            (Variant::Pegasus, ItemCategory::Bath, stats(5, 5, 5, 10)),
            (Variant::Phoenix, ItemCategory::Bath, stats(5, 5, 5, 7)),
            (Variant::Dragon, ItemCategory::Bath, stats(5, 5, 5, 8)),
            (Variant::Pegasus, ItemCategory::Fun, stats(4, 8, 4, 5)),
            (Variant::Phoenix, ItemCategory::Fun, stats(4, 7, 4, 5)),
            (Variant::Dragon, ItemCategory::Fun, stats(4, 9, 4, 5)),
            (Variant::Dragon, ItemCategory::Sleep, stats(5, 5, 8, 5)),
            (Variant::Phoenix, ItemCategory::Gift, stats(10, 10, 10, 10)),
        ];
        for (variant, category, expected) in cases {
            let mut pet = Pet::with_stats("t", variant, Stats::uniform(5));
            pet.apply(variant.item_effect(category));
            assert_eq!(pet.stats(), expected, "{variant} {category}");
        }
    }

    #[test]
    fn play_costs_hunger_and_sleep() {
        let mut phoenix = Pet::with_stats("p", Variant::Phoenix, stats(5, 5, 5, 5));
        assert_eq!(phoenix.play(), PetReaction::Played { fun_gained: 2 });
        assert_eq!(phoenix.stats(), stats(4, 7, 4, 5));

        let mut pegasus = Pet::with_stats("g", Variant::Pegasus, stats(5, 10, 5, 5));
        assert_eq!(pegasus.play(), PetReaction::Played { fun_gained: 0 });
        assert_eq!(pegasus.stats(), stats(4, 10, 4, 5));
    }

    #[test]
    fn play_refused_when_starving_or_exhausted() {
        let mut pet = Pet::with_stats("d", Variant::Dragon, stats(0, 3, 4, 5));
        assert_eq!(pet.play(), PetReaction::TooTired);
        assert_eq!(pet.stats(), stats(0, 3, 4, 5));
    }

    #[test]
    fn behaviours_report_noop_at_max() {
        let mut pet = Pet::new("n", Variant::Pegasus);
        assert!(pet.eat().is_noop());
        assert!(pet.sleep().is_noop());
        assert!(pet.groom().is_noop());
        pet.decrease(StatKind::Hunger, 2);
        assert_eq!(pet.eat(), PetReaction::Ate);
        assert_eq!(pet.stat(StatKind::Hunger).value(), 9);
        assert!(pet.eat().describe(&pet).contains("magical herbs"));
    }

    #[test]
    fn variant_parsing() {
        assert_eq!("Dragon".parse::<Variant>().ok(), Some(Variant::Dragon));
        assert!(matches!("".parse::<Variant>(), Err(ModelError::MissingVariant)));
        assert!(matches!(
            "griffin".parse::<Variant>(),
            Err(ModelError::UnknownVariant(_))
        ));
    }

    #[test]
    fn decay_table() {
        let d = Variant::Dragon.profile().decay;
        assert_eq!(d.period(StatKind::Hunger), Duration::from_secs(15));
        assert_eq!(d.period(StatKind::Fun), Duration::from_secs(40));
        assert_eq!(
            Variant::Pegasus.profile().decay.grooming,
            Duration::from_secs(10)
        );
        assert_eq!(
            Variant::Phoenix.profile().decay.scaled(0.5).hunger,
            Duration::from_secs(20)
        );
    }

    #[test]
    fn oversized_scale_keeps_periods() {
        let d = Variant::Pegasus.profile().decay;
        assert_eq!(d.scaled(1e30), d);
        assert_eq!(d.scaled(f64::MAX), d);
        assert_eq!(d.scaled(f64::INFINITY), d);
        assert_eq!(d.scaled(-2.0), d);
        // fits in a Duration but not in an Instant; the scheduler caps it
        let huge = d.scaled(1e15);
        assert_eq!(huge.hunger, Duration::from_secs(30_000_000_000_000_000));
    }
}
