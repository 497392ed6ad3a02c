//! Seeded synthetic case generator.
//!
//! Every draw comes from one `ChaCha8Rng` seeded with the caller's seed, in a
//! fixed order per case, so the same (scenario, count, seed) always yields an
//! identical population.

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use casework_core::oracle::{
    CitizenshipStatus, HouseholdMember, IncomeFrequency, IncomeItem, IncomeType, ResourceItem,
    ShelterCosts,
};
use casework_core::types::{add_days, simulation_epoch};
use casework_core::{OracleInput, SuaTier, BUILTIN_PACK_ID};

use crate::scenarios::{AppealVariant, CaseProfile, MissingDocsVariant, ScenarioId};

const FIRST_NAMES: [&str; 20] = [
    "Maria", "James", "Patricia", "Robert", "Linda",
    "Michael", "Barbara", "William", "Elizabeth", "David",
    "Jennifer", "Richard", "Susan", "Joseph", "Jessica",
    "Thomas", "Sarah", "Charles", "Karen", "Daniel",
];

const LAST_NAMES: [&str; 20] = [
    "Garcia", "Smith", "Johnson", "Williams", "Brown",
    "Jones", "Davis", "Martinez", "Rodriguez", "Wilson",
    "Anderson", "Taylor", "Thomas", "Moore", "Jackson",
    "Martin", "Lee", "Perez", "Thompson", "White",
];

/// Items a missing-docs case may be asked to verify.
pub const VERIFICATION_ITEMS: [&str; 5] = ["identity", "residency", "income", "citizenship", "resources"];

/// Required (and initially missing) items for every appeal case.
pub const APPEAL_VERIFICATIONS: [&str; 3] = ["identity", "income", "residency"];

pub const DENIAL_REASONS: [&str; 5] = [
    "Gross income exceeds 130% FPL",
    "Net income exceeds 100% FPL",
    "Countable resources exceed limit",
    "Failed to meet work requirements",
    "Incomplete verification within deadline",
];

pub const APPEAL_REASONS: [&str; 6] = [
    "Income was miscalculated",
    "Verification documents were submitted but not processed",
    "Household composition was incorrect",
    "Medical expenses were not properly deducted",
    "Work requirement exemption should apply",
    "Shelter costs were not fully accounted for",
];

/// Earned-income frequencies and the divisor applied to the monthly amount.
const FREQUENCIES: [(IncomeFrequency, f64); 3] = [
    (IncomeFrequency::Monthly, 1.0),
    (IncomeFrequency::Biweekly, 2.15),
    (IncomeFrequency::Weekly, 4.3),
];

/// Days after the simulation epoch the application is dated.
const APPLICATION_DAY: i64 = 14;

/// One generated case, ready for the runner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyntheticCase {
    /// Position in the generated batch
    pub case_index: usize,

    pub applicant_name: String,

    /// 1 to 6 members
    pub household_size: u32,

    pub required_verifications: Vec<String>,

    /// Subset of `required_verifications` outstanding at intake
    pub missing_items: Vec<String>,

    /// Scenario variant and its scenario-specific details
    pub profile: CaseProfile,

    /// Financial facts for the oracle
    pub oracle_input: OracleInput,
}

/// Generates `count` cases for `scenario` from `seed`.
pub fn generate(scenario: ScenarioId, count: usize, seed: u64) -> Vec<SyntheticCase> {
    match scenario {
        ScenarioId::MissingDocs => generate_missing_docs_cases(count, seed),
        ScenarioId::AppealReversal => generate_appeal_reversal_cases(count, seed),
    }
}

/// Generates missing-docs cases.
pub fn generate_missing_docs_cases(count: usize, seed: u64) -> Vec<SyntheticCase> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);

    (0..count)
        .map(|case_index| {
            let applicant_name = draw_name(&mut rng);
            let household_size = rng.gen_range(1..=6u32);

            let required_count = rng.gen_range(2..=4usize);
            let mut pool = VERIFICATION_ITEMS;
            pool.shuffle(&mut rng);
            let required: Vec<String> = pool[..required_count]
                .iter()
                .map(|s| s.to_string())
                .collect();

            let missing_count = rng.gen_range(1..=2usize);
            let mut missing = required.clone();
            missing.shuffle(&mut rng);
            missing.truncate(missing_count);

            let variant = MissingDocsVariant::from_roll(rng.gen::<f64>());
            let oracle_input = draw_oracle_input(&mut rng, household_size, false);

            SyntheticCase {
                case_index,
                applicant_name,
                household_size,
                required_verifications: required,
                missing_items: missing,
                profile: CaseProfile::MissingDocs { variant },
                oracle_input,
            }
        })
        .collect()
}

/// Generates appeal-reversal cases.
pub fn generate_appeal_reversal_cases(count: usize, seed: u64) -> Vec<SyntheticCase> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);

    (0..count)
        .map(|case_index| {
            let applicant_name = draw_name(&mut rng);
            let household_size = rng.gen_range(1..=6u32);

            let variant = AppealVariant::from_roll(rng.gen::<f64>());
            let denial_reason = pick(&mut rng, &DENIAL_REASONS).to_string();
            let appeal_reason = pick(&mut rng, &APPEAL_REASONS).to_string();

            // Upheld denials get incomes the oracle also rejects
            let high_income = variant == AppealVariant::UnfavorableUpheld;
            let oracle_input = draw_oracle_input(&mut rng, household_size, high_income);

            let verifications: Vec<String> =
                APPEAL_VERIFICATIONS.iter().map(|s| s.to_string()).collect();

            SyntheticCase {
                case_index,
                applicant_name,
                household_size,
                required_verifications: verifications.clone(),
                missing_items: verifications,
                profile: CaseProfile::AppealReversal {
                    variant,
                    denial_reason,
                    appeal_reason,
                },
                oracle_input,
            }
        })
        .collect()
}

fn pick<'a, T, R: Rng>(rng: &mut R, items: &'a [T]) -> &'a T {
    &items[rng.gen_range(0..items.len())]
}

fn draw_name<R: Rng>(rng: &mut R) -> String {
    let first = pick(rng, &FIRST_NAMES);
    let last = pick(rng, &LAST_NAMES);
    format!("{} {}", first, last)
}

fn roll<R: Rng>(rng: &mut R, p: f64) -> bool {
    rng.gen::<f64>() < p
}

/// Draws household financials. `high_income` puts earnings at $3000-5000 a
/// month, otherwise $400-1600.
fn draw_oracle_input<R: Rng>(rng: &mut R, household_size: u32, high_income: bool) -> OracleInput {
    let members: Vec<HouseholdMember> = (0..household_size)
        .map(|i| {
            let age = if i == 0 {
                rng.gen_range(18..=67u32)
            } else {
                rng.gen_range(1..=80u32)
            };
            let is_disabled = roll(rng, 0.08);
            let is_student = (18..=24).contains(&age) && roll(rng, 0.15);
            HouseholdMember {
                age,
                is_disabled,
                is_student,
                citizenship_status: CitizenshipStatus::Citizen,
            }
        })
        .collect();

    let (frequency, divisor) = *pick(rng, &FREQUENCIES);
    let monthly_equivalent = if high_income {
        rng.gen_range(3000..=5000u32)
    } else {
        rng.gen_range(400..=1600u32)
    };
    let mut income = vec![IncomeItem {
        kind: IncomeType::Earned,
        amount: (f64::from(monthly_equivalent) / divisor).round(),
        frequency,
        source: "employment".to_string(),
        verified: true,
    }];
    if roll(rng, 0.25) {
        income.push(IncomeItem {
            kind: IncomeType::Unearned,
            amount: f64::from(rng.gen_range(100..=500u32)),
            frequency: IncomeFrequency::Monthly,
            source: "benefits".to_string(),
            verified: true,
        });
    }

    let mut resources = Vec::new();
    if roll(rng, 0.20) {
        resources.push(ResourceItem {
            kind: "savings".to_string(),
            value: f64::from(rng.gen_range(0..=3000u32)),
            countable: true,
        });
    }

    let sua_tier = *pick(rng, &SuaTier::ALL);
    let rent = if roll(rng, 0.75) {
        Some(f64::from(rng.gen_range(400..=1600u32)))
    } else {
        None
    };
    let shelter_costs = ShelterCosts {
        rent,
        sua_tier,
        ..ShelterCosts::default()
    };

    let elderly_or_disabled = members.iter().any(HouseholdMember::is_elderly_or_disabled);
    let medical_expenses = if elderly_or_disabled && roll(rng, 0.40) {
        Some(f64::from(rng.gen_range(35..=335u32)))
    } else {
        None
    };

    let has_young_children = members.iter().any(|m| m.age < 13);
    let dependent_care_costs = if has_young_children && roll(rng, 0.30) {
        Some(f64::from(rng.gen_range(50..=550u32)))
    } else {
        None
    };

    let child_support_paid = if roll(rng, 0.10) {
        Some(f64::from(rng.gen_range(50..=450u32)))
    } else {
        None
    };

    OracleInput {
        household_size,
        household_members: members,
        income,
        resources,
        shelter_costs,
        medical_expenses,
        dependent_care_costs,
        child_support_paid,
        application_date: add_days(simulation_epoch(), APPLICATION_DAY).date_naive(),
        policy_pack_id: BUILTIN_PACK_ID.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use casework_core::oracle::to_monthly;
    use casework_core::PolicyPack;
    use proptest::prelude::*;

    fn earned_monthly(case: &SyntheticCase) -> f64 {
        let rules = PolicyPack::builtin().unwrap().rules;
        let item = &case.oracle_input.income[0];
        to_monthly(item.amount, item.frequency, &rules)
    }

    #[test]
    fn test_same_seed_same_cases() {
        for scenario in ScenarioId::all() {
            assert_eq!(generate(scenario, 50, 42), generate(scenario, 50, 42));
        }
    }

    #[test]
    fn test_different_seeds_differ() {
        for scenario in ScenarioId::all() {
            assert_ne!(generate(scenario, 20, 1), generate(scenario, 20, 2));
        }
    }

    #[test]
    fn test_missing_docs_shape() {
        let cases = generate_missing_docs_cases(200, 7);
        assert_eq!(cases.len(), 200);
        for (i, case) in cases.iter().enumerate() {
            assert_eq!(case.case_index, i);
            assert!((1..=6).contains(&case.household_size));
            assert!((2..=4).contains(&case.required_verifications.len()));
            assert!((1..=2).contains(&case.missing_items.len()));
            for item in &case.missing_items {
                assert!(case.required_verifications.contains(item));
            }
            assert_eq!(case.oracle_input.household_members.len(), case.household_size as usize);
            assert!(matches!(case.profile, CaseProfile::MissingDocs { .. }));
            let monthly = earned_monthly(case);
            assert!(monthly > 390.0 && monthly < 1610.0, "monthly {}", monthly);
        }
    }

    #[test]
    fn test_appeal_shape() {
        let cases = generate_appeal_reversal_cases(200, 11);
        for case in &cases {
            let CaseProfile::AppealReversal {
                variant,
                denial_reason,
                appeal_reason,
            } = &case.profile
            else {
                panic!("wrong profile");
            };
            assert!(DENIAL_REASONS.contains(&denial_reason.as_str()));
            assert!(APPEAL_REASONS.contains(&appeal_reason.as_str()));
            assert_eq!(case.required_verifications, APPEAL_VERIFICATIONS);
            let monthly = earned_monthly(case);
            if *variant == AppealVariant::UnfavorableUpheld {
                assert!(monthly >= 2990.0, "monthly {}", monthly);
            } else {
                assert!(monthly <= 1610.0, "monthly {}", monthly);
            }
        }
    }

    #[test]
    fn test_variant_mix_is_roughly_weighted() {
        let cases = generate_missing_docs_cases(2000, 42);
        let on_time = cases
            .iter()
            .filter(|c| c.profile == CaseProfile::MissingDocs { variant: MissingDocsVariant::DocsArriveOnTime })
            .count() as f64
            / 2000.0;
        assert!((0.35..0.45).contains(&on_time), "on-time share {}", on_time);
    }

    proptest! {
        #[test]
        fn prop_generation_is_deterministic(seed in any::<u64>(), count in 0usize..30) {
            prop_assert_eq!(
                generate(ScenarioId::MissingDocs, count, seed),
                generate(ScenarioId::MissingDocs, count, seed)
            );
        }

        #[test]
        fn prop_prefix_stable(seed in any::<u64>()) {
            let long = generate(ScenarioId::AppealReversal, 10, seed);
            let short = generate(ScenarioId::AppealReversal, 4, seed);
            prop_assert_eq!(&long[..4], &short[..]);
        }
    }
}
