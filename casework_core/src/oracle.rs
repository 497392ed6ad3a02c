//! Eligibility oracle.
//!
//! [`compute_eligibility`] is a pure function of an [`OracleInput`] and the
//! pack's rules. It runs a fixed sixteen-step pipeline and records every step
//! so a reviewer can replay the arithmetic. Disqualification is a normal
//! result (`Determination::Ineligible`), never an error.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::policy_pack::{PolicyPackRules, SuaTier};

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CitizenshipStatus {
    Citizen,
    QualifiedAlien,
    Ineligible,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HouseholdMember {
    pub age: u32,
    pub is_disabled: bool,
    pub is_student: bool,
    pub citizenship_status: CitizenshipStatus,
}

impl HouseholdMember {
    /// A non-disabled citizen adult of the given age.
    pub fn adult(age: u32) -> Self {
        Self {
            age,
            is_disabled: false,
            is_student: false,
            citizenship_status: CitizenshipStatus::Citizen,
        }
    }

    pub fn is_elderly_or_disabled(&self) -> bool {
        self.age >= 60 || self.is_disabled
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncomeType {
    Earned,
    Unearned,
    Excluded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncomeFrequency {
    Weekly,
    Biweekly,
    Monthly,
    Annual,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncomeItem {
    #[serde(rename = "type")]
    pub kind: IncomeType,
    pub amount: f64,
    pub frequency: IncomeFrequency,
    pub source: String,
    pub verified: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceItem {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: f64,
    pub countable: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShelterCosts {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rent: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mortgage: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property_tax: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insurance: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condo_fees: Option<f64>,
    pub sua_tier: SuaTier,
}

impl Default for ShelterCosts {
    fn default() -> Self {
        Self {
            rent: None,
            mortgage: None,
            property_tax: None,
            insurance: None,
            condo_fees: None,
            sua_tier: SuaTier::None,
        }
    }
}

/// Household facts the oracle evaluates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OracleInput {
    pub household_size: u32,
    pub household_members: Vec<HouseholdMember>,
    pub income: Vec<IncomeItem>,
    pub resources: Vec<ResourceItem>,
    pub shelter_costs: ShelterCosts,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub medical_expenses: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependent_care_costs: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub child_support_paid: Option<f64>,
    pub application_date: NaiveDate,
    pub policy_pack_id: String,
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedTest {
    pub test_name: String,
    pub rule_id: String,
    pub reason: String,
    pub actual: f64,
    pub limit: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShelterCostDetail {
    pub rent: f64,
    pub mortgage: f64,
    pub property_tax: f64,
    pub insurance: f64,
    pub condo_fees: f64,
    pub sua_tier: SuaTier,
    pub sua_amount: f64,
    pub total_shelter_costs: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeductionBreakdown {
    pub standard_deduction: f64,
    pub earned_income_deduction: f64,
    pub dependent_care_deduction: f64,
    pub child_support_deduction: f64,
    pub medical_deduction: f64,
    pub excess_shelter_deduction: f64,
    pub total_deductions: f64,
    pub shelter_cost_detail: ShelterCostDetail,
}

/// A recorded value in a calculation step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StepValue {
    Flag(bool),
    Number(f64),
    Text(String),
}

impl From<f64> for StepValue {
    fn from(v: f64) -> Self {
        StepValue::Number(v)
    }
}

impl From<u32> for StepValue {
    fn from(v: u32) -> Self {
        StepValue::Number(f64::from(v))
    }
}

impl From<usize> for StepValue {
    fn from(v: usize) -> Self {
        StepValue::Number(v as f64)
    }
}

impl From<i64> for StepValue {
    fn from(v: i64) -> Self {
        StepValue::Number(v as f64)
    }
}

impl From<bool> for StepValue {
    fn from(v: bool) -> Self {
        StepValue::Flag(v)
    }
}

impl From<&str> for StepValue {
    fn from(v: &str) -> Self {
        StepValue::Text(v.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculationStep {
    pub step_number: u32,
    pub description: String,
    pub rule_id: String,
    pub inputs: BTreeMap<String, StepValue>,
    pub output: StepValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formula: Option<String>,
}

/// Final eligibility verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Determination {
    Eligible {
        benefit_amount: i64,
        /// Expedited (7-day) screening under SLA-PROC-002 is not computed;
        /// always false
        #[serde(default)]
        expedited_eligible: bool,
    },
    Ineligible {
        reason: String,
        failed_tests: Vec<FailedTest>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OracleOutput {
    pub determination: Determination,
    pub gross_income: f64,
    pub net_income: f64,
    /// Absent when the pipeline stopped before the deduction stack
    pub deductions: Option<DeductionBreakdown>,
    pub calculation_steps: Vec<CalculationStep>,
    pub cited_rules: Vec<String>,
}

impl OracleOutput {
    pub fn eligible(&self) -> bool {
        matches!(self.determination, Determination::Eligible { .. })
    }

    /// Monthly benefit; 0 when ineligible.
    pub fn benefit_amount(&self) -> i64 {
        match self.determination {
            Determination::Eligible { benefit_amount, .. } => benefit_amount,
            Determination::Ineligible { .. } => 0,
        }
    }

    pub fn expedited_eligible(&self) -> bool {
        matches!(
            self.determination,
            Determination::Eligible {
                expedited_eligible: true,
                ..
            }
        )
    }

    pub fn failed_tests(&self) -> &[FailedTest] {
        match &self.determination {
            Determination::Eligible { .. } => &[],
            Determination::Ineligible { failed_tests, .. } => failed_tests,
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match &self.determination {
            Determination::Eligible { .. } => None,
            Determination::Ineligible { reason, .. } => Some(reason),
        }
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Step log and cited-rule accumulator for one evaluation.
struct Trace {
    steps: Vec<CalculationStep>,
    cited: Vec<String>,
}

impl Trace {
    fn new() -> Self {
        Self {
            steps: Vec::with_capacity(16),
            cited: Vec::new(),
        }
    }

    fn cite(&mut self, rule_id: &str) {
        if !self.cited.iter().any(|r| r == rule_id) {
            self.cited.push(rule_id.to_string());
        }
    }

    fn step(
        &mut self,
        description: impl Into<String>,
        rule_id: &str,
        inputs: Vec<(&str, StepValue)>,
        output: impl Into<StepValue>,
        formula: Option<String>,
    ) {
        self.steps.push(CalculationStep {
            step_number: self.steps.len() as u32 + 1,
            description: description.into(),
            rule_id: rule_id.to_string(),
            inputs: inputs
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
            output: output.into(),
            formula,
        });
    }

    fn ineligible(
        self,
        reason: String,
        failed_tests: Vec<FailedTest>,
        gross_income: f64,
        net_income: f64,
        deductions: Option<DeductionBreakdown>,
    ) -> OracleOutput {
        OracleOutput {
            determination: Determination::Ineligible {
                reason,
                failed_tests,
            },
            gross_income,
            net_income,
            deductions,
            calculation_steps: self.steps,
            cited_rules: self.cited,
        }
    }
}

/// Converts an income amount to its monthly equivalent.
pub fn to_monthly(amount: f64, frequency: IncomeFrequency, rules: &PolicyPackRules) -> f64 {
    let conversion = &rules.income_conversion;
    match frequency {
        IncomeFrequency::Weekly => amount * conversion.weekly_multiplier,
        IncomeFrequency::Biweekly => amount * conversion.biweekly_multiplier,
        IncomeFrequency::Annual => amount / 12.0,
        IncomeFrequency::Monthly => amount,
    }
}

/// floor(FPL(size) * pct / 100).
pub fn fpl_threshold(household_size: u32, pct_fpl: f64, rules: &PolicyPackRules) -> f64 {
    (rules.fpl_table.amount_for(household_size) * pct_fpl / 100.0).floor()
}

/// Computes eligibility and benefit for one household.
pub fn compute_eligibility(input: &OracleInput, rules: &PolicyPackRules) -> OracleOutput {
    let mut trace = Trace::new();
    let gross_rule = rules.income_tests.gross_income_test.rule_id.as_str();

    // 1. household classification
    let elderly_or_disabled = input
        .household_members
        .iter()
        .any(HouseholdMember::is_elderly_or_disabled);
    trace.step(
        "Classify household (elderly/disabled)",
        gross_rule,
        vec![
            ("memberCount", input.household_members.len().into()),
            ("hasElderlyOrDisabled", elderly_or_disabled.into()),
        ],
        elderly_or_disabled,
        Some("any member age >= 60 OR isDisabled".to_string()),
    );
    trace.cite(gross_rule);

    // 2. monthly conversion
    let mut gross_earned = 0.0;
    let mut gross_unearned = 0.0;
    let (mut earned_items, mut unearned_items, mut excluded_items) = (0usize, 0usize, 0usize);
    for item in &input.income {
        match item.kind {
            IncomeType::Excluded => excluded_items += 1,
            IncomeType::Earned => {
                earned_items += 1;
                gross_earned += to_monthly(item.amount, item.frequency, rules);
            }
            IncomeType::Unearned => {
                unearned_items += 1;
                gross_unearned += to_monthly(item.amount, item.frequency, rules);
            }
        }
    }
    let conversion = &rules.income_conversion;
    trace.cite(&conversion.rule_id);
    trace.step(
        "Convert all income to monthly amounts",
        &conversion.rule_id,
        vec![
            ("earnedItems", earned_items.into()),
            ("unearnedItems", unearned_items.into()),
            ("excludedItems", excluded_items.into()),
        ],
        gross_earned + gross_unearned,
        Some(format!(
            "weekly * {}, biweekly * {}, annual / 12",
            conversion.weekly_multiplier, conversion.biweekly_multiplier
        )),
    );

    // 3. gross income
    let gross_income = gross_earned + gross_unearned;
    trace.step(
        "Calculate gross monthly income",
        gross_rule,
        vec![
            ("grossEarned", gross_earned.into()),
            ("grossUnearned", gross_unearned.into()),
        ],
        gross_income,
        Some("grossEarned + grossUnearned".to_string()),
    );

    // 4. resource test
    let total_resources: f64 = input
        .resources
        .iter()
        .filter(|r| r.countable)
        .map(|r| r.value)
        .sum();
    let resource_rule = if elderly_or_disabled {
        &rules.resource_limits.with_qualifying_member
    } else {
        &rules.resource_limits.standard
    };
    trace.cite(&resource_rule.rule_id);
    let resources_ok = total_resources <= resource_rule.limit;
    trace.step(
        "Resource test",
        &resource_rule.rule_id,
        vec![
            ("totalResources", total_resources.into()),
            ("resourceLimit", resource_rule.limit.into()),
        ],
        resources_ok,
        Some("totalCountableResources <= limit".to_string()),
    );
    if !resources_ok {
        let failed = FailedTest {
            test_name: "Resource Test".to_string(),
            rule_id: resource_rule.rule_id.clone(),
            reason: format!(
                "Countable resources (${}) exceed limit (${})",
                total_resources, resource_rule.limit
            ),
            actual: total_resources,
            limit: resource_rule.limit,
        };
        let reason = format!(
            "Resources (${}) exceed limit (${})",
            total_resources, resource_rule.limit
        );
        return trace.ineligible(reason, vec![failed], gross_income, 0.0, None);
    }

    // 5. gross income test
    let gross_test = &rules.income_tests.gross_income_test;
    let gross_pct = if elderly_or_disabled {
        gross_test.threshold_pct_fpl_with_qm
    } else {
        gross_test.threshold_pct_fpl
    };
    let gross_limit = fpl_threshold(input.household_size, gross_pct, rules);
    trace.cite(gross_rule);
    trace.cite(&rules.fpl_table.rule_id);
    let gross_ok = gross_income <= gross_limit;
    trace.step(
        format!("Gross income test ({}% FPL)", gross_pct),
        gross_rule,
        vec![
            ("grossIncome", gross_income.into()),
            ("grossIncomeLimit", gross_limit.into()),
            ("pctFpl", gross_pct.into()),
        ],
        gross_ok,
        Some(format!("grossIncome <= FPL * {}%", gross_pct)),
    );
    if !gross_ok {
        let failed = FailedTest {
            test_name: "Gross Income Test".to_string(),
            rule_id: gross_rule.to_string(),
            reason: format!(
                "Gross income (${}) exceeds {}% FPL limit (${})",
                gross_income, gross_pct, gross_limit
            ),
            actual: gross_income,
            limit: gross_limit,
        };
        let reason = format!(
            "Gross income (${}) exceeds {}% FPL (${})",
            gross_income, gross_pct, gross_limit
        );
        return trace.ineligible(reason, vec![failed], gross_income, 0.0, None);
    }

    let deductions = &rules.deductions;

    // 6. standard deduction
    let standard_deduction = deductions.standard.amount_for(input.household_size);
    trace.cite(&deductions.standard.rule_id);
    trace.step(
        "Apply standard deduction",
        &deductions.standard.rule_id,
        vec![("householdSize", input.household_size.into())],
        standard_deduction,
        Some("lookup by household size bracket".to_string()),
    );

    // 7. earned income deduction
    let earned_rate = deductions.earned_income.rate;
    let earned_income_deduction = (gross_earned * earned_rate).floor();
    trace.cite(&deductions.earned_income.rule_id);
    trace.step(
        format!("Earned income deduction ({}%)", earned_rate * 100.0),
        &deductions.earned_income.rule_id,
        vec![
            ("grossEarned", gross_earned.into()),
            ("rate", earned_rate.into()),
        ],
        earned_income_deduction,
        Some(format!("floor(grossEarned * {})", earned_rate)),
    );

    // 8. dependent care
    let dependent_care_deduction = input.dependent_care_costs.unwrap_or(0.0);
    trace.cite(&deductions.dependent_care.rule_id);
    trace.step(
        "Dependent care deduction",
        &deductions.dependent_care.rule_id,
        vec![("dependentCareCosts", dependent_care_deduction.into())],
        dependent_care_deduction,
        None,
    );

    // 9. child support
    let child_support_deduction = input.child_support_paid.unwrap_or(0.0);
    trace.cite(&deductions.child_support.rule_id);
    trace.step(
        "Child support deduction",
        &deductions.child_support.rule_id,
        vec![("childSupportPaid", child_support_deduction.into())],
        child_support_deduction,
        None,
    );

    // 10. medical (elderly/disabled only)
    let medical_expenses = input.medical_expenses.unwrap_or(0.0);
    let medical_threshold = deductions.medical.threshold;
    let medical_deduction = if elderly_or_disabled && medical_expenses > 0.0 {
        (medical_expenses - medical_threshold).max(0.0)
    } else {
        0.0
    };
    trace.cite(&deductions.medical.rule_id);
    trace.step(
        "Medical deduction (elderly/disabled only)",
        &deductions.medical.rule_id,
        vec![
            ("medicalExpenses", medical_expenses.into()),
            ("threshold", medical_threshold.into()),
            ("hasElderlyOrDisabled", elderly_or_disabled.into()),
        ],
        medical_deduction,
        Some(format!("max(0, medicalExpenses - {})", medical_threshold)),
    );

    // 11. excess shelter
    let adjusted_pre_shelter = gross_income
        - standard_deduction
        - earned_income_deduction
        - dependent_care_deduction
        - child_support_deduction
        - medical_deduction;

    let shelter = &input.shelter_costs;
    let sua_amount = rules.utility_allowances.amount_for(shelter.sua_tier);
    trace.cite(&rules.utility_allowances.rule_id);

    let mut detail = ShelterCostDetail {
        rent: shelter.rent.unwrap_or(0.0),
        mortgage: shelter.mortgage.unwrap_or(0.0),
        property_tax: shelter.property_tax.unwrap_or(0.0),
        insurance: shelter.insurance.unwrap_or(0.0),
        condo_fees: shelter.condo_fees.unwrap_or(0.0),
        sua_tier: shelter.sua_tier,
        sua_amount,
        total_shelter_costs: 0.0,
    };
    detail.total_shelter_costs = detail.rent
        + detail.mortgage
        + detail.property_tax
        + detail.insurance
        + detail.condo_fees
        + detail.sua_amount;

    let shelter_rule = &deductions.excess_shelter;
    let income_share = adjusted_pre_shelter * shelter_rule.income_multiplier;
    let mut excess_shelter = (detail.total_shelter_costs - income_share).max(0.0);
    if !elderly_or_disabled {
        excess_shelter = excess_shelter.min(shelter_rule.cap);
    }
    trace.cite(&shelter_rule.rule_id);
    trace.step(
        "Excess shelter deduction",
        &shelter_rule.rule_id,
        vec![
            ("totalShelterCosts", detail.total_shelter_costs.into()),
            ("halfAdjustedIncome", income_share.into()),
            ("cap", shelter_rule.cap.into()),
            ("hasElderlyOrDisabled", elderly_or_disabled.into()),
        ],
        excess_shelter,
        Some(format!(
            "max(0, totalShelter - {} * adjustedIncome); capped at {} if not elderly/disabled",
            shelter_rule.income_multiplier, shelter_rule.cap
        )),
    );

    // 12. net income
    let total_deductions = standard_deduction
        + earned_income_deduction
        + dependent_care_deduction
        + child_support_deduction
        + medical_deduction
        + excess_shelter;
    let net_income = (gross_income - total_deductions).max(0.0);
    let net_rule = rules.income_tests.net_income_test.rule_id.as_str();
    trace.cite(net_rule);
    trace.step(
        "Calculate net income",
        net_rule,
        vec![
            ("grossIncome", gross_income.into()),
            ("totalDeductions", total_deductions.into()),
        ],
        net_income,
        Some("max(0, grossIncome - totalDeductions)".to_string()),
    );

    let breakdown = DeductionBreakdown {
        standard_deduction,
        earned_income_deduction,
        dependent_care_deduction,
        child_support_deduction,
        medical_deduction,
        excess_shelter_deduction: excess_shelter,
        total_deductions,
        shelter_cost_detail: detail,
    };

    // 13. net income test
    let net_pct = rules.income_tests.net_income_test.threshold_pct_fpl;
    let net_limit = fpl_threshold(input.household_size, net_pct, rules);
    let net_ok = net_income <= net_limit;
    trace.step(
        format!("Net income test ({}% FPL)", net_pct),
        net_rule,
        vec![
            ("netIncome", net_income.into()),
            ("netIncomeLimit", net_limit.into()),
        ],
        net_ok,
        Some(format!("netIncome <= FPL * {}%", net_pct)),
    );
    if !net_ok {
        let failed = FailedTest {
            test_name: "Net Income Test".to_string(),
            rule_id: net_rule.to_string(),
            reason: format!(
                "Net income (${}) exceeds {}% FPL limit (${})",
                net_income, net_pct, net_limit
            ),
            actual: net_income,
            limit: net_limit,
        };
        let reason = format!(
            "Net income (${}) exceeds {}% FPL (${})",
            net_income, net_pct, net_limit
        );
        return trace.ineligible(reason, vec![failed], gross_income, net_income, Some(breakdown));
    }

    // 14. benefit
    let allotments = &rules.max_allotments;
    let formula = &rules.benefit_formula;
    let max_allotment = allotments.max_for(input.household_size);
    trace.cite(&allotments.rule_id);
    trace.cite(&formula.rule_id);
    let mut benefit = (max_allotment - formula.contribution_rate * net_income).floor();
    trace.step(
        "Calculate benefit amount",
        &formula.rule_id,
        vec![
            ("maxAllotment", max_allotment.into()),
            ("contributionRate", formula.contribution_rate.into()),
            ("netIncome", net_income.into()),
        ],
        benefit,
        Some(format!(
            "floor(maxAllotment - {} * netIncome)",
            formula.contribution_rate
        )),
    );

    // 15. minimum benefit
    let minimum_applies = allotments.minimum_applies(input.household_size);
    if minimum_applies && benefit > 0.0 && benefit < allotments.minimum_benefit {
        benefit = allotments.minimum_benefit;
    }
    trace.step(
        "Apply minimum benefit rule",
        &allotments.rule_id,
        vec![
            ("benefitAmount", benefit.into()),
            ("minimumBenefit", allotments.minimum_benefit.into()),
            ("householdSize", input.household_size.into()),
            ("minBenefitApplies", minimum_applies.into()),
        ],
        benefit,
        Some(format!(
            "if household size in {:?} and 0 < benefit < {}, set to {}",
            allotments.minimum_benefit_applies_to,
            allotments.minimum_benefit,
            allotments.minimum_benefit
        )),
    );

    // 16. final determination
    let eligible = benefit > 0.0;
    trace.step(
        "Final eligibility determination",
        &formula.rule_id,
        vec![("benefitAmount", benefit.into())],
        eligible,
        Some("benefit > 0".to_string()),
    );

    if !eligible {
        return trace.ineligible(
            "Calculated benefit is $0 or less".to_string(),
            Vec::new(),
            gross_income,
            net_income,
            Some(breakdown),
        );
    }

    OracleOutput {
        determination: Determination::Eligible {
            benefit_amount: benefit as i64,
            expedited_eligible: false,
        },
        gross_income,
        net_income,
        deductions: Some(breakdown),
        calculation_steps: trace.steps,
        cited_rules: trace.cited,
    }
}
