//! Policy pack: the program's rule tables, SLA windows and citation sources.
//!
//! A pack is a directory of four JSON documents (`pack.json`, `rules.json`,
//! `sla.json`, `citations.json`). It is loaded once and then shared read-only
//! by the state machine, the oracle and the runner.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::PolicyPackError;
use crate::state_machine::PolicyFacts;

/// Id of the pack embedded in the library.
pub const BUILTIN_PACK_ID: &str = "snap-illinois-fy2026-v1";

const PACK_DOCUMENTS: [&str; 4] = ["pack.json", "rules.json", "sla.json", "citations.json"];

const BUILTIN_PACK_JSON: &str = include_str!("../policy-packs/snap-illinois-fy2026-v1/pack.json");
const BUILTIN_RULES_JSON: &str = include_str!("../policy-packs/snap-illinois-fy2026-v1/rules.json");
const BUILTIN_SLA_JSON: &str = include_str!("../policy-packs/snap-illinois-fy2026-v1/sla.json");
const BUILTIN_CITATIONS_JSON: &str =
    include_str!("../policy-packs/snap-illinois-fy2026-v1/citations.json");

/// Identifying metadata from `pack.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackMeta {
    pub pack_id: String,
    pub program: String,
    pub jurisdiction: String,
    pub version: String,
    pub effective_date: String,
    pub expiration_date: String,
    #[serde(default)]
    pub federal_basis: Option<String>,
    #[serde(default)]
    pub state_manual_url: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

// ---------------------------------------------------------------------------
// rules.json
// ---------------------------------------------------------------------------

/// Numeric program rules from `rules.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyPackRules {
    pub income_tests: IncomeTests,
    pub resource_limits: ResourceLimits,
    pub fpl_table: SizeTable,
    pub max_allotments: AllotmentTable,
    pub deductions: Deductions,
    pub utility_allowances: UtilityAllowances,
    pub benefit_formula: BenefitFormula,
    pub income_conversion: IncomeConversion,
    pub verification: VerificationRules,
    pub notice_requirements: NoticeRequirements,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomeTests {
    pub gross_income_test: GrossIncomeTest,
    pub net_income_test: NetIncomeTest,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrossIncomeTest {
    pub rule_id: String,
    pub threshold_pct_fpl: f64,
    /// Threshold for households with an elderly or disabled member
    #[serde(rename = "thresholdPctFplWithQM")]
    pub threshold_pct_fpl_with_qm: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetIncomeTest {
    pub rule_id: String,
    pub threshold_pct_fpl: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceLimits {
    pub standard: ResourceLimit,
    pub with_qualifying_member: ResourceLimit,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceLimit {
    pub rule_id: String,
    pub limit: f64,
}

/// Monthly amounts keyed by household size, with a per-member increment past
/// the largest tabulated size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SizeTable {
    pub rule_id: String,
    pub monthly_by_household_size: BTreeMap<u32, f64>,
    pub additional_member: f64,
}

impl SizeTable {
    /// Returns the monthly amount for `size`, extrapolating past the table.
    pub fn amount_for(&self, size: u32) -> f64 {
        extrapolate(&self.monthly_by_household_size, self.additional_member, size)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllotmentTable {
    pub rule_id: String,
    pub monthly_by_household_size: BTreeMap<u32, f64>,
    pub additional_member: f64,
    pub minimum_benefit: f64,
    pub minimum_benefit_applies_to: Vec<u32>,
}

impl AllotmentTable {
    /// Maximum monthly allotment for `size`.
    pub fn max_for(&self, size: u32) -> f64 {
        extrapolate(&self.monthly_by_household_size, self.additional_member, size)
    }

    /// True if the minimum benefit floor applies to households of `size`.
    pub fn minimum_applies(&self, size: u32) -> bool {
        self.minimum_benefit_applies_to.contains(&size)
    }
}

fn extrapolate(table: &BTreeMap<u32, f64>, additional: f64, size: u32) -> f64 {
    match table.iter().next_back() {
        Some((&largest, &amount)) if size > largest => {
            amount + additional * f64::from(size - largest)
        }
        // Sizes the table skips, including 0, have no amount
        _ => table.get(&size).copied().unwrap_or(0.0),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deductions {
    pub standard: StandardDeduction,
    pub earned_income: EarnedIncomeDeduction,
    pub medical: MedicalDeduction,
    pub dependent_care: RuleRef,
    pub child_support: RuleRef,
    pub excess_shelter: ExcessShelterDeduction,
    #[serde(default)]
    pub homeless_shelter: Option<RuleRef>,
}

/// A rule that carries no numeric parameters of its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleRef {
    pub rule_id: String,
}

/// Standard deduction keyed by the lowest household size of each bracket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StandardDeduction {
    pub rule_id: String,
    pub by_household_size: BTreeMap<u32, f64>,
}

impl StandardDeduction {
    /// Amount for the bracket containing `size` (1-3 share the first bracket,
    /// the largest bracket covers every bigger household).
    pub fn amount_for(&self, size: u32) -> f64 {
        self.by_household_size
            .range(..=size)
            .next_back()
            .or_else(|| self.by_household_size.iter().next())
            .map(|(_, amount)| *amount)
            .unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EarnedIncomeDeduction {
    pub rule_id: String,
    pub rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicalDeduction {
    pub rule_id: String,
    pub threshold: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExcessShelterDeduction {
    pub rule_id: String,
    pub income_multiplier: f64,
    pub cap: f64,
}

/// Standard utility allowance tier claimed by a household.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SuaTier {
    HeatingCooling,
    LimitedUtility,
    SingleUtility,
    TelephoneOnly,
    None,
}

impl SuaTier {
    pub const ALL: [SuaTier; 5] = [
        SuaTier::HeatingCooling,
        SuaTier::LimitedUtility,
        SuaTier::SingleUtility,
        SuaTier::TelephoneOnly,
        SuaTier::None,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SuaTier::HeatingCooling => "heatingCooling",
            SuaTier::LimitedUtility => "limitedUtility",
            SuaTier::SingleUtility => "singleUtility",
            SuaTier::TelephoneOnly => "telephoneOnly",
            SuaTier::None => "none",
        }
    }
}

impl std::fmt::Display for SuaTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UtilityAllowances {
    pub rule_id: String,
    pub tiers: SuaTiers,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuaTiers {
    pub heating_cooling: f64,
    pub limited_utility: f64,
    pub single_utility: f64,
    pub telephone_only: f64,
}

impl UtilityAllowances {
    /// Monthly allowance for a tier; `none` is always zero.
    pub fn amount_for(&self, tier: SuaTier) -> f64 {
        match tier {
            SuaTier::HeatingCooling => self.tiers.heating_cooling,
            SuaTier::LimitedUtility => self.tiers.limited_utility,
            SuaTier::SingleUtility => self.tiers.single_utility,
            SuaTier::TelephoneOnly => self.tiers.telephone_only,
            SuaTier::None => 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BenefitFormula {
    pub rule_id: String,
    pub contribution_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomeConversion {
    pub rule_id: String,
    pub weekly_multiplier: f64,
    pub biweekly_multiplier: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationRules {
    pub mandatory: VerificationRule,
    pub conditional: VerificationRule,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationRule {
    pub rule_id: String,
    pub items: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoticeRequirements {
    pub approval: NoticeRule,
    pub denial: NoticeRule,
    pub adverse_action: NoticeRule,
    pub verification_request: NoticeRule,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoticeRule {
    pub rule_id: String,
    pub required_fields: Vec<String>,
}

// ---------------------------------------------------------------------------
// sla.json
// ---------------------------------------------------------------------------

/// Calendar-day service windows from `sla.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlaTable {
    pub processing: ProcessingSla,
    pub verification: VerificationSla,
    pub appeals: AppealSla,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingSla {
    pub standard: SlaRule,
    pub expedited: SlaRule,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationSla {
    pub response_window: SlaRule,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppealSla {
    pub filing_deadline: SlaRule,
    pub hearing_notice: SlaRule,
    pub decision: SlaRule,
    pub implement_favorable: SlaRule,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlaRule {
    pub sla_id: String,
    pub description: String,
    pub calendar_days: i64,
    #[serde(default)]
    pub citation: Option<String>,
}

// ---------------------------------------------------------------------------
// citations.json
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CitationSources {
    pub sources: Vec<CitationSource>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CitationSource {
    pub citation_id: String,
    pub title: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub access_date: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

// ---------------------------------------------------------------------------
// PolicyPack
// ---------------------------------------------------------------------------

/// A fully loaded policy pack.
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyPack {
    pub meta: PackMeta,
    pub rules: PolicyPackRules,
    pub sla: SlaTable,
    pub citations: CitationSources,
    rule_index: BTreeSet<String>,
}

impl PolicyPack {
    /// Parses the pack embedded in the library.
    pub fn builtin() -> Result<Self, PolicyPackError> {
        Self::from_documents(
            BUILTIN_PACK_JSON,
            BUILTIN_RULES_JSON,
            BUILTIN_SLA_JSON,
            BUILTIN_CITATIONS_JSON,
        )
    }

    /// Loads a pack from a directory holding the four pack documents.
    pub fn load(dir: impl AsRef<Path>) -> Result<Self, PolicyPackError> {
        let dir = dir.as_ref();
        let mut texts = Vec::with_capacity(PACK_DOCUMENTS.len());

        for document in PACK_DOCUMENTS {
            let path = dir.join(document);
            if !path.is_file() {
                return Err(PolicyPackError::MissingDocument {
                    dir: dir.to_path_buf(),
                    document: document.to_string(),
                });
            }
            let text = std::fs::read_to_string(&path)
                .map_err(|source| PolicyPackError::Io { path, source })?;
            texts.push(text);
        }

        Self::from_documents(&texts[0], &texts[1], &texts[2], &texts[3])
    }

    /// Builds a pack from the raw text of its four documents.
    pub fn from_documents(
        pack_json: &str,
        rules_json: &str,
        sla_json: &str,
        citations_json: &str,
    ) -> Result<Self, PolicyPackError> {
        let pack_doc = parse_document("pack.json", pack_json)?;
        let rules_doc = parse_document("rules.json", rules_json)?;
        let sla_doc = parse_document("sla.json", sla_json)?;
        let citations_doc = parse_document("citations.json", citations_json)?;

        let mut rule_index = BTreeSet::new();
        extract_ids(&rules_doc, "ruleId", &mut rule_index);
        extract_ids(&sla_doc, "slaId", &mut rule_index);
        extract_ids(&citations_doc, "citationId", &mut rule_index);

        Ok(Self {
            meta: typed("pack.json", pack_doc)?,
            rules: typed("rules.json", rules_doc)?,
            sla: typed("sla.json", sla_doc)?,
            citations: typed("citations.json", citations_doc)?,
            rule_index,
        })
    }

    /// Pack id, e.g. `snap-illinois-fy2026-v1`.
    pub fn id(&self) -> &str {
        &self.meta.pack_id
    }

    /// Every `ruleId`, `slaId` and `citationId` declared by the pack.
    pub fn rule_index(&self) -> &BTreeSet<String> {
        &self.rule_index
    }

    /// Read-only view handed to the state machine.
    pub fn facts(&self) -> PolicyFacts<'_> {
        PolicyFacts {
            sla: &self.sla,
            rule_index: &self.rule_index,
        }
    }
}

fn parse_document(document: &str, text: &str) -> Result<Value, PolicyPackError> {
    serde_json::from_str(text).map_err(|e| PolicyPackError::parse(document, e))
}

fn typed<T: serde::de::DeserializeOwned>(document: &str, value: Value) -> Result<T, PolicyPackError> {
    serde_json::from_value(value).map_err(|e| PolicyPackError::parse(document, e))
}

/// Collects every string stored under `id_key` anywhere in a JSON document.
fn extract_ids(value: &Value, id_key: &str, out: &mut BTreeSet<String>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                match child {
                    Value::String(id) if key == id_key => {
                        out.insert(id.clone());
                    }
                    _ => extract_ids(child, id_key, out),
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                extract_ids(item, id_key, out);
            }
        }
        _ => {}
    }
}
