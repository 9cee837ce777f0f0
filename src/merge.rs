//! Merge policy for writing a freshly extracted record over a catalog record.
//!
//! Two rules run over every protected field:
//! - loss prevention: a value the catalog already holds is never replaced by an absent one;
//! - human precedence: on curated records the catalog value wins outright.
//!
//! A value is present when it is `Some` non-blank text, `Some` of any bool, any other `Some`,
//! or a non-empty collection. Fields the record does not model are carried by key under
//! the same two rules.

use serde_json::Value;

use crate::error::{DataIntegrityViolation, LostField};
use crate::model::{CanonicalJobRecord, SourceType};

/// Bump when the protected set changes.
pub const PROTECTED_FIELDS_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtectedField {
    Industry,
    Category,
    Tags,
    EmploymentType,
    ExperienceLevel,
    Salary,
    Region,
    Location,
    Timezone,
    IsManuallyEdited,
    IsApproved,
    IsFeatured,
    CanRefer,
    Status,
    SourceType,
    RiskRating,
    AdminComment,
    Translations,
    IsTranslated,
    TranslatedAt,
}

pub const PROTECTED_FIELDS: [ProtectedField; 20] = [
    ProtectedField::Industry,
    ProtectedField::Category,
    ProtectedField::Tags,
    ProtectedField::EmploymentType,
    ProtectedField::ExperienceLevel,
    ProtectedField::Salary,
    ProtectedField::Region,
    ProtectedField::Location,
    ProtectedField::Timezone,
    ProtectedField::IsManuallyEdited,
    ProtectedField::IsApproved,
    ProtectedField::IsFeatured,
    ProtectedField::CanRefer,
    ProtectedField::Status,
    ProtectedField::SourceType,
    ProtectedField::RiskRating,
    ProtectedField::AdminComment,
    ProtectedField::Translations,
    ProtectedField::IsTranslated,
    ProtectedField::TranslatedAt,
];

/// Fields whose loss aborts a write instead of being repaired.
pub const CRITICAL_FIELDS: [ProtectedField; 3] = [
    ProtectedField::Industry,
    ProtectedField::IsApproved,
    ProtectedField::SourceType,
];

fn has_text(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.trim().is_empty())
}

fn has_value(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
        Value::Bool(_) | Value::Number(_) => true,
    }
}

impl ProtectedField {
    pub fn name(&self) -> &'static str {
        match self {
            ProtectedField::Industry => "industry",
            ProtectedField::Category => "category",
            ProtectedField::Tags => "tags",
            ProtectedField::EmploymentType => "employmentType",
            ProtectedField::ExperienceLevel => "experienceLevel",
            ProtectedField::Salary => "salary",
            ProtectedField::Region => "region",
            ProtectedField::Location => "location",
            ProtectedField::Timezone => "timezone",
            ProtectedField::IsManuallyEdited => "isManuallyEdited",
            ProtectedField::IsApproved => "isApproved",
            ProtectedField::IsFeatured => "isFeatured",
            ProtectedField::CanRefer => "canRefer",
            ProtectedField::Status => "status",
            ProtectedField::SourceType => "sourceType",
            ProtectedField::RiskRating => "riskRating",
            ProtectedField::AdminComment => "adminComment",
            ProtectedField::Translations => "translations",
            ProtectedField::IsTranslated => "isTranslated",
            ProtectedField::TranslatedAt => "translatedAt",
        }
    }

    pub fn is_present(&self, record: &CanonicalJobRecord) -> bool {
        match self {
            ProtectedField::Industry => has_text(&record.industry),
            ProtectedField::Category => has_text(&record.category),
            ProtectedField::Tags => !record.tags.is_empty(),
            ProtectedField::EmploymentType => has_text(&record.employment_type),
            ProtectedField::ExperienceLevel => has_text(&record.experience_level),
            ProtectedField::Salary => record.salary.as_ref().is_some_and(has_value),
            ProtectedField::Region => has_text(&record.region),
            ProtectedField::Location => has_text(&record.location),
            ProtectedField::Timezone => has_text(&record.timezone),
            ProtectedField::IsManuallyEdited => record.is_manually_edited.is_some(),
            ProtectedField::IsApproved => record.is_approved.is_some(),
            ProtectedField::IsFeatured => record.is_featured.is_some(),
            ProtectedField::CanRefer => record.can_refer.is_some(),
            ProtectedField::Status => record.status.is_some(),
            ProtectedField::SourceType => record.source_type.is_some(),
            ProtectedField::RiskRating => has_text(&record.risk_rating),
            ProtectedField::AdminComment => has_text(&record.admin_comment),
            ProtectedField::Translations => !record.translations.is_empty(),
            ProtectedField::IsTranslated => record.is_translated.is_some(),
            ProtectedField::TranslatedAt => record.translated_at.is_some(),
        }
    }

    /// Copy this field's value from `from` into `to`.
    pub fn carry(&self, from: &CanonicalJobRecord, to: &mut CanonicalJobRecord) {
        match self {
            ProtectedField::Industry => to.industry = from.industry.clone(),
            ProtectedField::Category => to.category = from.category.clone(),
            ProtectedField::Tags => to.tags = from.tags.clone(),
            ProtectedField::EmploymentType => to.employment_type = from.employment_type.clone(),
            ProtectedField::ExperienceLevel => to.experience_level = from.experience_level.clone(),
            ProtectedField::Salary => to.salary = from.salary.clone(),
            ProtectedField::Region => to.region = from.region.clone(),
            ProtectedField::Location => to.location = from.location.clone(),
            ProtectedField::Timezone => to.timezone = from.timezone.clone(),
            ProtectedField::IsManuallyEdited => to.is_manually_edited = from.is_manually_edited,
            ProtectedField::IsApproved => to.is_approved = from.is_approved,
            ProtectedField::IsFeatured => to.is_featured = from.is_featured,
            ProtectedField::CanRefer => to.can_refer = from.can_refer,
            ProtectedField::Status => to.status = from.status,
            ProtectedField::SourceType => to.source_type = from.source_type,
            ProtectedField::RiskRating => to.risk_rating = from.risk_rating.clone(),
            ProtectedField::AdminComment => to.admin_comment = from.admin_comment.clone(),
            ProtectedField::Translations => to.translations = from.translations.clone(),
            ProtectedField::IsTranslated => to.is_translated = from.is_translated,
            ProtectedField::TranslatedAt => to.translated_at = from.translated_at,
        }
    }

    /// JSON rendering of the current value, for violation reports.
    fn render(&self, record: &CanonicalJobRecord) -> String {
        let value = match self {
            ProtectedField::Industry => serde_json::to_string(&record.industry),
            ProtectedField::IsApproved => serde_json::to_string(&record.is_approved),
            ProtectedField::SourceType => serde_json::to_string(&record.source_type),
            _ => Ok(String::from("...")),
        };
        value.unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MergeOptions {
    pub is_manual_override: bool,
}

/// Curated records keep every populated protected field.
pub fn is_human_curated(existing: &CanonicalJobRecord) -> bool {
    existing.is_manually_edited == Some(true) || existing.source_type == Some(SourceType::Manual)
}

pub fn merge(
    incoming: CanonicalJobRecord,
    existing: Option<&CanonicalJobRecord>,
    options: MergeOptions,
) -> CanonicalJobRecord {
    let Some(existing) = existing else {
        return incoming;
    };

    let protect = options.is_manual_override || is_human_curated(existing);
    let mut merged = incoming;

    for field in PROTECTED_FIELDS {
        if !field.is_present(existing) {
            continue;
        }
        if protect || !field.is_present(&merged) {
            field.carry(existing, &mut merged);
        }
    }

    for (key, value) in &existing.extra {
        if !has_value(value) {
            continue;
        }
        if protect || !merged.extra.get(key).is_some_and(has_value) {
            merged.extra.insert(key.clone(), value.clone());
        }
    }

    if !existing.id.is_empty() {
        merged.id = existing.id.clone();
    }
    if has_text(&existing.company_id) {
        merged.company_id = existing.company_id.clone();
    }
    if has_text(&existing.dedup_key) {
        merged.dedup_key = existing.dedup_key.clone();
    }
    if existing.created_at.is_some() {
        merged.created_at = existing.created_at;
    }

    merged
}

/// Last check before a write: fail if any critical field present before is absent now.
pub fn validate_integrity(
    merged: &CanonicalJobRecord,
    existing: Option<&CanonicalJobRecord>,
) -> Result<(), DataIntegrityViolation> {
    let Some(existing) = existing else {
        return Ok(());
    };

    let lost: Vec<LostField> = CRITICAL_FIELDS
        .iter()
        .filter(|f| f.is_present(existing) && !f.is_present(merged))
        .map(|f| LostField { field: f.name(), previous: f.render(existing) })
        .collect();

    if lost.is_empty() {
        Ok(())
    } else {
        Err(DataIntegrityViolation { record_id: existing.id.clone(), lost })
    }
}
