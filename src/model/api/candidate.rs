use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    common::{CandidateId, Grade},
    db::candidate::{Candidate, CandidateUpdate, NewCandidate},
};

/// A candidate as presented to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateDescription {
    pub id: CandidateId,
    pub name: String,
    pub grade: Grade,
    pub description: String,
    pub photo_url: String,
}

impl From<Candidate> for CandidateDescription {
    fn from(candidate: Candidate) -> Self {
        Self {
            id: candidate.id,
            name: candidate.candidate.name,
            grade: candidate.candidate.grade,
            description: candidate.candidate.description,
            photo_url: candidate.candidate.photo_url,
        }
    }
}

/// A candidate submitted for creation. Nothing is trusted until converted
/// into a [`NewCandidate`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateSpec {
    pub name: String,
    pub grade: Grade,
    pub description: String,
    pub photo_url: String,
}

impl TryFrom<CandidateSpec> for NewCandidate {
    type Error = Error;

    fn try_from(spec: CandidateSpec) -> Result<Self> {
        Ok(Self {
            name: required_text("name", spec.name)?,
            grade: valid_grade(spec.grade)?,
            description: required_text("description", spec.description)?,
            photo_url: required_text("photoUrl", spec.photo_url)?,
        })
    }
}

/// A partial candidate update. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidatePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grade: Option<Grade>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
}

impl TryFrom<CandidatePatch> for CandidateUpdate {
    type Error = Error;

    fn try_from(patch: CandidatePatch) -> Result<Self> {
        Ok(Self {
            name: patch.name.map(|n| required_text("name", n)).transpose()?,
            grade: patch.grade.map(valid_grade).transpose()?,
            description: patch
                .description
                .map(|d| required_text("description", d))
                .transpose()?,
            photo_url: patch
                .photo_url
                .map(|p| required_text("photoUrl", p))
                .transpose()?,
        })
    }
}

fn required_text(field: &str, value: String) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::validation(format!("candidate {field} is required")));
    }
    Ok(trimmed.to_string())
}

fn valid_grade(grade: Grade) -> Result<Grade> {
    if grade == 0 {
        return Err(Error::validation("candidate grade must be positive"));
    }
    Ok(grade)
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_validation() {
        let candidate = NewCandidate::try_from(CandidateSpec::example("  Ana ", 9)).unwrap();
        assert_eq!(candidate.name, "Ana");

        let mut spec = CandidateSpec::example("Ana", 9);
        spec.description = "   ".to_string();
        assert!(matches!(
            NewCandidate::try_from(spec),
            Err(Error::Validation(_))
        ));

        let spec = CandidateSpec::example("Ana", 0);
        assert!(matches!(
            NewCandidate::try_from(spec),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn patch_validation() {
        let update = CandidateUpdate::try_from(CandidatePatch::default()).unwrap();
        assert!(update.is_empty());

        let patch = CandidatePatch {
            name: Some(String::new()),
            ..Default::default()
        };
        assert!(matches!(
            CandidateUpdate::try_from(patch),
            Err(Error::Validation(_))
        ));

        let patch = CandidatePatch {
            photo_url: Some("https://example.com/b.png".to_string()),
            ..Default::default()
        };
        let update = CandidateUpdate::try_from(patch).unwrap();
        assert_eq!(update.photo_url.as_deref(), Some("https://example.com/b.png"));
        assert!(update.name.is_none());
    }

    #[test]
    fn spec_json_is_camel_case() {
        let spec: CandidateSpec = rocket::serde::json::serde_json::from_str(
            r#"{"name":"Ana","grade":9,"description":"Kind","photoUrl":"https://x/a.jpg"}"#,
        )
        .unwrap();
        assert_eq!(spec.photo_url, "https://x/a.jpg");
    }
}
