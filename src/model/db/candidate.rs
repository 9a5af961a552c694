use std::ops::{Deref, DerefMut};

use mongodb::bson::{doc, Document};
use serde::{Deserialize, Serialize};

use crate::model::common::{CandidateId, Grade};

/// Core candidate data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateCore {
    pub name: String,
    pub grade: Grade,
    pub description: String,
    pub photo_url: String,
}

/// A candidate without an ID.
pub type NewCandidate = CandidateCore;

/// A candidate from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    #[serde(rename = "_id")]
    pub id: CandidateId,
    #[serde(flatten)]
    pub candidate: CandidateCore,
}

impl Deref for Candidate {
    type Target = CandidateCore;

    fn deref(&self) -> &Self::Target {
        &self.candidate
    }
}

impl DerefMut for Candidate {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.candidate
    }
}

/// A validated partial update to a candidate. Absent fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidateUpdate {
    pub name: Option<String>,
    pub grade: Option<Grade>,
    pub description: Option<String>,
    pub photo_url: Option<String>,
}

impl CandidateUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.grade.is_none()
            && self.description.is_none()
            && self.photo_url.is_none()
    }

    /// Apply this update to an in-memory candidate.
    pub fn apply_to(&self, candidate: &mut CandidateCore) {
        if let Some(ref name) = self.name {
            candidate.name = name.clone();
        }
        if let Some(grade) = self.grade {
            candidate.grade = grade;
        }
        if let Some(ref description) = self.description {
            candidate.description = description.clone();
        }
        if let Some(ref photo_url) = self.photo_url {
            candidate.photo_url = photo_url.clone();
        }
    }

    /// The `$set` body for this update.
    pub fn as_set_doc(&self) -> Document {
        let mut set = Document::new();
        if let Some(ref name) = self.name {
            set.insert("name", name);
        }
        if let Some(grade) = self.grade {
            set.insert("grade", grade);
        }
        if let Some(ref description) = self.description {
            set.insert("description", description);
        }
        if let Some(ref photo_url) = self.photo_url {
            set.insert("photo_url", photo_url);
        }
        set
    }
}

/// Which candidates to list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CandidateFilter {
    pub grade: Option<Grade>,
}

impl CandidateFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn grade(grade: Grade) -> Self {
        Self { grade: Some(grade) }
    }

    pub fn matches(&self, candidate: &Candidate) -> bool {
        self.grade.map_or(true, |grade| candidate.grade == grade)
    }

    pub fn as_doc(&self) -> Document {
        match self.grade {
            Some(grade) => doc! { "grade": grade },
            None => doc! {},
        }
    }
}

/// Example data for tests.
#[cfg(test)]
pub(crate) mod examples {
    use super::*;

    impl CandidateCore {
        pub fn example(name: &str, grade: Grade) -> Self {
            Self {
                name: name.to_string(),
                grade,
                description: format!("{name} would make a great queen."),
                photo_url: format!("https://example.com/{}.jpg", name.to_lowercase()),
            }
        }
    }
}
