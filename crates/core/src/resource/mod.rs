//! The resources exposed by the job board and their per-resource rules.

mod schemas;

use std::fmt;
use std::str::FromStr;

use jobboard_query::SortKey;
use serde::{Deserialize, Serialize};

use crate::document::model::CREATED_AT;
use crate::document::validate::{FieldKind, FieldSpec};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    User,
    Company,
    Job,
    Role,
    Skill,
    Category,
    Resume,
    Blog,
    Application,
    Permission,
}

/// Fields whose combined values must be unique among active records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniqueRule {
    pub fields: &'static [&'static str],
    pub case_insensitive: bool,
}

/// A field whose every change is appended to a log array on the record,
/// as `{<field>, updatedAt, updatedBy}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryRule {
    pub field: &'static str,
    pub log: &'static str,
}

/// A field that stores ids of another resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Relation {
    pub field: &'static str,
    pub target: ResourceKind,
}

#[derive(Debug, thiserror::Error)]
#[error("unknown resource: {0}")]
pub struct UnknownResource(pub String);

impl ResourceKind {
    pub const ALL: [ResourceKind; 10] = [
        ResourceKind::User,
        ResourceKind::Company,
        ResourceKind::Job,
        ResourceKind::Role,
        ResourceKind::Skill,
        ResourceKind::Category,
        ResourceKind::Resume,
        ResourceKind::Blog,
        ResourceKind::Application,
        ResourceKind::Permission,
    ];

    /// Collection name, also the URL segment.
    pub fn collection(self) -> &'static str {
        match self {
            ResourceKind::User => "users",
            ResourceKind::Company => "companies",
            ResourceKind::Job => "jobs",
            ResourceKind::Role => "roles",
            ResourceKind::Skill => "skills",
            ResourceKind::Category => "categories",
            ResourceKind::Resume => "resumes",
            ResourceKind::Blog => "blogs",
            ResourceKind::Application => "applications",
            ResourceKind::Permission => "permissions",
        }
    }

    pub fn from_collection(name: &str) -> Result<Self, UnknownResource> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.collection() == name)
            .ok_or_else(|| UnknownResource(name.to_string()))
    }

    /// Human-readable singular name for messages.
    pub fn label(self) -> &'static str {
        match self {
            ResourceKind::User => "user",
            ResourceKind::Company => "company",
            ResourceKind::Job => "job",
            ResourceKind::Role => "role",
            ResourceKind::Skill => "skill",
            ResourceKind::Category => "category",
            ResourceKind::Resume => "resume",
            ResourceKind::Blog => "blog",
            ResourceKind::Application => "application",
            ResourceKind::Permission => "permission",
        }
    }

    pub fn schema(self) -> &'static [FieldSpec] {
        match self {
            ResourceKind::User => schemas::USER,
            ResourceKind::Company => schemas::COMPANY,
            ResourceKind::Job => schemas::JOB,
            ResourceKind::Role => schemas::ROLE,
            ResourceKind::Skill => schemas::SKILL,
            ResourceKind::Category => schemas::CATEGORY,
            ResourceKind::Resume => schemas::RESUME,
            ResourceKind::Blog => schemas::BLOG,
            ResourceKind::Application => schemas::APPLICATION,
            ResourceKind::Permission => schemas::PERMISSION,
        }
    }

    /// Fields whose plain `key=value` filters are case-insensitive partial matches.
    pub fn searchable_fields(self) -> &'static [&'static str] {
        match self {
            ResourceKind::User => &["name", "email", "address"],
            ResourceKind::Company => &["name", "address", "industry", "country"],
            ResourceKind::Job => &["name", "location", "level"],
            ResourceKind::Role | ResourceKind::Skill | ResourceKind::Category => &["name"],
            ResourceKind::Resume => &["email", "status"],
            ResourceKind::Blog => &["title", "description", "status"],
            ResourceKind::Application => &["status"],
            ResourceKind::Permission => &["name", "apiPath", "module"],
        }
    }

    pub fn unique_rule(self) -> Option<UniqueRule> {
        match self {
            ResourceKind::User => Some(UniqueRule {
                fields: &["email"],
                case_insensitive: false,
            }),
            ResourceKind::Role => Some(UniqueRule {
                fields: &["name"],
                case_insensitive: false,
            }),
            ResourceKind::Skill | ResourceKind::Category => Some(UniqueRule {
                fields: &["name"],
                case_insensitive: true,
            }),
            // one application per user, job and CV
            ResourceKind::Application => Some(UniqueRule {
                fields: &["userId", "jobId", "cvUrl"],
                case_insensitive: false,
            }),
            _ => None,
        }
    }

    pub fn history_rule(self) -> Option<HistoryRule> {
        match self {
            ResourceKind::Resume => Some(HistoryRule {
                field: "status",
                log: "history",
            }),
            _ => None,
        }
    }

    /// Whether `field` is an integer that only moves through explicit increments.
    pub fn is_counter(self, field: &str) -> bool {
        self.schema()
            .iter()
            .any(|spec| spec.counter && spec.name == field)
    }

    pub fn relation(self, field: &str) -> Option<Relation> {
        self.schema().iter().find_map(|spec| match spec.kind {
            FieldKind::Reference(target) | FieldKind::ReferenceList(target)
                if spec.name == field =>
            {
                Some(Relation {
                    field: spec.name,
                    target,
                })
            }
            _ => None,
        })
    }

    pub fn default_sort(self) -> Vec<SortKey> {
        vec![SortKey::desc(CREATED_AT)]
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.collection())
    }
}

impl FromStr for ResourceKind {
    type Err = UnknownResource;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_collection(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collections_round_trip() {
        for kind in ResourceKind::ALL {
            assert_eq!(ResourceKind::from_collection(kind.collection()).unwrap(), kind);
        }
        assert!(ResourceKind::from_collection("orders").is_err());
    }

    #[test]
    fn relations_come_from_schema() {
        let skills = ResourceKind::Job.relation("skills").unwrap();
        assert_eq!(skills.target, ResourceKind::Skill);
        let company = ResourceKind::Job.relation("company").unwrap();
        assert_eq!(company.target, ResourceKind::Company);
        assert!(ResourceKind::Job.relation("name").is_none());
        assert_eq!(
            ResourceKind::Role.relation("permissions").map(|r| r.target),
            Some(ResourceKind::Permission)
        );
        assert_eq!(
            ResourceKind::Resume.relation("jobId").map(|r| r.target),
            Some(ResourceKind::Job)
        );
    }

    #[test]
    fn searchable_unique_and_history_fields_exist_in_schema() {
        for kind in ResourceKind::ALL {
            for field in kind.searchable_fields() {
                assert!(
                    kind.schema().iter().any(|spec| spec.name == *field),
                    "{kind}: {field} missing from schema"
                );
            }
            if let Some(rule) = kind.unique_rule() {
                for field in rule.fields {
                    assert!(kind.schema().iter().any(|spec| spec.name == *field && spec.required));
                }
            }
            if let Some(rule) = kind.history_rule() {
                assert!(kind.schema().iter().any(|spec| spec.name == rule.field));
                assert!(kind.schema().iter().all(|spec| spec.name != rule.log));
            }
        }
    }

    #[test]
    fn only_blog_views_is_a_counter() {
        assert!(ResourceKind::Blog.is_counter("views"));
        assert!(!ResourceKind::Blog.is_counter("title"));
        let counters = ResourceKind::ALL
            .into_iter()
            .flat_map(|kind| kind.schema().iter().filter(|spec| spec.counter))
            .count();
        assert_eq!(counters, 1);
    }
}
