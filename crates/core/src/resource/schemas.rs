use crate::document::validate::{FieldDefault, FieldKind, FieldSpec};

use super::ResourceKind;

use FieldKind::{
    Boolean, Date, Email, Integer, Number, Reference, ReferenceList, Text, TextList,
};

pub(super) const USER: &[FieldSpec] = &[
    FieldSpec::required("name", Text),
    FieldSpec::required("email", Email),
    FieldSpec::optional("age", Number),
    FieldSpec::optional("gender", Text),
    FieldSpec::optional("address", Text),
    FieldSpec::optional("phone", Text),
    FieldSpec::optional("role", Reference(ResourceKind::Role)),
    FieldSpec::optional("company", Reference(ResourceKind::Company)),
];

pub(super) const COMPANY: &[FieldSpec] = &[
    FieldSpec::required("name", Text),
    FieldSpec::optional("address", Text),
    FieldSpec::optional("latitude", Number),
    FieldSpec::optional("longitude", Number),
    FieldSpec::optional("description", Text),
    FieldSpec::optional("logo", Text),
    FieldSpec::optional("skills", ReferenceList(ResourceKind::Skill)),
    FieldSpec::optional("specializationDescription", Text),
    FieldSpec::optional("companyModel", Text),
    FieldSpec::optional("industry", Text),
    FieldSpec::optional("companySize", Text),
    FieldSpec::optional("country", Text),
    FieldSpec::optional("workingTime", Text),
];

pub(super) const JOB: &[FieldSpec] = &[
    FieldSpec::required("name", Text),
    FieldSpec::optional("skills", ReferenceList(ResourceKind::Skill)),
    FieldSpec::optional("category", Reference(ResourceKind::Category)),
    FieldSpec::optional("company", Reference(ResourceKind::Company)),
    FieldSpec::optional("location", Text),
    FieldSpec::optional("salary", Number),
    FieldSpec::optional("quantity", Number),
    FieldSpec::optional("level", Text),
    FieldSpec::optional("description", Text),
    FieldSpec::optional("startDate", Date),
    FieldSpec::optional("endDate", Date),
    FieldSpec::optional("isActive", Boolean).with_default(FieldDefault::True),
];

pub(super) const ROLE: &[FieldSpec] = &[
    FieldSpec::required("name", Text),
    FieldSpec::optional("description", Text),
    FieldSpec::optional("isActive", Boolean).with_default(FieldDefault::True),
    FieldSpec::optional("permissions", ReferenceList(ResourceKind::Permission)),
];

pub(super) const SKILL: &[FieldSpec] = &[
    FieldSpec::required("name", Text),
    FieldSpec::optional("description", Text),
];

pub(super) const CATEGORY: &[FieldSpec] = &[
    FieldSpec::required("name", Text),
    FieldSpec::optional("description", Text),
];

pub(super) const RESUME: &[FieldSpec] = &[
    FieldSpec::required("email", Email),
    FieldSpec::required("url", Text),
    FieldSpec::optional("status", Text).with_default(FieldDefault::Text("PENDING")),
    FieldSpec::optional("userId", Reference(ResourceKind::User)),
    FieldSpec::optional("companyId", Reference(ResourceKind::Company)),
    FieldSpec::optional("jobId", Reference(ResourceKind::Job)),
];

pub(super) const BLOG: &[FieldSpec] = &[
    FieldSpec::required("title", Text),
    FieldSpec::optional("content", Text),
    FieldSpec::optional("description", Text),
    FieldSpec::optional("thumbnail", Text),
    FieldSpec::optional("status", Text),
    FieldSpec::optional("author", Reference(ResourceKind::User)),
    FieldSpec::optional("tags", TextList),
    FieldSpec::optional("views", Integer)
        .with_default(FieldDefault::Zero)
        .counter(),
];

pub(super) const APPLICATION: &[FieldSpec] = &[
    FieldSpec::required("userId", Reference(ResourceKind::User)),
    FieldSpec::required("jobId", Reference(ResourceKind::Job)),
    FieldSpec::required("cvUrl", Text),
    FieldSpec::optional("status", Text).with_default(FieldDefault::Text("pending")),
];

pub(super) const PERMISSION: &[FieldSpec] = &[
    FieldSpec::required("name", Text),
    FieldSpec::required("apiPath", Text),
    FieldSpec::required("method", Text),
    FieldSpec::required("module", Text),
];
