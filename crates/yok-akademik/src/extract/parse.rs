//! Turning raw page reads into records.

use crate::browser::{RawCollaboratorNode, RawProfileRow};
use crate::config::site;
use crate::models::{author_id_from_url, CollaboratorRecord, ProfileRecord};

/// A result row that cannot become a profile.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RowError {
    #[error("row {0} has no info cell")]
    MissingInfoCell(String),

    #[error("row {0} has no profile link")]
    MissingLink(String),
}

/// Build a profile from one search-result row.
pub fn build_profile(row: &RawProfileRow) -> Result<ProfileRecord, RowError> {
    let info = row
        .info_text
        .as_deref()
        .ok_or_else(|| RowError::MissingInfoCell(row.row_id.clone()))?
        .trim();
    let profile_url = row
        .profile_url
        .as_deref()
        .filter(|url| !url.is_empty())
        .ok_or_else(|| RowError::MissingLink(row.row_id.clone()))?;

    let field = row.labels.first().map(|l| l.trim()).unwrap_or_default();
    let speciality = row.labels.get(1).map(|l| l.trim()).unwrap_or_default();

    let lines: Vec<&str> = info.lines().collect();
    let (title, name) = if lines.len() > 1 {
        (lines[0].trim(), lines[1].trim())
    } else {
        (row.link_text.trim(), row.link_text.trim())
    };
    let education = lines.get(2).map(|l| l.trim()).unwrap_or_default();

    Ok(ProfileRecord {
        author_id: author_id_from_url(profile_url),
        name: name.to_string(),
        title: title.to_string(),
        profile_url: profile_url.to_string(),
        photo_url: row
            .photo_src
            .as_deref()
            .filter(|src| !src.is_empty())
            .unwrap_or(site::DEFAULT_PHOTO_URL)
            .to_string(),
        info: info.to_string(),
        education: education.to_string(),
        field: field.to_string(),
        speciality: speciality.to_string(),
        keywords: extract_keywords(info, field, speciality, education),
        email: row.email_text.as_deref().map(normalize_email).unwrap_or_default(),
    })
}

/// Keywords of a profile: the last info line once the labels are removed.
///
/// The line is discarded when it contains the education line. An empty
/// education line is contained in every string, so rows without one never
/// carry keywords.
#[must_use]
pub fn extract_keywords(info: &str, field: &str, speciality: &str, education: &str) -> String {
    let labels = format!("{field}   {speciality}");
    let stripped = info.replace(&labels, "");
    let stripped = stripped
        .trim()
        .trim_start_matches(|c: char| matches!(c, ';' | ':' | ',' | '.' | ' ' | '\u{b}' | '\n' | '\t'));

    let Some(last) = stripped.split('\n').map(str::trim).filter(|l| !l.is_empty()).next_back() else {
        return String::new();
    };

    let education = education.trim();
    if last == education || last.contains(education) {
        return String::new();
    }

    last.split(';').map(str::trim).filter(|k| !k.is_empty()).collect::<Vec<_>>().join(" ; ")
}

/// `[at]`-obfuscated address to a plain one.
#[must_use]
pub fn normalize_email(text: &str) -> String {
    text.trim().replace("[at]", "@")
}

/// Build a collaborator from one graph node.
#[must_use]
pub fn build_collaborator(node: RawCollaboratorNode) -> CollaboratorRecord {
    let profile_url = node.profile_url.trim();
    let author_id = author_id_from_url(profile_url).unwrap_or_default();

    if profile_url.is_empty() {
        return CollaboratorRecord {
            author_id,
            name: node.name,
            info: site::PROFILE_NOT_FOUND.to_string(),
            photo_url: site::DEFAULT_PHOTO_URL.to_string(),
            profile_url: String::new(),
            status: CollaboratorRecord::COMPLETED.to_string(),
        };
    }

    let info = if node.info.is_empty() { node.name.clone() } else { node.info };
    CollaboratorRecord {
        author_id,
        info,
        photo_url: resolve_photo_url(&node.photo_url),
        profile_url: profile_url.to_string(),
        name: node.name,
        status: CollaboratorRecord::COMPLETED.to_string(),
    }
}

/// Normalize a graph photo reference.
///
/// Empty becomes the placeholder, `data:image` URIs are kept, site-relative
/// paths are joined onto the registry base URL.
#[must_use]
pub fn resolve_photo_url(raw: &str) -> String {
    if raw.trim().is_empty() {
        site::DEFAULT_PHOTO_URL.to_string()
    } else if raw.starts_with("data:image") {
        raw.to_string()
    } else if let Some(path) = raw.strip_prefix('/') {
        format!("{}{}", site::BASE_URL, path.trim_start_matches('/'))
    } else {
        raw.to_string()
    }
}
