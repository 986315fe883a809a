//! Browser automation against the registry site.
//!
//! [`RegistrySite`] names the site-level steps the extractors drive;
//! [`ChromeSite`] performs them in a headless Chromium. Everything that reads
//! the DOM returns raw, unparsed values; turning them into records happens in
//! [`crate::extract::parse`].

mod chrome;
mod scripts;

pub use chrome::ChromeSite;

use serde::{Deserialize, Serialize};

use crate::error::BrowserResult;

/// One search-result row as read from the page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawProfileRow {
    /// `id` attribute of the row (`authorInfo_…`).
    pub row_id: String,
    /// `href` of the first link in the row.
    pub profile_url: Option<String>,
    /// Visible text of that link.
    pub link_text: String,
    /// Visible text of the info cell (the `td` holding an `h6`).
    pub info_text: Option<String>,
    /// Texts of the `a.anahtarKelime` classification links, in order.
    pub labels: Vec<String>,
    /// Resolved `src` of the row image.
    pub photo_src: Option<String>,
    /// Text of the `mailto:` link.
    pub email_text: Option<String>,
}

/// One collaboration-graph node as read from the page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawCollaboratorNode {
    /// Label text of the node.
    pub name: String,
    /// Canonical profile link shown after selecting the node.
    pub profile_url: String,
    /// Image reference of the node (href, xlink:href or src).
    pub photo_url: String,
    /// Institution text of the detail panel.
    pub info: String,
}

/// Outcome of trying to move to the next result page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageTurn {
    /// The next page is loaded.
    Advanced,
    /// The active page is the last one.
    LastPage,
    /// Pagination is missing, not clickable, or the page never changed.
    Unavailable,
}

/// Site-level operations of the registry's search and graph flows.
///
/// One instance drives one browser session for one extraction run.
#[async_trait::async_trait]
pub trait RegistrySite: Send {
    /// Open the academic search entry point and wait for the search field.
    async fn open_search(&mut self) -> BrowserResult<()>;

    /// Dismiss the cookie-consent overlay if it shows up; never fails.
    async fn dismiss_consent(&mut self) -> bool;

    /// Type the query into the search field and run the search.
    async fn submit_search(&mut self, name: &str) -> BrowserResult<()>;

    /// Switch to the "Akademisyenler" result tab.
    async fn open_academics_tab(&mut self) -> BrowserResult<()>;

    /// Wait for result rows; `None` when none appear in the wait window.
    async fn result_rows(&mut self) -> BrowserResult<Option<Vec<RawProfileRow>>>;

    /// Click the page after the active one and wait for the old rows to go stale.
    async fn next_page(&mut self) -> BrowserResult<PageTurn>;

    /// Navigate directly to a profile page.
    async fn open_profile(&mut self, url: &str) -> BrowserResult<()>;

    /// Open the first result of the current search.
    async fn open_first_result(&mut self) -> BrowserResult<()>;

    /// Switch to the collaboration graph and wait until it has data nodes.
    async fn open_collaboration_graph(&mut self) -> BrowserResult<()>;

    /// Walk the rendered graph and read every data node.
    async fn collaborator_nodes(&mut self) -> BrowserResult<Vec<RawCollaboratorNode>>;

    /// Shut the browser down.
    async fn close(&mut self);
}
