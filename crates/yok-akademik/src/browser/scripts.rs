//! Page scripts evaluated in the registry's pages.
//!
//! Each script is a self-invoking expression returning plain JSON.

/// Selector of search-result rows.
pub const RESULT_ROW: &str = "tr[id^='authorInfo_']";

/// Selector of the search field.
pub const SEARCH_FIELD: &str = "#aramaTerim";

/// Selector of the search button.
pub const SEARCH_BUTTON: &str = "#searchButton";

/// Selector of the collaboration-graph tab link.
pub const GRAPH_TAB: &str = "a[href='viewAuthorGraphs.jsp']";

/// Text of the academics result tab.
pub const ACADEMICS_TAB: &str = "Akademisyenler";

/// Text of the cookie-consent button.
pub const CONSENT_BUTTON: &str = "Tümünü Kabul Et";

/// Attribute that tags the first row of a page before turning it.
pub const STALE_MARK: &str = "data-yok-stale";

/// Quote a Rust string as a JavaScript string literal.
pub fn js_string(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

/// `true` once `selector` matches an element.
pub fn exists(selector: &str) -> String {
    format!("(() => document.querySelector({}) !== null)()", js_string(selector))
}

/// Click the element matching `selector`; `true` if it existed.
pub fn click(selector: &str) -> String {
    format!(
        "(() => {{ const el = document.querySelector({}); if (!el) return false; el.click(); return true; }})()",
        js_string(selector)
    )
}

/// Click the first element of `tag` whose visible text matches `text`.
///
/// `exact` compares the trimmed text, otherwise a substring match is used.
pub fn click_by_text(tag: &str, text: &str, exact: bool) -> String {
    format!(
        r"(() => {{
    const wanted = {text};
    const found = Array.from(document.querySelectorAll({tag})).find(el => {{
        const t = (el.textContent || '').trim();
        return {exact} ? t === wanted : t.includes(wanted);
    }});
    if (!found) return false;
    found.click();
    return true;
}})()",
        text = js_string(text),
        tag = js_string(tag),
        exact = exact,
    )
}

/// Number of graph groups rendered so far.
pub const GRAPH_GROUP_COUNT: &str = "(() => document.querySelectorAll('svg g').length)()";

/// Read every result row of the current page.
pub const RESULT_ROWS: &str = r"(() => {
    const rows = Array.from(document.querySelectorAll(`tr[id^='authorInfo_']`));
    return rows.map(row => {
        const infoTd = Array.from(row.children).find(td => td.tagName === 'TD' && td.querySelector(':scope > h6'));
        const link = row.querySelector('a');
        const img = row.querySelector('img');
        const mail = row.querySelector(`a[href^='mailto']`);
        const labels = infoTd
            ? Array.from(infoTd.querySelectorAll('a.anahtarKelime')).map(a => (a.innerText || '').trim())
            : [];
        return {
            row_id: row.id,
            profile_url: link ? link.href : null,
            link_text: link ? (link.innerText || '').trim() : '',
            info_text: infoTd ? (infoTd.innerText || '').trim() : null,
            labels: labels,
            photo_src: img && img.src ? img.src : null,
            email_text: mail ? (mail.innerText || '').trim() : null,
        };
    });
})()";

/// Tag the first row and click the page after the active one.
///
/// Returns `"clicked"`, `"last"` or `"unavailable"`.
pub const TURN_PAGE: &str = r"(() => {
    const pagination = document.querySelector('ul.pagination');
    if (!pagination) return 'unavailable';
    const items = Array.from(pagination.querySelectorAll('li'));
    const active = pagination.querySelector('li.active');
    const index = items.indexOf(active);
    if (index < 0) return 'unavailable';
    if (index === items.length - 1) return 'last';
    const link = items[index + 1].querySelector('a');
    if (!link) return 'unavailable';
    const first = document.querySelector(`tr[id^='authorInfo_']`);
    if (first) first.setAttribute('data-yok-stale', '1');
    link.click();
    return 'clicked';
})()";

/// `true` once the tagged row has left the document.
pub const PAGE_IS_STALE: &str = "(() => document.querySelector('[data-yok-stale]') === null)()";

/// Walk the collaboration graph, skipping the two chrome groups.
///
/// Clicking a node makes the page update its detail panel (`#pageUrl`,
/// `#detailUniv`), which is read back right after the click.
pub const COLLABORATOR_NODES: &str = r"(() => {
    const groups = document.querySelectorAll('svg g');
    const results = [];
    for (let i = 2; i < groups.length; i++) {
        const g = groups[i];
        const label = g.querySelector('text');
        const name = label ? (label.textContent || '').trim() : '';

        g.dispatchEvent(new MouseEvent('click', { bubbles: true }));
        const pageUrl = document.getElementById('pageUrl');
        const profileUrl = pageUrl && pageUrl.href ? pageUrl.href : '';

        let photoUrl = '';
        const image = g.querySelector('image');
        if (image) {
            photoUrl = image.getAttribute('href')
                || image.getAttribute('xlink:href')
                || image.getAttribute('src')
                || '';
        }

        const detail = document.getElementById('detailUniv');
        const info = detail ? (detail.textContent || '').trim() : '';

        results.push({ name: name, profile_url: profileUrl, photo_url: photoUrl, info: info });
    }
    return results;
})()";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_js_string_escapes_quotes() {
        assert_eq!(js_string("tr[id^='x']"), r#""tr[id^='x']""#);
        assert_eq!(js_string(r#"a"b"#), r#""a\"b""#);
    }

    #[test]
    fn test_click_by_text_embeds_literal() {
        let script = click_by_text("a", ACADEMICS_TAB, true);
        assert!(script.contains(r#""Akademisyenler""#));
        assert!(script.contains("true ? t === wanted"));
    }

    #[test]
    fn test_row_selector_matches_script() {
        assert!(RESULT_ROWS.contains(RESULT_ROW));
        assert!(TURN_PAGE.contains(STALE_MARK));
        assert!(PAGE_IS_STALE.contains(STALE_MARK));
    }
}
