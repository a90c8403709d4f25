//! Sitemap generation for the public site

use chrono::{DateTime, SecondsFormat, Utc};

/// Locales with their own URL prefix; the default locale lives at the root
const PREFIXED_LOCALES: [&str; 1] = ["es"];

#[derive(Debug, Clone, PartialEq)]
pub struct SitemapEntry {
    pub url: String,
    pub last_modified: DateTime<Utc>,
    pub change_frequency: &'static str,
    pub priority: f32,
}

/// Builds the entries for `base_url`: the root page and one per locale
pub fn entries(base_url: &str, now: DateTime<Utc>) -> Vec<SitemapEntry> {
    let base = base_url.trim_end_matches('/');

    let mut entries = vec![SitemapEntry {
        url: base.to_string(),
        last_modified: now,
        change_frequency: "hourly",
        priority: 1.0,
    }];
    entries.extend(PREFIXED_LOCALES.iter().map(|locale| SitemapEntry {
        url: format!("{}/{}", base, locale),
        last_modified: now,
        change_frequency: "hourly",
        priority: 0.8,
    }));
    entries
}

/// Renders entries as sitemap protocol XML
pub fn render_xml(entries: &[SitemapEntry]) -> String {
    let mut xml = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\n",
    );
    for entry in entries {
        xml.push_str("  <url>\n");
        xml.push_str(&format!("    <loc>{}</loc>\n", escape_xml(&entry.url)));
        xml.push_str(&format!(
            "    <lastmod>{}</lastmod>\n",
            entry.last_modified.to_rfc3339_opts(SecondsFormat::Secs, true)
        ));
        xml.push_str(&format!(
            "    <changefreq>{}</changefreq>\n",
            entry.change_frequency
        ));
        xml.push_str(&format!("    <priority>{:.1}</priority>\n", entry.priority));
        xml.push_str("  </url>\n");
    }
    xml.push_str("</urlset>\n");
    xml
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
