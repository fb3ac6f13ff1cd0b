use crate::types::{ContentBundle, HoldingRecord};
use interfaces::Renderer;
use std::fmt::Write;

/// Renders a content bundle into an HTML email body.
#[derive(Debug, Clone)]
pub struct HtmlDigestRenderer {
    pub heading: String,
}

impl Default for HtmlDigestRenderer {
    fn default() -> Self {
        Self {
            heading: "News for you".to_string(),
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Round the displayed figures of each holding to two decimals.
pub fn format_holdings(holdings: &[HoldingRecord]) -> Vec<HoldingRecord> {
    holdings
        .iter()
        .map(|h| HoldingRecord {
            price: round2(h.price),
            movement_24h: round2(h.movement_24h),
            movement_7d: round2(h.movement_7d),
            movement_1y: round2(h.movement_1y),
            ..h.clone()
        })
        .collect()
}

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

impl HtmlDigestRenderer {
    fn write_document(&self, bundle: &ContentBundle, out: &mut String) -> std::fmt::Result {
        writeln!(out, "<html><body>")?;
        writeln!(out, "<h1>{}</h1>", escape_html(&self.heading))?;
        writeln!(out, "<p>Hi {},</p>", escape_html(&bundle.name))?;

        if bundle.news.is_empty() && bundle.holdings.is_empty() {
            writeln!(out, "<p>Nothing new for your categories this time.</p>")?;
        }

        if !bundle.news.is_empty() {
            writeln!(out, "<h2>News</h2>\n<ul>")?;
            for news in &bundle.news {
                let title = escape_html(&news.title);
                match &news.url {
                    Some(url) => writeln!(out, "<li><a href=\"{}\">{}</a></li>", escape_html(url), title)?,
                    None => writeln!(out, "<li>{}</li>", title)?,
                }
            }
            writeln!(out, "</ul>")?;
        }

        if !bundle.holdings.is_empty() {
            writeln!(out, "<h2>Holdings</h2>\n<table>")?;
            writeln!(out, "<tr><th>Name</th><th>Price</th><th>24h</th><th>7d</th><th>1y</th></tr>")?;
            for h in format_holdings(&bundle.holdings) {
                writeln!(
                    out,
                    "<tr><td>{}</td><td>{}</td><td>{}%</td><td>{}%</td><td>{}%</td></tr>",
                    escape_html(&h.title),
                    h.price,
                    h.movement_24h,
                    h.movement_7d,
                    h.movement_1y
                )?;
            }
            writeln!(out, "</table>")?;
        }

        writeln!(out, "</body></html>")
    }
}

impl Renderer for HtmlDigestRenderer {
    fn render(&self, bundle: &ContentBundle) -> anyhow::Result<String> {
        let mut document = String::new();
        self.write_document(bundle, &mut document)?;
        Ok(document)
    }
}
