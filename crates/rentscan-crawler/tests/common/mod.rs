#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rentscan_crawler::{
    DomainAdapter, Fetch, FetchError, Politeness, Postcode, SourceAdapter, DOMAIN_SEARCH_URL,
};

pub fn postcode(code: &str) -> Postcode {
    code.parse().unwrap()
}

pub fn page_url(postcode: &str, page: u32) -> String {
    DOMAIN_SEARCH_URL
        .replace("{postcode}", postcode)
        .replace("{page}", &page.to_string())
}

pub fn card(id: &str, price: Option<&str>, features: &[&str]) -> String {
    let price = price
        .map(|p| format!(r#"<p data-testid="listing-card-price">{p}</p>"#))
        .unwrap_or_default();
    let features = features
        .iter()
        .map(|f| {
            format!(
                r#"<span data-testid="property-features-feature"><span data-testid="property-features-text-container">{f}</span></span>"#
            )
        })
        .collect::<String>();
    format!(
        r#"<li data-testid="listing-card-wrapper-premiumplus">
             <div>{price}</div>
             <a class="address is-two-lines css-1y2bib4" href="https://www.domain.com.au/1-test-st-sydney-nsw-2000-{id}">1 Test St</a>
             <div data-testid="property-features-wrapper">{features}</div>
           </li>"#
    )
}

pub fn simple_card(id: &str) -> String {
    card(id, Some("$500 per week"), &["2 Beds", "1 Bath"])
}

pub fn page(cards: &[String]) -> String {
    format!(
        "<!DOCTYPE html><html><body><ul>{}</ul></body></html>",
        cards.concat()
    )
}

pub fn page_of(ids: &[&str]) -> String {
    page(&ids.iter().map(|id| simple_card(id)).collect::<Vec<_>>())
}

pub fn error_page() -> String {
    r#"<html><body><h1 data-testid="error-page__message-header">Something went wrong</h1></body></html>"#
        .to_string()
}

pub fn not_found_page() -> String {
    r#"<html><body><div class="css-18vn4hf">No exact matches</div></body></html>"#.to_string()
}

/// Serves fixed pages by URL, any other URL fails like a 404.
#[derive(Debug, Default)]
pub struct ScriptedSite {
    pages: HashMap<String, String>,
    requested: Mutex<Vec<String>>,
}

impl ScriptedSite {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, postcode: &str, page: u32, body: String) -> Self {
        self.pages.insert(page_url(postcode, page), body);
        self
    }

    pub fn with_pages(mut self, postcode: &str, pages: Vec<String>) -> Self {
        for (i, body) in pages.into_iter().enumerate() {
            self.pages.insert(page_url(postcode, i as u32 + 1), body);
        }
        self
    }

    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }

    pub fn requests_for(&self, postcode: &str) -> usize {
        let marker = format!("postcode={postcode}&");
        self.requested()
            .iter()
            .filter(|url| url.contains(&marker))
            .count()
    }
}

#[async_trait]
impl Fetch for ScriptedSite {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        self.requested.lock().unwrap().push(url.to_string());
        self.pages.get(url).cloned().ok_or_else(|| FetchError::Status {
            url: url.to_string(),
            status: reqwest::StatusCode::NOT_FOUND,
        })
    }
}

pub fn domain(site: Arc<ScriptedSite>) -> Arc<dyn SourceAdapter> {
    Arc::new(DomainAdapter::with_politeness(site, Politeness::Unlimited).unwrap())
}
