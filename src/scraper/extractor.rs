use super::ItemRecord;
use crate::config::ScrapeConfig;
use crate::error::{Result, ScraperError};
use crate::{log_debug, log_info, log_warn};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use url::Url;

const EPISODE_LINK: &str = ".episodes-card-title h3 a[href]";
const ANY_LINK: &str = "a[href]";
const TITLE_SELECTORS: &[&str] = &[".anime-card-title h3 a", ".anime-card-title h3", "h3"];
const IMAGE: &str = "img";
const UNKNOWN_EPISODE: &str = "Unknown Episode";

fn selector(raw: &str) -> Result<Selector> {
    Selector::parse(raw)
        .map_err(|e| ScraperError::SelectorError(format!("{}: {}", raw, e)).into())
}

#[derive(Debug)]
pub struct Extractor {
    base: Url,
    card_selectors: Vec<Selector>,
    episode_link: Selector,
    any_link: Selector,
    titles: Vec<Selector>,
    image: Selector,
    episode_path: Regex,
}

impl Extractor {
    pub fn new(config: &ScrapeConfig, base: Url) -> Result<Self> {
        let card_selectors = std::iter::once(&config.card_selector)
            .chain(config.fallback_selectors.iter())
            .map(|raw| selector(raw))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            base,
            card_selectors,
            episode_link: selector(EPISODE_LINK)?,
            any_link: selector(ANY_LINK)?,
            titles: TITLE_SELECTORS
                .iter()
                .map(|raw| selector(raw))
                .collect::<Result<Vec<_>>>()?,
            image: selector(IMAGE)?,
            episode_path: Regex::new(&config.episode_path_pattern).map_err(ScraperError::from)?,
        })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    /// Up to `limit` records in document order. Cards without an episode
    /// link are skipped quietly, broken cards with a warning; neither stops
    /// the batch.
    pub fn extract(&self, markup: &str, limit: usize) -> Vec<ItemRecord> {
        let document = Html::parse_document(markup);
        let cards = self.select_cards(&document);

        let mut records = Vec::new();
        for (index, card) in cards.into_iter().enumerate() {
            if records.len() >= limit {
                break;
            }
            match self.extract_card(card) {
                Ok(Some(record)) if self.is_episode_url(&record.detail_url) => records.push(record),
                Ok(Some(record)) => {
                    log_debug!("[scraper] Dropping card {}: {} is not an episode page", index, record.detail_url);
                }
                Ok(None) => {
                    log_debug!("[scraper] Card {} has no episode link, skipping", index);
                }
                Err(e) => {
                    log_warn!("[scraper] Failed parsing card {}: {}", index, e);
                }
            }
        }

        log_info!("[scraper] Parsed {} episodes", records.len());
        records
    }

    fn select_cards<'a>(&self, document: &'a Html) -> Vec<ElementRef<'a>> {
        for (position, card_selector) in self.card_selectors.iter().enumerate() {
            let cards: Vec<_> = document.select(card_selector).collect();
            if !cards.is_empty() {
                if position > 0 {
                    log_warn!(
                        "[scraper] Primary card selector matched nothing, fallback #{} found {} cards",
                        position,
                        cards.len()
                    );
                }
                return cards;
            }
        }
        log_warn!("[scraper] No cards found with any selector");
        Vec::new()
    }

    fn extract_card(&self, card: ElementRef) -> std::result::Result<Option<ItemRecord>, ScraperError> {
        let Some((link, detail_url)) = self.extract_detail_link(&card)? else {
            return Ok(None);
        };

        Ok(Some(ItemRecord {
            title: self.extract_title(&card)?,
            episode_label: self.extract_episode_label(&link),
            detail_url,
            thumbnail_url: self.extract_thumbnail(&card),
        }))
    }

    /// The labelled episode link if there is one, otherwise the first anchor
    /// whose target follows the episode path convention.
    fn extract_detail_link<'a>(
        &self,
        card: &ElementRef<'a>,
    ) -> std::result::Result<Option<(ElementRef<'a>, Url)>, ScraperError> {
        if let Some(link) = card.select(&self.episode_link).next() {
            let href = link.value().attr("href").unwrap_or_default();
            let url = self.resolve(href)?;
            if self.is_episode_url(&url) {
                return Ok(Some((link, url)));
            }
        }

        Ok(card.select(&self.any_link).find_map(|link| {
            let url = self.resolve(link.value().attr("href")?).ok()?;
            self.is_episode_url(&url).then_some((link, url))
        }))
    }

    fn extract_title(&self, card: &ElementRef) -> std::result::Result<String, ScraperError> {
        self.titles
            .iter()
            .find_map(|title| card.select(title).map(text_of).find(|t| !t.is_empty()))
            .or_else(|| {
                card.select(&self.image)
                    .filter_map(|img| img.value().attr("alt"))
                    .map(normalize_whitespace)
                    .find(|alt| !alt.is_empty())
            })
            .ok_or(ScraperError::MissingField("title"))
    }

    fn extract_episode_label(&self, link: &ElementRef) -> String {
        let label = text_of(*link);
        if label.is_empty() {
            UNKNOWN_EPISODE.to_string()
        } else {
            label
        }
    }

    /// Lazy-loading themes keep the real source in `data-src`.
    fn extract_thumbnail(&self, card: &ElementRef) -> Option<Url> {
        let img = card.select(&self.image).next()?;
        let src = ["data-src", "data-lazy-src", "src"]
            .iter()
            .filter_map(|attr| img.value().attr(attr))
            .map(str::trim)
            .find(|src| !src.is_empty() && !src.starts_with("data:"))?;
        match self.resolve(src) {
            Ok(url) => Some(url),
            Err(e) => {
                log_debug!("[scraper] Ignoring thumbnail: {}", e);
                None
            }
        }
    }

    fn resolve(&self, href: &str) -> std::result::Result<Url, ScraperError> {
        let href = href.trim();
        if href.is_empty() {
            return Err(ScraperError::MissingField("link target"));
        }
        self.base.join(href).map_err(|e| ScraperError::BadUrl {
            href: href.to_string(),
            reason: e.to_string(),
        })
    }

    pub fn is_episode_url(&self, url: &Url) -> bool {
        matches!(url.scheme(), "http" | "https") && self.episode_path.is_match(url.path())
    }
}

fn text_of(element: ElementRef) -> String {
    normalize_whitespace(&element.text().collect::<String>())
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://site.example";

    fn extractor() -> Extractor {
        Extractor::new(&ScrapeConfig::default(), Url::parse(BASE).unwrap()).unwrap()
    }

    fn card(title: &str, episode: &str, href: &str, img: &str) -> String {
        format!(
            r#"<div class="anime-card-container">
                 <div class="anime-card-poster"><img src="{img}" alt="{title}"></div>
                 <div class="anime-card-title"><h3><a href="/anime/{title}/">{title}</a></h3></div>
                 <div class="episodes-card-title"><h3><a href="{href}">{episode}</a></h3></div>
               </div>"#
        )
    }

    fn page(cards: &[String]) -> String {
        format!("<html><body><div class=\"page\">{}</div></body></html>", cards.join("\n"))
    }

    #[test]
    fn extracts_fields_and_resolves_relative_urls() {
        let markup = page(&[card(
            "Frieren",
            "الحلقة 12",
            "/episode/frieren-12/",
            "/wp-content/uploads/frieren.jpg",
        )]);
        let records = extractor().extract(&markup, 10);

        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.title, "Frieren");
        assert_eq!(record.episode_label, "الحلقة 12");
        assert_eq!(record.detail_url.as_str(), "https://site.example/episode/frieren-12/");
        assert_eq!(
            record.thumbnail_url.as_ref().map(Url::as_str),
            Some("https://site.example/wp-content/uploads/frieren.jpg")
        );
    }

    #[test]
    fn absolute_urls_pass_through_unchanged() {
        let markup = page(&[card(
            "Dandadan",
            "Episode 3",
            "https://site.example/episode/dandadan-3/",
            "https://cdn.example/img/dandadan.webp",
        )]);
        let records = extractor().extract(&markup, 10);
        assert_eq!(records[0].detail_url.as_str(), "https://site.example/episode/dandadan-3/");
        assert_eq!(
            records[0].thumbnail_url.as_ref().map(Url::as_str),
            Some("https://cdn.example/img/dandadan.webp")
        );
    }

    #[test]
    fn non_episode_links_are_skipped() {
        let overview = r#"<div class="anime-card-container">
              <div class="anime-card-title"><h3><a href="/anime/bleach/">Bleach</a></h3></div>
            </div>"#
            .to_string();
        let markup = page(&[
            card("Bleach", "Episode 1", "/episode/bleach-1/", "/b.jpg"),
            overview,
        ]);
        let records = extractor().extract(&markup, 10);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].detail_url.path(), "/episode/bleach-1/");
    }

    #[test]
    fn broken_cards_do_not_abort_the_batch() {
        let no_title = r#"<div class="anime-card-container">
              <div class="episodes-card-title"><h3><a href="/episode/mystery-1/"></a></h3></div>
            </div>"#
            .to_string();
        let empty = r#"<div class="anime-card-container"></div>"#.to_string();
        let bad_href = r#"<div class="anime-card-container">
              <div class="anime-card-title"><h3><a>Broken</a></h3></div>
              <div class="episodes-card-title"><h3><a href="http://[::1">Ep</a></h3></div>
            </div>"#
            .to_string();

        let markup = page(&[
            card("A", "Episode 1", "/episode/a-1/", "/a.jpg"),
            no_title,
            card("B", "Episode 2", "/episode/b-2/", "/b.jpg"),
            empty,
            bad_href,
            card("C", "Episode 3", "/episode/c-3/", "/c.jpg"),
        ]);
        let titles: Vec<_> = extractor()
            .extract(&markup, 10)
            .into_iter()
            .map(|r| r.title)
            .collect();
        assert_eq!(titles, vec!["A", "B", "C"]);
    }

    #[test]
    fn stops_at_limit_in_document_order() {
        let cards: Vec<_> = (1..=15)
            .map(|n| card(&format!("Show{n}"), "Ep", &format!("/episode/show-{n}/"), "/x.jpg"))
            .collect();
        let records = extractor().extract(&page(&cards), 10);
        assert_eq!(records.len(), 10);
        assert_eq!(records[0].title, "Show1");
        assert_eq!(records[9].title, "Show10");
    }

    #[test]
    fn falls_back_to_secondary_selectors() {
        let markup = r#"<div class="episodes-card-container">
              <h3>Kaiju No. 8</h3>
              <a href="/episode/kaiju-8-5/"><img data-src="/k.jpg" src="data:image/gif;base64,R0lGOD"></a>
            </div>"#;
        let records = extractor().extract(markup, 10);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].title, "Kaiju No. 8");
        assert_eq!(records[0].episode_label, "Unknown Episode");
        assert_eq!(
            records[0].thumbnail_url.as_ref().map(Url::as_str),
            Some("https://site.example/k.jpg")
        );
    }

    #[test]
    fn missing_thumbnail_is_allowed() {
        let markup = r#"<div class="anime-card-container">
              <div class="anime-card-title"><h3><a href="/anime/x/">X</a></h3></div>
              <div class="episodes-card-title"><h3><a href="/episode/x-1/">Episode 1</a></h3></div>
            </div>"#;
        let records = extractor().extract(markup, 10);
        assert_eq!(records.len(), 1);
        assert!(records[0].thumbnail_url.is_none());
    }

    #[test]
    fn markup_without_cards_yields_nothing() {
        assert!(extractor().extract("<html><body>maintenance</body></html>", 10).is_empty());
    }

    #[test]
    fn invalid_selector_is_a_config_error() {
        let config = ScrapeConfig {
            card_selector: "div[[".to_string(),
            ..ScrapeConfig::default()
        };
        assert!(Extractor::new(&config, Url::parse(BASE).unwrap()).is_err());
    }
}
