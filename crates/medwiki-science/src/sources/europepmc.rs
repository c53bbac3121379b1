use std::time::Duration;

use async_trait::async_trait;
use medwiki_core::config::EuropePmcConfig;
use quick_xml::Reader;
use quick_xml::events::Event;
use tracing::{debug, instrument};

use crate::error::{Result, ScienceError};
use crate::http::RateLimitedClient;
use crate::sources::{LicenseDetail, LicenseDetailSource};
use crate::xml::{attribute, clean_text, element_name, in_element};

const USER_AGENT: &str = concat!("medwiki/", env!("CARGO_PKG_VERSION"));

/// Europe PMC REST client; reads the license grant out of JATS full text.
pub struct EuropePmcClient {
    client: RateLimitedClient,
    base_url: String,
}

impl EuropePmcClient {
    pub fn new(config: &EuropePmcConfig) -> Result<Self> {
        Self::with_params(
            &config.base_url,
            Duration::from_millis(config.request_delay_ms),
            config.max_retries,
        )
    }

    pub fn with_params(base_url: &str, min_interval: Duration, max_retries: u32) -> Result<Self> {
        Ok(Self {
            client: RateLimitedClient::new(min_interval, max_retries, USER_AGENT)?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    #[instrument(skip(self))]
    async fn full_text_license(&self, pmcid: &str) -> Result<LicenseDetail> {
        let id = pmcid.trim().trim_start_matches("PMC");
        if id.is_empty() {
            return Err(ScienceError::Parse("empty PMC ID".to_string()));
        }
        let url = format!("{}/PMC{id}/fullTextXML", self.base_url);
        let xml = self.client.get(&url).await?;
        let detail = parse_license(&xml)?;
        debug!(link = ?detail.link, "license detail");
        Ok(detail)
    }
}

#[async_trait]
impl LicenseDetailSource for EuropePmcClient {
    async fn license_detail(&self, pmcid: &str) -> Result<LicenseDetail> {
        self.full_text_license(pmcid).await
    }
}

/// Reads the first `<license>` grant of a JATS document: its `xlink:href`
/// (or `ali:license_ref` text) as the link and its `<license-p>` prose as text.
/// A document without a grant yields an empty detail.
pub fn parse_license(xml: &str) -> Result<LicenseDetail> {
    let mut reader = Reader::from_str(xml);
    let mut stack: Vec<String> = Vec::new();
    let mut href = String::new();
    let mut license_ref = String::new();
    let mut text = String::new();
    let mut seen_license = false;

    loop {
        let event = reader.read_event().map_err(|e| {
            ScienceError::Parse(format!(
                "invalid JATS XML at byte {}: {e}",
                reader.buffer_position()
            ))
        })?;

        match event {
            Event::Start(e) => {
                let name = element_name(&e);
                if name == "license" && !seen_license {
                    seen_license = true;
                    href = attribute(&e, "xlink:href")?;
                }
                stack.push(name);
            }
            Event::Empty(e) => {
                if element_name(&e) == "license" && !seen_license {
                    href = attribute(&e, "xlink:href")?;
                    break;
                }
            }
            Event::Text(t) if in_element(&stack, "license") => {
                let chunk = t
                    .unescape()
                    .map(|c| c.into_owned())
                    .unwrap_or_else(|_| String::from_utf8_lossy(&t).into_owned());
                if in_element(&stack, "license-p") {
                    text.push_str(&chunk);
                } else if in_element(&stack, "ali:license_ref") {
                    license_ref.push_str(&chunk);
                }
            }
            Event::End(_) => {
                if stack.pop().as_deref() == Some("license") {
                    break;
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    let link = [href.trim(), license_ref.trim()]
        .into_iter()
        .find(|l| !l.is_empty())
        .map(ToOwned::to_owned);

    Ok(LicenseDetail {
        link,
        text: clean_text(&text),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;

    const CC_BY_JATS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<article xmlns:xlink="http://www.w3.org/1999/xlink" article-type="review-article">
  <front>
    <article-meta>
      <permissions>
        <copyright-statement>&#x000a9; The Author(s). 2017</copyright-statement>
        <license license-type="OpenAccess" xlink:href="http://creativecommons.org/licenses/by/4.0">
          <license-p><bold>Open Access</bold>This article is distributed under the terms of the
          Creative Commons Attribution 4.0 International License
          (<ext-link ext-link-type="uri" xlink:href="http://creativecommons.org/licenses/by/4.0/">http://creativecommons.org/licenses/by/4.0/</ext-link>).</license-p>
        </license>
      </permissions>
    </article-meta>
  </front>
  <body><p>Body text.</p></body>
</article>"#;

    #[test]
    fn reads_href_and_prose() {
        let detail = parse_license(CC_BY_JATS).unwrap();
        assert_eq!(
            detail.link.as_deref(),
            Some("http://creativecommons.org/licenses/by/4.0")
        );
        assert!(detail.text.contains(
            "This article is distributed under the terms of the Creative Commons Attribution 4.0 International License"
        ));
    }

    #[test]
    fn prose_only_grant_has_no_link() {
        let xml = r#"<article><front><article-meta><permissions>
            <license><license-p>This article is distributed under the terms of the Creative Commons Attribution 4.0 International License.</license-p></license>
            </permissions></article-meta></front></article>"#;
        let detail = parse_license(xml).unwrap();
        assert_eq!(detail.link, None);
        assert!(detail.text.starts_with("This article is distributed"));
    }

    #[test]
    fn falls_back_to_license_ref() {
        let xml = r#"<article xmlns:ali="http://www.niso.org/schemas/ali/1.0/"><permissions>
            <license><ali:license_ref>https://creativecommons.org/licenses/by-nc/4.0/</ali:license_ref>
            <license-p>Non-commercial reuse.</license-p></license>
            </permissions></article>"#;
        let detail = parse_license(xml).unwrap();
        assert_eq!(
            detail.link.as_deref(),
            Some("https://creativecommons.org/licenses/by-nc/4.0/")
        );
    }

    #[test]
    fn self_closing_grant_keeps_its_link() {
        let detail = parse_license(
            r#"<article xmlns:xlink="http://www.w3.org/1999/xlink"><permissions>
            <license xlink:href="https://creativecommons.org/licenses/by-nc/4.0/"/>
            <license xlink:href="https://creativecommons.org/licenses/by/4.0/"/>
            </permissions></article>"#,
        )
        .unwrap();
        assert_eq!(
            detail.link.as_deref(),
            Some("https://creativecommons.org/licenses/by-nc/4.0/")
        );
        assert!(detail.text.is_empty());
    }

    #[test]
    fn document_without_grant_is_empty() {
        let detail = parse_license("<article><front/></article>").unwrap();
        assert_eq!(detail, LicenseDetail::default());
    }

    #[tokio::test]
    async fn fetches_full_text_by_pmcid() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/PMC5729401/fullTextXML")
            .with_status(200)
            .with_header("content-type", "application/xml")
            .with_body(CC_BY_JATS)
            .create_async()
            .await;

        let client = EuropePmcClient::with_params(&server.url(), Duration::ZERO, 0).unwrap();
        let detail = client.license_detail("5729401").await.unwrap();
        assert!(detail.link.is_some());
    }

    #[tokio::test]
    async fn missing_full_text_is_an_error() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/PMC1/fullTextXML")
            .with_status(404)
            .create_async()
            .await;

        let client = EuropePmcClient::with_params(&server.url(), Duration::ZERO, 0).unwrap();
        assert!(client.license_detail("PMC1").await.is_err());
    }
}
