//! Page-number pagination for search results.

use axum::http::{header::HOST, HeaderMap, Uri};

use crate::{config::AppConfig, errors::RequestError};

const INVALID_PAGE: &str = "Invalid page.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// 1-based.
    pub page: i64,
    pub page_size: i64,
}

impl PageRequest {
    /// `None` when pagination is disabled. A `page_size` that does not parse
    /// falls back to the configured size; a `page` that does not parse is an
    /// invalid page.
    pub fn from_params(
        page: Option<&str>,
        page_size: Option<&str>,
        config: &AppConfig,
    ) -> Result<Option<Self>, RequestError> {
        if config.page_size == 0 {
            return Ok(None);
        }
        let page_size = page_size
            .and_then(|size| size.trim().parse::<u32>().ok())
            .filter(|size| *size > 0)
            .map(|size| size.min(config.max_page_size.max(1)))
            .unwrap_or(config.page_size);
        let page = match page.map(str::trim).filter(|page| !page.is_empty()) {
            Some(page) => page
                .parse::<i64>()
                .map_err(|_| RequestError::NotFound(INVALID_PAGE))?,
            None => 1,
        };
        Ok(Some(PageRequest {
            page,
            page_size: i64::from(page_size),
        }))
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.page_size
    }

    /// At least one page, so an empty result still has page 1.
    pub fn num_pages(&self, count: i64) -> i64 {
        ((count + self.page_size - 1) / self.page_size).max(1)
    }

    pub fn check_in_range(&self, count: i64) -> Result<(), RequestError> {
        if self.page < 1 || self.page > self.num_pages(count) {
            return Err(RequestError::NotFound(INVALID_PAGE));
        }
        Ok(())
    }

    pub fn has_next(&self, count: i64) -> bool {
        self.page < self.num_pages(count)
    }

    pub fn has_previous(&self) -> bool {
        self.page > 1
    }
}

/// Rebuilds the request URL with its `page` parameter replaced.
#[derive(Debug, Clone)]
pub struct PageLinks {
    base: String,
    params: Vec<String>,
}

impl PageLinks {
    pub fn new(uri: &Uri, headers: &HeaderMap) -> Self {
        let base = match headers.get(HOST).and_then(|host| host.to_str().ok()) {
            Some(host) => format!("http://{}{}", host, uri.path()),
            None => uri.path().to_string(),
        };
        let params = uri
            .query()
            .unwrap_or_default()
            .split('&')
            .filter(|pair| !pair.is_empty())
            .filter(|pair| pair.split('=').next() != Some("page"))
            .map(str::to_string)
            .collect();
        Self { base, params }
    }

    /// Page 1 is linked without a `page` parameter.
    pub fn link(&self, page: i64) -> String {
        let mut params = self.params.clone();
        if page > 1 {
            params.push(format!("page={page}"));
        }
        if params.is_empty() {
            self.base.clone()
        } else {
            format!("{}?{}", self.base, params.join("&"))
        }
    }
}
