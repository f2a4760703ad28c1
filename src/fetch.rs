//! Paginated retrieval of a resource collection.
//!
//! A zero-limit probe reads `total`, then pages of `page_size` are requested
//! with `skip` advancing until `skip >= total` or a page comes back empty.
//! Any failed page aborts the whole fetch; retry policy belongs to the
//! [`Transport`].

use crate::error::{EtlError, Result};
use crate::types::{Record, ResourceKey};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Blocking HTTP GET returning the body of a successful response
pub trait Transport {
    fn get(&self, url: &str) -> Result<Vec<u8>>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn get(&self, url: &str) -> Result<Vec<u8>> {
        (**self).get(url)
    }
}

/// ureq-backed transport with a per-request timeout
pub struct HttpTransport {
    agent: ureq::Agent,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build();
        HttpTransport {
            agent: ureq::Agent::new_with_config(config),
        }
    }
}

impl Transport for HttpTransport {
    fn get(&self, url: &str) -> Result<Vec<u8>> {
        let mut response = self.agent.get(url).call().map_err(|err| match err {
            ureq::Error::StatusCode(status) => EtlError::HttpStatus {
                url: url.to_string(),
                status,
            },
            other => EtlError::Transport {
                url: url.to_string(),
                reason: other.to_string(),
            },
        })?;

        response
            .body_mut()
            .read_to_vec()
            .map_err(|err| EtlError::Transport {
                url: url.to_string(),
                reason: format!("failed reading response body: {err}"),
            })
    }
}

/// Retrieves every record of a resource, page by page
pub struct Fetcher<T: Transport> {
    transport: T,
    page_size: usize,
}

impl<T: Transport> Fetcher<T> {
    pub fn new(transport: T, page_size: usize) -> Self {
        Fetcher {
            transport,
            page_size,
        }
    }

    /// Fetch all records of the resource at `resource_url`.
    ///
    /// Records come back exactly as served, nested structure intact, one per
    /// element of the `<resource key>` list, in page order. `page_size` must
    /// be non-zero; [`EtlConfig::validate`](crate::EtlConfig::validate)
    /// enforces that.
    pub fn fetch(&self, resource_url: &str) -> Result<Vec<Record>> {
        if self.page_size == 0 {
            return Err(EtlError::InvalidConfig("page_size must be non-zero".into()));
        }
        let key = ResourceKey::from_url(resource_url)?;
        let base = resource_url.trim_end_matches('/');

        let probe_url = page_url(base, 0, 0);
        let probe = self.get_json(&probe_url)?;
        let total = probe
            .get("total")
            .and_then(Value::as_u64)
            .ok_or_else(|| EtlError::MissingTotal { url: probe_url.clone() })? as usize;
        debug!(resource = %key, total, "probed resource size");

        let mut records = Vec::new();
        let mut skip = 0;
        while skip < total {
            let url = page_url(base, self.page_size, skip);
            let page = self.get_json(&url)?;
            let batch = take_collection(page, &key, &url)?;
            debug!(resource = %key, skip, received = batch.len(), "fetched page");
            if batch.is_empty() {
                warn!(resource = %key, skip, total, "empty page before reaching total");
                break;
            }
            records.extend(batch);
            skip += self.page_size;
        }

        info!(resource = %key, records = records.len(), "fetch complete");
        Ok(records)
    }

    fn get_json(&self, url: &str) -> Result<Value> {
        let mut body = self.transport.get(url)?;
        simd_json::serde::from_slice::<Value>(&mut body).map_err(|err| EtlError::MalformedJson {
            url: url.to_string(),
            reason: err.to_string(),
        })
    }
}

fn page_url(base: &str, limit: usize, skip: usize) -> String {
    format!("{}?limit={}&skip={}", base, limit, skip)
}

/// Pull the `<key>` list out of a page, requiring every element to be a mapping
fn take_collection(page: Value, key: &ResourceKey, url: &str) -> Result<Vec<Record>> {
    let missing = || EtlError::MissingCollection {
        url: url.to_string(),
        key: key.to_string(),
    };

    let items = match page {
        Value::Object(mut obj) => match obj.remove(key.as_str()) {
            Some(Value::Array(items)) => items,
            _ => return Err(missing()),
        },
        _ => return Err(missing()),
    };

    items
        .into_iter()
        .enumerate()
        .map(|(idx, item)| match item {
            Value::Object(record) => Ok(record),
            other => Err(EtlError::MalformedJson {
                url: url.to_string(),
                reason: format!("element {} of `{}` is not an object: {}", idx, key, other),
            }),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::RefCell;

    /// Serves `total` synthetic products and records every requested URL
    struct FakeApi {
        total: usize,
        requests: RefCell<Vec<String>>,
        fail_skip: Option<usize>,
    }

    impl FakeApi {
        fn new(total: usize) -> Self {
            FakeApi {
                total,
                requests: RefCell::new(Vec::new()),
                fail_skip: None,
            }
        }
    }

    impl Transport for FakeApi {
        fn get(&self, url: &str) -> Result<Vec<u8>> {
            self.requests.borrow_mut().push(url.to_string());
            let query = url.split('?').nth(1).unwrap_or_default();
            let mut limit = 0;
            let mut skip = 0;
            for pair in query.split('&') {
                match pair.split_once('=') {
                    Some(("limit", v)) => limit = v.parse().unwrap(),
                    Some(("skip", v)) => skip = v.parse().unwrap(),
                    _ => {}
                }
            }

            if limit > 0 && self.fail_skip == Some(skip) {
                return Err(EtlError::HttpStatus {
                    url: url.to_string(),
                    status: 503,
                });
            }

            let end = (skip + limit).min(self.total);
            let products: Vec<Value> = (skip..end)
                .map(|i| json!({"id": i + 1, "meta": {"barcode": format!("b{}", i + 1)}}))
                .collect();
            let body = json!({"products": products, "total": self.total, "skip": skip, "limit": limit});
            Ok(serde_json::to_vec(&body).unwrap())
        }
    }

    #[test]
    fn test_pagination_completeness() {
        let api = FakeApi::new(250);
        let fetcher = Fetcher::new(&api, 100);
        let records = fetcher.fetch("https://dummyjson.com/products").unwrap();

        assert_eq!(records.len(), 250);
        let ids: Vec<u64> = records.iter().map(|r| r["id"].as_u64().unwrap()).collect();
        assert_eq!(ids, (1..=250).collect::<Vec<u64>>());

        let requests = api.requests.borrow();
        assert_eq!(requests.len(), 1 + 3);
        assert_eq!(requests[0], "https://dummyjson.com/products?limit=0&skip=0");
        assert_eq!(requests[1], "https://dummyjson.com/products?limit=100&skip=0");
        assert_eq!(requests[3], "https://dummyjson.com/products?limit=100&skip=200");
    }

    #[test]
    fn test_small_collection_single_page() {
        let api = FakeApi::new(3);
        let records = Fetcher::new(&api, 100)
            .fetch("https://dummyjson.com/products/")
            .unwrap();

        assert_eq!(records.len(), 3);
        assert_eq!(api.requests.borrow().len(), 2);
        // Nested structure is left intact
        assert_eq!(records[0]["meta"], json!({"barcode": "b1"}));
    }

    #[test]
    fn test_empty_collection_only_probes() {
        let api = FakeApi::new(0);
        let records = Fetcher::new(&api, 100)
            .fetch("https://dummyjson.com/products")
            .unwrap();

        assert!(records.is_empty());
        assert_eq!(api.requests.borrow().len(), 1);
    }

    #[test]
    fn test_failed_page_aborts_fetch() {
        let mut api = FakeApi::new(250);
        api.fail_skip = Some(100);
        let err = Fetcher::new(&api, 100)
            .fetch("https://dummyjson.com/products")
            .unwrap_err();

        assert!(matches!(err, EtlError::HttpStatus { status: 503, .. }));
        // No further pages after the failure
        assert_eq!(api.requests.borrow().len(), 3);
    }

    struct Canned(&'static str);

    impl Transport for Canned {
        fn get(&self, _url: &str) -> Result<Vec<u8>> {
            Ok(self.0.as_bytes().to_vec())
        }
    }

    #[test]
    fn test_malformed_json_aborts_fetch() {
        let err = Fetcher::new(Canned("{\"total\": 3, \"products\": ["), 100)
            .fetch("https://dummyjson.com/products")
            .unwrap_err();
        assert!(matches!(err, EtlError::MalformedJson { .. }));
    }

    #[test]
    fn test_missing_collection_key() {
        let err = Fetcher::new(Canned(r#"{"total": 1, "items": []}"#), 100)
            .fetch("https://dummyjson.com/products")
            .unwrap_err();
        assert!(matches!(err, EtlError::MissingCollection { ref key, .. } if key == "products"));
    }

    #[test]
    fn test_records_are_not_padded() {
        let body = r#"{"total": 2, "products": [{"id": 1, "dimensions": {"width": 1}}, {"id": 2}]}"#;
        let records = Fetcher::new(Canned(body), 100)
            .fetch("https://dummyjson.com/products")
            .unwrap();

        assert_eq!(records.len(), 2);
        assert!(!records[1].contains_key("dimensions"));
    }

    #[test]
    fn test_huge_total_stops_at_empty_page() {
        let body = r#"{"total": 1000000000000000000, "products": []}"#;
        let records = Fetcher::new(Canned(body), 100)
            .fetch("https://dummyjson.com/products")
            .unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_zero_page_size_is_rejected() {
        let err = Fetcher::new(Canned(r#"{"total": 1, "products": []}"#), 0)
            .fetch("https://dummyjson.com/products")
            .unwrap_err();
        assert!(matches!(err, EtlError::InvalidConfig(_)));
    }

    #[test]
    fn test_missing_total() {
        let err = Fetcher::new(Canned(r#"{"products": []}"#), 100)
            .fetch("https://dummyjson.com/products")
            .unwrap_err();
        assert!(matches!(err, EtlError::MissingTotal { .. }));
    }
}
