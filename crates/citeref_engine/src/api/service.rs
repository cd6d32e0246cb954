/* 📖 # Why a single ApiService?

One service handles every API route. The server registers one handler, and all
routes share the same error path: any `Err` becomes a 599 response carrying the
error's code and message.

Responses are built from Serialize structs. The query route hands an ApiResult to
the endpoint and serializes whatever it accumulated.
*/

use std::sync::Arc;

use citeref_base::http::{HttpMethod, HttpRequest, HttpResponse, HttpService};
use citeref_base::{CiterefError, CiterefResult};
use serde::Serialize;
use tracing::debug;

use crate::endpoint::{CacheMode, ReferenceLookupEndpoint};
use crate::reference::PageId;
use crate::result::{ApiResult, ResultLimits};

const MODULE_NAME: &str = "references";

/// Decoded parameters of a references query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    pub page_ids: Vec<PageId>,
    pub continuation: Option<String>,
}

impl QueryParams {
    /// Parse a raw query string such as `prop=references&pageids=5|9&rfcontinue=9`.
    pub fn parse(query: &str) -> CiterefResult<Self> {
        let mut params = Self::default();
        for pair in query.split('&').filter(|pair| !pair.is_empty()) {
            let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
            let value = decode(value)?;
            match name {
                "prop" => {
                    if value != MODULE_NAME {
                        return Err(Box::new(CiterefError::parse(
                            "prop",
                            format!("unsupported value '{}'", value),
                        )));
                    }
                }
                "pageids" => params.page_ids = parse_page_ids(&value)?,
                "rfcontinue" => params.continuation = Some(value),
                _ => debug!(parameter = name, "ignoring unknown query parameter"),
            }
        }
        Ok(params)
    }
}

fn decode(value: &str) -> CiterefResult<String> {
    let spaced = value.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|decoded| decoded.into_owned())
        .map_err(|e| Box::new(CiterefError::parse("query string", e.to_string())))
}

fn parse_page_ids(value: &str) -> CiterefResult<Vec<PageId>> {
    value
        .split('|')
        .filter(|id| !id.is_empty())
        .map(|id| {
            id.parse::<u64>().map(PageId::new).map_err(|_| {
                Box::new(CiterefError::parse(
                    "pageids",
                    format!("'{}' is not a valid page id", id),
                ))
            })
        })
        .collect()
}

#[derive(Serialize)]
struct HelpResponse {
    module: &'static str,
    description: &'static str,
    parameters: Vec<HelpParameter>,
    examples: Vec<&'static str>,
}

#[derive(Serialize)]
struct HelpParameter {
    name: &'static str,
    description: &'static str,
}

/// HTTP front of the reference lookup endpoint.
pub struct ApiService {
    endpoint: Arc<ReferenceLookupEndpoint>,
    limits: ResultLimits,
    cache_max_age: u32,
}

impl ApiService {
    pub fn new(endpoint: Arc<ReferenceLookupEndpoint>, limits: ResultLimits, cache_max_age: u32) -> Self {
        Self {
            endpoint,
            limits,
            cache_max_age,
        }
    }

    fn serialize_json_response<T: Serialize>(data: &T) -> CiterefResult<HttpResponse> {
        serde_json::to_string(data)
            .map(HttpResponse::json)
            .map_err(|e| Box::new(CiterefError::message(format!("Error serializing response: {}", e))))
    }

    fn cache_control(&self) -> String {
        match self.endpoint.cache_mode() {
            CacheMode::Public => format!("public, max-age={}", self.cache_max_age),
        }
    }

    fn handle_query_request(&self, request: &HttpRequest) -> CiterefResult<HttpResponse> {
        let params = QueryParams::parse(request.query_string().unwrap_or(""))?;
        debug!(pages = params.page_ids.len(), continuation = ?params.continuation, "references query");

        let mut result = ApiResult::new(self.limits);
        self.endpoint
            .lookup(&params.page_ids, params.continuation.as_deref(), &mut result)?;
        let response = Self::serialize_json_response(&result.into_response())?;
        Ok(response.with_header("Cache-Control", self.cache_control()))
    }

    fn handle_help_request(&self) -> CiterefResult<HttpResponse> {
        let help = HelpResponse {
            module: MODULE_NAME,
            description: "Return the stored references of the given pages.",
            parameters: vec![
                HelpParameter {
                    name: "pageids",
                    description: "Page ids separated by '|'.",
                },
                HelpParameter {
                    name: "rfcontinue",
                    description: "When more results are available, use this to continue.",
                },
            ],
            examples: vec!["/api/query?prop=references&pageids=5|9|12"],
        };
        let response = Self::serialize_json_response(&help)?;
        Ok(response.with_header("Cache-Control", self.cache_control()))
    }
}

impl std::fmt::Debug for ApiService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiService")
            .field("limits", &self.limits)
            .field("cache_max_age", &self.cache_max_age)
            .finish_non_exhaustive()
    }
}

impl HttpService for ApiService {
    fn handle_request(&self, request: HttpRequest) -> CiterefResult<HttpResponse> {
        if request.method() != &HttpMethod::Get {
            citeref_base::bail!("Only GET requests are supported");
        }
        match request.route() {
            "/api/query" => self.handle_query_request(&request),
            "/api/help" => self.handle_help_request(),
            route => citeref_base::bail!("Invalid API endpoint: {}", route),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::ids::ReferenceKeyEncoder;
    use crate::store::{InMemoryStore, StoreHandle};
    use citeref_base::server::dispatch;
    use expect_test::expect;

    const DATA: &str = r#"{
        "5": {"refs": {"0": {"": {"": {"key": 1, "text": "Five"}}}}},
        "7": {"refs": {"0": {"": {"": {"key": 1}, "note": {"key": 2}}}}},
        "9": {"refs": {}},
        "12": {"refs": {"0": {"": {"": {"key": 1}}}}}
    }"#;

    fn create_test_service(enabled: bool, max_pages: usize) -> ApiService {
        let config = Config {
            reference_storage_enabled: enabled,
            ..Config::default()
        };
        let store = StoreHandle::new(InMemoryStore::from_json_str(DATA).unwrap());
        let endpoint = ReferenceLookupEndpoint::new(Arc::new(config), store, ReferenceKeyEncoder::default());
        ApiService::new(Arc::new(endpoint), ResultLimits::new(usize::MAX, max_pages), 300)
    }

    fn get(path: &str) -> HttpRequest {
        HttpRequest::new(HttpMethod::Get, path)
    }

    #[test]
    fn test_query_params() {
        let params = QueryParams::parse("prop=references&pageids=12%7C5|9&rfcontinue=9&format=json").unwrap();
        assert_eq!(params.page_ids, [PageId::new(12), PageId::new(5), PageId::new(9)]);
        assert_eq!(params.continuation.as_deref(), Some("9"));
        assert_eq!(QueryParams::parse("").unwrap(), QueryParams::default());
    }

    #[test]
    fn test_query_params_continue_is_not_a_cursor() {
        let params = QueryParams::parse("pageids=5&continue=%7C%7C").unwrap();
        assert_eq!(params.continuation, None);
    }

    #[test]
    fn test_query_params_errors() {
        let err = QueryParams::parse("pageids=5|x").unwrap_err();
        assert_eq!(err.code(), "badvalue");
        assert_eq!(err.to_string(), "Failed to parse pageids: 'x' is not a valid page id");

        let err = QueryParams::parse("prop=info").unwrap_err();
        assert_eq!(err.code(), "badvalue");
    }

    #[test]
    fn test_query_complete() {
        let service = create_test_service(true, 10);
        let response = service
            .handle_request(get("/api/query?prop=references&pageids=9|7"))
            .unwrap();

        assert_eq!(response.status().as_u16(), 200);
        assert_eq!(
            response.headers().get("Cache-Control"),
            Some(&"public, max-age=300".to_string())
        );
        expect![[r#"{"batchcomplete":true,"query":{"pages":{"7":{"pageid":7,"references":{"cite_note-1":{"key":1,"name":"","group":"","reflist":0},"cite_note-note-2":{"key":2,"name":"note","group":"","reflist":0}}},"9":{"pageid":9,"references":{}}}}}"#]]
            .assert_eq(&response.body_string().unwrap());
    }

    #[test]
    fn test_query_continuation_round_trip() {
        let service = create_test_service(true, 2);
        let first = service
            .handle_request(get("/api/query?prop=references&pageids=5|9|12"))
            .unwrap();
        expect![[r#"{"continue":{"rfcontinue":"12","continue":"||"},"query":{"pages":{"5":{"pageid":5,"references":{"cite_note-1":{"key":1,"name":"","group":"","reflist":0,"text":"Five"}}},"9":{"pageid":9,"references":{}}}}}"#]]
            .assert_eq(&first.body_string().unwrap());

        let second = service
            .handle_request(get("/api/query?prop=references&pageids=5|9|12&rfcontinue=12&continue=%7C%7C"))
            .unwrap();
        expect![[r#"{"batchcomplete":true,"query":{"pages":{"12":{"pageid":12,"references":{"cite_note-1":{"key":1,"name":"","group":"","reflist":0}}}}}}"#]]
            .assert_eq(&second.body_string().unwrap());
    }

    #[test]
    fn test_query_zero_page_budget_advances() {
        let service = create_test_service(true, 0);
        let first = service
            .handle_request(get("/api/query?prop=references&pageids=5|9"))
            .unwrap();
        expect![[r#"{"continue":{"rfcontinue":"9","continue":"||"},"query":{"pages":{"5":{"pageid":5,"references":{"cite_note-1":{"key":1,"name":"","group":"","reflist":0,"text":"Five"}}}}}}"#]]
            .assert_eq(&first.body_string().unwrap());

        let second = service
            .handle_request(get("/api/query?prop=references&pageids=5|9&rfcontinue=9"))
            .unwrap();
        expect![[r#"{"batchcomplete":true,"query":{"pages":{"9":{"pageid":9,"references":{}}}}}"#]]
            .assert_eq(&second.body_string().unwrap());
    }

    #[test]
    fn test_query_disabled() {
        let service = create_test_service(false, 10);
        let response = dispatch(&service, get("/api/query?pageids=5"));
        assert_eq!(response.status().as_u16(), 599);
        expect![[r#"{"error":{"code":"citestoragedisabled","info":"Cite extension reference storage is not enabled"}}"#]]
            .assert_eq(&response.body_string().unwrap());
    }

    #[test]
    fn test_query_bad_continuation() {
        let service = create_test_service(true, 10);
        let response = dispatch(&service, get("/api/query?pageids=5&rfcontinue=abc"));
        assert_eq!(response.status().as_u16(), 599);
        expect![[r#"{"error":{"code":"badcontinue","info":"Invalid continue param 'abc'. You should pass the original value returned by the previous query"}}"#]]
            .assert_eq(&response.body_string().unwrap());
    }

    #[test]
    fn test_help() {
        let service = create_test_service(false, 10);
        let response = service.handle_request(get("/api/help")).unwrap();
        let body = response.body_string().unwrap();
        assert!(body.contains(r#""module":"references""#));
        assert!(body.contains("/api/query?prop=references&pageids=5|9|12"));
    }

    #[test]
    fn test_handle_invalid_endpoint() {
        let service = create_test_service(true, 10);
        let err = service.handle_request(get("/api/other")).unwrap_err();
        assert!(err.to_string().contains("Invalid API endpoint"));
    }

    #[test]
    fn test_handle_wrong_method() {
        let service = create_test_service(true, 10);
        let err = service
            .handle_request(HttpRequest::new(HttpMethod::Post, "/api/query"))
            .unwrap_err();
        assert!(err.to_string().contains("Only GET requests are supported"));
    }
}
