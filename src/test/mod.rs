//! In-process fake of the Qiniu CDN and Aliyun DNS APIs.
#![allow(clippy::trivial_regex)]

use futures::Future;
use hyper::{service::service_fn_ok, Body, Method, Request, Response, Server};
use lazy_static::lazy_static;
use std::net::TcpListener;
use std::sync::{Arc, Mutex};
use std::thread;

lazy_static! {
    static ref RE_ACTION: regex::Regex = regex::Regex::new("(?:^|&)Action=([A-Za-z]+)").unwrap();
    static ref RE_ACCESS_KEY: regex::Regex =
        regex::Regex::new("(?:^|&)AccessKeyId=([^&]*)").unwrap();
    static ref RE_RECORD_ID: regex::Regex = regex::Regex::new("(?:^|&)RecordId=([0-9]+)").unwrap();
    static ref RE_PAGE: regex::Regex = regex::Regex::new("(?:^|&)PageNumber=([0-9]+)").unwrap();
}

pub struct TestServer {
    pub url: String,
    hits: Arc<Mutex<Vec<String>>>,
    shutdown: Option<futures::sync::oneshot::Sender<()>>,
}

impl TestServer {
    /// Requests served so far, as `"<METHOD> <path>"` for the CDN and
    /// `"<Action> [RecordId]"` for DNS.
    pub fn hits(&self) -> Vec<String> {
        self.hits.lock().unwrap().clone()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.take().unwrap().send(()).ok();
    }
}

fn json(status: u16, body: &str) -> Response<Body> {
    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get_domain(name: &str) -> Response<Body> {
    match name {
        "https.example.com" => json(
            200,
            r#"{
            "name": "https.example.com",
            "type": "normal",
            "platform": "web",
            "geoCover": "china",
            "protocol": "https",
            "https": {
                "certId": "5f0c7b1e",
                "forceHttps": true,
                "http2Enable": true
            }
            }"#,
        ),
        "plain.example.com" => json(
            200,
            r#"{
            "name": "plain.example.com",
            "type": "normal",
            "platform": "web",
            "geoCover": "china",
            "protocol": "http",
            "https": {
                "certId": "",
                "forceHttps": false,
                "http2Enable": false
            }
            }"#,
        ),
        _ => json(404, r#"{"code":404,"error":"no such domain"}"#),
    }
}

fn get_cert(id: &str) -> Response<Body> {
    match id {
        "5f0c7b1e" => json(
            200,
            r#"{
            "code": 200,
            "error": "",
            "cert": {
                "certid": "5f0c7b1e",
                "name": "https.example.com",
                "common_name": "https.example.com",
                "dnsnames": ["https.example.com"],
                "not_before": 1700000000,
                "not_after": 1707776000,
                "create_time": 1700000100
            }
            }"#,
        ),
        "garbled" => Response::builder()
            .status(200)
            .body(Body::from(vec![0xff, 0xfe, 0xfd]))
            .unwrap(),
        "broken" => Response::builder()
            .status(500)
            .body(Body::from("upstream exploded"))
            .unwrap(),
        _ => json(404, r#"{"code":404,"error":"no such certificate"}"#),
    }
}

fn route_qiniu(req: &Request<Body>) -> (String, Response<Body>) {
    let path = req.uri().path().to_string();
    let hit = format!("{} {}", req.method(), path);

    let signed = req
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("Qiniu test-ak:"))
        .unwrap_or(false);
    if !signed {
        return (hit, json(401, r#"{"code":401,"error":"bad token"}"#));
    }

    let segments: Vec<&str> = path.trim_start_matches('/').split('/').collect();
    let res = match (req.method(), &segments[..]) {
        (&Method::POST, ["sslcert"]) => json(200, r#"{"certID":"5f0c7b1e"}"#),
        (&Method::GET, ["sslcert", id]) => get_cert(id),
        (&Method::GET, ["domain", name]) => get_domain(name),
        (&Method::PUT, ["domain", _, "sslize"]) => json(200, r#"{"code":200,"error":""}"#),
        (&Method::PUT, ["domain", _, "httpsconf"]) => json(200, r#"{"code":200,"error":""}"#),
        (_, _) => Response::builder().status(404).body(Body::empty()).unwrap(),
    };
    (hit, res)
}

fn describe_domains(page: &str) -> Response<Body> {
    let body = if page == "1" {
        r#"{
        "RequestId": "req-1",
        "TotalCount": 3,
        "PageNumber": 1,
        "PageSize": 2,
        "Domains": {"Domain": [
            {"DomainId": "d-1", "DomainName": "example.com"},
            {"DomainId": "d-2", "DomainName": "sub.example.com"}
        ]}
        }"#
    } else {
        r#"{
        "RequestId": "req-2",
        "TotalCount": 3,
        "PageNumber": 2,
        "PageSize": 2,
        "Domains": {"Domain": [
            {"DomainId": "d-3", "DomainName": "other.org"}
        ]}
        }"#
    };
    json(200, body)
}

fn describe_domain_records() -> Response<Body> {
    json(
        200,
        r#"{
        "RequestId": "req-3",
        "TotalCount": 2,
        "DomainRecords": {"Record": [
            {"RecordId": "1001", "RR": "_acme-challenge.a", "Type": "TXT",
             "Value": "proof", "DomainName": "sub.example.com", "TTL": 600},
            {"RecordId": "1002", "RR": "_acme-challenge.ab", "Type": "TXT",
             "Value": "other", "DomainName": "sub.example.com", "TTL": 600}
        ]}
        }"#,
    )
}

fn route_aliyun(req: &Request<Body>) -> (String, Response<Body>) {
    let query = req.uri().query().unwrap_or("").to_string();
    let capture = |re: &regex::Regex| {
        re.captures(&query)
            .map(|c| c[1].to_string())
            .unwrap_or_default()
    };
    let action = capture(&RE_ACTION);
    let record_id = capture(&RE_RECORD_ID);
    let hit = if record_id.is_empty() {
        action.clone()
    } else {
        format!("{} {}", action, record_id)
    };

    if !query.contains("&Signature=") || capture(&RE_ACCESS_KEY) != "test-ak" {
        let res = json(
            400,
            r#"{"Code":"InvalidAccessKeyId.NotFound","Message":"Specified access key is not found.","RequestId":"req-x"}"#,
        );
        return (hit, res);
    }

    let res = match action.as_str() {
        "DescribeDomains" => describe_domains(&capture(&RE_PAGE)),
        "AddDomainRecord" => json(200, r#"{"RequestId":"req-4","RecordId":"1001"}"#),
        "DescribeDomainRecords" => describe_domain_records(),
        "DeleteDomainRecord" => json(200, r#"{"RequestId":"req-5","RecordId":"1001"}"#),
        _ => json(404, r#"{"Code":"InvalidAction","Message":"unknown action","RequestId":"req-y"}"#),
    };
    (hit, res)
}

fn route_request(req: Request<Body>, hits: &Arc<Mutex<Vec<String>>>) -> Response<Body> {
    // the DNS RPC API lives on "/", everything else is the CDN
    let (hit, res) = if req.uri().path() == "/" {
        route_aliyun(&req)
    } else {
        route_qiniu(&req)
    };
    hits.lock().unwrap().push(hit);
    res
}

pub fn with_api_server() -> TestServer {
    let tcp = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = tcp.local_addr().unwrap().port();

    let url = format!("http://127.0.0.1:{}", port);
    let hits = Arc::new(Mutex::new(Vec::new()));

    let hits2 = hits.clone();
    let make_service = move || {
        let hits3 = hits2.clone();
        service_fn_ok(move |req| route_request(req, &hits3))
    };
    let server = Server::from_tcp(tcp).unwrap().serve(make_service);

    let (tx, rx) = futures::sync::oneshot::channel::<()>();

    let graceful = server
        .with_graceful_shutdown(rx)
        .map_err(|err| eprintln!("server error: {}", err));

    thread::spawn(move || {
        hyper::rt::run(graceful);
    });

    TestServer {
        url,
        hits,
        shutdown: Some(tx),
    }
}

#[test]
pub fn test_make_api_server() {
    let server = with_api_server();
    let res = ureq::get(&format!("{}/sslcert/5f0c7b1e", server.url)).call();
    // unsigned
    assert!(matches!(res, Err(ureq::Error::Status(401, _))));
    assert_eq!(server.hits(), vec!["GET /sslcert/5f0c7b1e"]);
}
