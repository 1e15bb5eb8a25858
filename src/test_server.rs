//! Canned-response HTTP server for exercising the real clients in tests.

use std::collections::HashMap;
use std::io::Read;
use std::thread;

use crossbeam_channel::{unbounded, Receiver};
use tiny_http::{Header, Response, Server};
use url::Url;

pub struct Captured {
    pub method: String,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub authorization: Option<String>,
    pub body: String,
}

impl Captured {
    pub fn query_values(&self, key: &str) -> Vec<&str> {
        self.query
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    pub fn json_body(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).expect("request body is json")
    }
}

pub struct TestServer {
    pub base_url: String,
    requests: Receiver<Captured>,
}

impl TestServer {
    /// Answers one request per entry of `responses`, in order, then stops.
    pub fn start(responses: Vec<(u16, &str)>) -> Self {
        let server = Server::http("127.0.0.1:0").expect("bind test server");
        let base_url = format!("http://{}/", server.server_addr());
        let responses: Vec<(u16, String)> = responses
            .into_iter()
            .map(|(status, body)| (status, body.to_string()))
            .collect();
        let (tx, rx) = unbounded();

        thread::spawn(move || {
            for (status, body) in responses {
                let Ok(mut request) = server.recv() else {
                    return;
                };
                let mut received = String::new();
                let _ = request.as_reader().read_to_string(&mut received);
                let url = Url::parse(&format!("http://local{}", request.url()))
                    .expect("request url");
                let headers: HashMap<String, String> = request
                    .headers()
                    .iter()
                    .map(|h| (h.field.as_str().as_str().to_ascii_lowercase(), h.value.to_string()))
                    .collect();
                let _ = tx.send(Captured {
                    method: request.method().to_string(),
                    path: url.path().to_string(),
                    query: url.query_pairs().into_owned().collect(),
                    authorization: headers.get("authorization").cloned(),
                    body: received,
                });
                let response = Response::from_string(body)
                    .with_status_code(status)
                    .with_header(
                        Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..])
                            .expect("valid header"),
                    );
                let _ = request.respond(response);
            }
        });

        Self {
            base_url,
            requests: rx,
        }
    }

    pub fn next_request(&self) -> Captured {
        self.requests
            .recv_timeout(std::time::Duration::from_secs(5))
            .expect("request captured")
    }
}
